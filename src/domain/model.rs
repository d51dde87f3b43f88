use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Minimal lat/lng rectangle enclosing a set of positions. Does not wrap
/// across the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_positions<I: IntoIterator<Item = Position>>(positions: I) -> Option<Self> {
        let mut iter = positions.into_iter();
        let first = iter.next()?;
        let mut bounds = Bounds {
            south: first.lat,
            west: first.lng,
            north: first.lat,
            east: first.lng,
        };
        for p in iter {
            bounds.extend(p);
        }
        Some(bounds)
    }

    pub fn extend(&mut self, p: Position) {
        self.south = self.south.min(p.lat);
        self.north = self.north.max(p.lat);
        self.west = self.west.min(p.lng);
        self.east = self.east.max(p.lng);
    }

    pub fn contains(&self, p: Position) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    pub fn center(&self) -> Position {
        Position::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Position,
    pub zoom: f64,
}

impl Viewport {
    pub fn new(center: Position, zoom: f64) -> Self {
        Self { center, zoom }
    }
}

/// Options passed to the provider when the widget is first created.
pub type MapOptions = Viewport;

/// A listing as far as the map is concerned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoItem {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, deserialize_with = "one_or_many")]
    pub locality: Vec<String>,
    #[serde(default, alias = "lat", deserialize_with = "lenient_coordinate")]
    pub latitude: Option<f64>,
    #[serde(default, alias = "lng", alias = "lon", deserialize_with = "lenient_coordinate")]
    pub longitude: Option<f64>,
}

impl GeoItem {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            locality: Vec::new(),
            latitude: None,
            longitude: None,
        }
    }

    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.latitude = Some(lat);
        self.longitude = Some(lng);
        self
    }

    pub fn with_locality(mut self, label: impl Into<String>) -> Self {
        self.locality.push(label.into());
        self
    }

    /// The marker position, present only when both coordinates are finite.
    pub fn position(&self) -> Option<Position> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) if lat.is_finite() && lng.is_finite() => {
                Some(Position::new(lat, lng))
            }
            _ => None,
        }
    }

    pub fn is_mappable(&self) -> bool {
        self.position().is_some()
    }

    pub fn locality_text(&self) -> String {
        self.locality
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Number(f64),
    Text(String),
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Int(n) => n.to_string(),
        RawId::Float(n) => n.to_string(),
    })
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        Some(OneOrMany::One(s)) => vec![s],
        Some(OneOrMany::Many(v)) => v,
        None => Vec::new(),
    })
}

// Listing documents store coordinates as numbers, numeric strings, or not at
// all. Anything unparsable becomes `None` instead of failing the whole feed.
fn lenient_coordinate<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Option::<RawScalar>::deserialize(deserializer).unwrap_or(None) {
        Some(RawScalar::Number(n)) => Some(n),
        Some(RawScalar::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterKey {
    Neighborhood,
    DealType,
    PropertyType,
    PropertyClass,
}

impl FilterKey {
    pub const ALL: [FilterKey; 4] = [
        FilterKey::Neighborhood,
        FilterKey::DealType,
        FilterKey::PropertyType,
        FilterKey::PropertyClass,
    ];

    pub fn query_name(self) -> &'static str {
        match self {
            FilterKey::Neighborhood => "neighborhood",
            FilterKey::DealType => "deal_type",
            FilterKey::PropertyType => "property_type",
            FilterKey::PropertyClass => "property_class",
        }
    }

    pub fn from_query_name(name: &str) -> Option<Self> {
        match name {
            "neighborhood" => Some(FilterKey::Neighborhood),
            "deal_type" | "dealType" => Some(FilterKey::DealType),
            "property_type" | "propertyType" => Some(FilterKey::PropertyType),
            "property_class" | "propertyClass" => Some(FilterKey::PropertyClass),
            _ => None,
        }
    }
}

impl fmt::Display for FilterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.query_name())
    }
}

/// Selected filter values. Blank values are never stored, so two states
/// compare equal exactly when they constrain the same keys to the same values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    values: BTreeMap<FilterKey, String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: FilterKey, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: FilterKey, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            self.values.remove(&key);
        } else {
            self.values.insert(key, trimmed.to_string());
        }
    }

    pub fn clear(&mut self, key: FilterKey) {
        self.values.remove(&key);
    }

    pub fn get(&self, key: FilterKey) -> Option<&str> {
        self.values.get(&key).map(String::as_str)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FilterKey, &str)> {
        self.values.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Reads the navigation query string (`?neighborhood=..&deal_type=..`).
    /// Unknown parameters are ignored; a repeated key keeps its last value.
    pub fn from_query(query: &str) -> Self {
        let query = query.trim_start_matches('?');
        let mut state = Self::new();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if let Some(key) = FilterKey::from_query_name(&name) {
                state.set(key, value.into_owned());
            }
        }
        state
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, &str)> {
        self.iter().map(|(k, v)| (k.query_name(), v)).collect()
    }

    /// True when every constrained key matches the attribute the lookup
    /// returns for it. Comparison is case-insensitive.
    pub fn matches<'a, F>(&self, lookup: F) -> bool
    where
        F: Fn(FilterKey) -> Option<&'a str>,
    {
        self.values.iter().all(|(key, wanted)| {
            lookup(*key)
                .map(|actual| actual.trim().eq_ignore_ascii_case(wanted))
                .unwrap_or(false)
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PresentationContext {
    #[default]
    Embedded,
    Fullscreen,
}

/// Identifier of a node in the host display tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}
