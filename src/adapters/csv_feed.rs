use crate::domain::model::{FilterKey, FilterState, GeoItem};
use crate::domain::ports::DataFeed;
use crate::utils::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
struct ListingRow {
    id: String,
    title: String,
    #[serde(default)]
    neighborhood: String,
    #[serde(default)]
    city: String,
    #[serde(default)]
    deal_type: String,
    #[serde(default)]
    property_type: String,
    #[serde(default)]
    property_class: String,
    #[serde(default)]
    latitude: String,
    #[serde(default)]
    longitude: String,
}

impl ListingRow {
    fn attribute(&self, key: FilterKey) -> Option<&str> {
        let value = match key {
            FilterKey::Neighborhood => &self.neighborhood,
            FilterKey::DealType => &self.deal_type,
            FilterKey::PropertyType => &self.property_type,
            FilterKey::PropertyClass => &self.property_class,
        };
        Some(value.as_str()).filter(|v| !v.trim().is_empty())
    }

    fn into_item(self) -> GeoItem {
        GeoItem {
            id: self.id,
            title: self.title,
            locality: [self.neighborhood, self.city]
                .into_iter()
                .filter(|l| !l.trim().is_empty())
                .collect(),
            latitude: self.latitude.trim().parse().ok(),
            longitude: self.longitude.trim().parse().ok(),
        }
    }
}

/// Listing feed that filters a local CSV export. The file is re-read on
/// every fetch so edits show up on the next filter change.
pub struct CsvDataFeed {
    path: PathBuf,
}

impl CsvDataFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn filter_rows(data: &[u8], filters: &FilterState) -> Result<Vec<GeoItem>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(data);

        let mut items = Vec::new();
        for row in reader.deserialize::<ListingRow>() {
            let row = row?;
            if filters.matches(|key| row.attribute(key)) {
                items.push(row.into_item());
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl DataFeed for CsvDataFeed {
    async fn fetch_filtered_items(&self, filters: &FilterState) -> Result<Vec<GeoItem>> {
        tracing::debug!("Reading listings from {}", self.path.display());
        let data = tokio::fs::read(&self.path).await?;
        Self::filter_rows(&data, filters)
    }
}
