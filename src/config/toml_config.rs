use crate::core::marker_sync::DEFAULT_CLOSE_UP_ZOOM;
use crate::core::relocator::DEFAULT_RESIZE_DELAY;
use crate::domain::model::{Position, Viewport};
use crate::domain::ports::MapSettings;
use crate::utils::error::{MapError, Result};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

const DEFAULT_CENTER: Position = Position {
    lat: 21.5433,
    lng: 39.1728,
};
const DEFAULT_ZOOM: f64 = 11.0;
const MAX_ZOOM: f64 = 21.0;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    pub detail: Option<DetailConfig>,
    pub view: Option<ViewConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MapConfig {
    pub api_key: Option<String>,
    pub interactive: Option<bool>,
    pub initial_center: Option<Position>,
    pub initial_zoom: Option<f64>,
    pub close_up_zoom: Option<f64>,
    pub resize_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedKind {
    #[default]
    Http,
    Csv,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default)]
    pub kind: FeedKind,
    pub endpoint: Option<String>,
    pub csv_path: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailConfig {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    pub initial_query: Option<String>,
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MapError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Replaces `${VAR}` with the environment value. Unset variables are left
    /// as written.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MapError::ConfigError {
            message: format!("invalid substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        if let Some(center) = self.map.initial_center {
            validation::validate_range("map.initial_center.lat", center.lat, -90.0, 90.0)?;
            validation::validate_range("map.initial_center.lng", center.lng, -180.0, 180.0)?;
        }
        if let Some(zoom) = self.map.initial_zoom {
            validation::validate_range("map.initial_zoom", zoom, 0.0, MAX_ZOOM)?;
        }
        if let Some(zoom) = self.map.close_up_zoom {
            validation::validate_range("map.close_up_zoom", zoom, 1.0, MAX_ZOOM)?;
        }

        match self.feed.kind {
            FeedKind::Http => {
                let endpoint = validation::validate_required_field("feed.endpoint", &self.feed.endpoint)?;
                validation::validate_url("feed.endpoint", endpoint)?;
            }
            FeedKind::Csv => {
                let path = validation::validate_required_field("feed.csv_path", &self.feed.csv_path)?;
                validation::validate_path("feed.csv_path", path)?;
                validation::validate_file_extension("feed.csv_path", path, &["csv"])?;
            }
        }
        if let Some(timeout) = self.feed.timeout_seconds {
            validation::validate_positive_number("feed.timeout_seconds", timeout, 1)?;
        }
        for name in self.feed.headers.iter().flat_map(|headers| headers.keys()) {
            validation::validate_non_empty_string("feed.headers", name)?;
        }

        if let Some(detail) = &self.detail {
            validation::validate_url("detail.base_url", &detail.base_url)?;
        }

        Ok(())
    }

    pub fn interactive(&self) -> bool {
        self.map.interactive.unwrap_or(true)
    }

    pub fn initial_query(&self) -> &str {
        self.view
            .as_ref()
            .and_then(|v| v.initial_query.as_deref())
            .unwrap_or("")
    }
}

impl MapSettings for AppConfig {
    fn api_key(&self) -> Option<&str> {
        self.map.api_key.as_deref()
    }

    fn initial_viewport(&self) -> Viewport {
        Viewport::new(
            self.map.initial_center.unwrap_or(DEFAULT_CENTER),
            self.map.initial_zoom.unwrap_or(DEFAULT_ZOOM),
        )
    }

    fn close_up_zoom(&self) -> f64 {
        self.map.close_up_zoom.unwrap_or(DEFAULT_CLOSE_UP_ZOOM)
    }

    fn resize_delay_ms(&self) -> u64 {
        self.map
            .resize_delay_ms
            .unwrap_or(DEFAULT_RESIZE_DELAY.as_millis() as u64)
    }

    fn detail_base_url(&self) -> &str {
        self.detail.as_ref().map(|d| d.base_url.as_str()).unwrap_or("")
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
