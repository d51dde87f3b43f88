// Adapters layer: concrete implementations of the domain ports.

pub mod csv_feed;
pub mod display;
pub mod headless;
pub mod http_feed;

use crate::config::toml_config::{AppConfig, FeedKind};
use crate::domain::model::{FilterState, GeoItem};
use crate::domain::ports::DataFeed;
use crate::utils::error::{MapError, Result};
use async_trait::async_trait;
use csv_feed::CsvDataFeed;
use http_feed::HttpDataFeed;
use std::time::Duration;

/// The listing feed selected by configuration.
pub enum ConfiguredFeed {
    Http(HttpDataFeed),
    Csv(CsvDataFeed),
}

impl ConfiguredFeed {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let missing = |field: &str| MapError::MissingConfigError {
            field: field.to_string(),
        };
        match config.feed.kind {
            FeedKind::Http => {
                let endpoint = config.feed.endpoint.clone().ok_or_else(|| missing("feed.endpoint"))?;
                let feed = match config.feed.timeout_seconds {
                    Some(secs) => HttpDataFeed::with_timeout(endpoint, Duration::from_secs(secs))?,
                    None => HttpDataFeed::new(endpoint),
                };
                Ok(ConfiguredFeed::Http(
                    feed.with_headers(config.feed.headers.clone().unwrap_or_default()),
                ))
            }
            FeedKind::Csv => {
                let path = config.feed.csv_path.clone().ok_or_else(|| missing("feed.csv_path"))?;
                Ok(ConfiguredFeed::Csv(CsvDataFeed::new(path)))
            }
        }
    }
}

#[async_trait]
impl DataFeed for ConfiguredFeed {
    async fn fetch_filtered_items(&self, filters: &FilterState) -> Result<Vec<GeoItem>> {
        match self {
            ConfiguredFeed::Http(feed) => feed.fetch_filtered_items(filters).await,
            ConfiguredFeed::Csv(feed) => feed.fetch_filtered_items(filters).await,
        }
    }
}
