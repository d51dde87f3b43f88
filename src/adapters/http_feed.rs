use crate::domain::model::{FilterState, GeoItem};
use crate::domain::ports::DataFeed;
use crate::utils::error::{MapError, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

/// Listing feed backed by a JSON endpoint. Filters travel as query
/// parameters; the response is either an array of listings or an object
/// with an `items` array.
pub struct HttpDataFeed {
    client: Client,
    endpoint: String,
    headers: HashMap<String, String>,
}

impl HttpDataFeed {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            headers: HashMap::new(),
        }
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            headers: HashMap::new(),
        })
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    fn decode(payload: serde_json::Value) -> Result<Vec<GeoItem>> {
        let entries = match payload {
            serde_json::Value::Array(entries) => entries,
            serde_json::Value::Object(mut obj) => match obj.remove("items") {
                Some(serde_json::Value::Array(entries)) => entries,
                _ => {
                    return Err(MapError::DataFeed {
                        message: "response object has no items array".to_string(),
                    })
                }
            },
            other => {
                return Err(MapError::DataFeed {
                    message: format!("unexpected response: {}", other),
                })
            }
        };

        let mut items = Vec::with_capacity(entries.len());
        for entry in entries {
            match serde_json::from_value::<GeoItem>(entry) {
                Ok(item) => items.push(item),
                Err(e) => tracing::warn!("Skipping malformed listing: {}", e),
            }
        }
        Ok(items)
    }
}

#[async_trait]
impl DataFeed for HttpDataFeed {
    async fn fetch_filtered_items(&self, filters: &FilterState) -> Result<Vec<GeoItem>> {
        tracing::debug!("Fetching listings from {} with {:?}", self.endpoint, filters);

        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&filters.to_query_pairs());
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        tracing::debug!("Listing feed response status: {}", status);

        if !status.is_success() {
            return Err(MapError::DataFeed {
                message: format!("feed returned HTTP {}", status),
            });
        }

        let payload: serde_json::Value = response.json().await?;
        Self::decode(payload)
    }
}
