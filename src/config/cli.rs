use crate::config::toml_config::{AppConfig, DetailConfig, FeedKind, ViewConfig};
use crate::domain::model::{FilterKey, FilterState};
use crate::utils::error::{MapError, Result};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "listing-map")]
#[command(about = "Drives a headless listings map view and reports what it did")]
pub struct CliArgs {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Map provider key (overrides map.api_key)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Listing feed URL (switches the feed to HTTP)
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Listing CSV file (switches the feed to CSV)
    #[arg(long, conflicts_with = "endpoint")]
    pub csv: Option<String>,

    /// Listing detail base URL used for popup links
    #[arg(long)]
    pub detail_url: Option<String>,

    /// Navigation query the view starts from, e.g. "neighborhood=Al+Rawdah&deal_type=rent"
    #[arg(long)]
    pub query: Option<String>,

    /// Filter change applied after start, as key=value; repeat for a new selection each time
    #[arg(long = "filter", value_name = "KEY=VALUE")]
    pub filters: Vec<String>,

    /// Listing id to focus after filtering
    #[arg(long)]
    pub focus: Option<String>,

    /// Enter fullscreen and leave it again with Escape
    #[arg(long)]
    pub fullscreen: bool,

    /// Pretend no display is attached
    #[arg(long)]
    pub non_interactive: bool,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Emit logs as JSON")]
    pub log_json: bool,
}

impl CliArgs {
    /// Loads the config file, if any, and applies command line overrides.
    pub fn resolve_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_file(path)?,
            None => AppConfig::default(),
        };

        if let Some(key) = &self.api_key {
            config.map.api_key = Some(key.clone());
        }
        if self.non_interactive {
            config.map.interactive = Some(false);
        }
        if let Some(endpoint) = &self.endpoint {
            config.feed.kind = FeedKind::Http;
            config.feed.endpoint = Some(endpoint.clone());
        }
        if let Some(csv) = &self.csv {
            config.feed.kind = FeedKind::Csv;
            config.feed.csv_path = Some(csv.clone());
        }
        if let Some(base_url) = &self.detail_url {
            config.detail = Some(DetailConfig {
                base_url: base_url.clone(),
            });
        }
        if let Some(query) = &self.query {
            config.view = Some(ViewConfig {
                initial_query: Some(query.clone()),
            });
        }

        Ok(config)
    }

    /// Each `--filter` adds one constraint on top of the starting query, so
    /// the result is a sequence of successively narrower selections.
    pub fn filter_steps(&self, start: &FilterState) -> Result<Vec<FilterState>> {
        let mut current = start.clone();
        let mut steps = Vec::new();
        for raw in &self.filters {
            let (name, value) = raw.split_once('=').ok_or_else(|| MapError::InvalidConfigValueError {
                field: "--filter".to_string(),
                value: raw.clone(),
                reason: "expected KEY=VALUE".to_string(),
            })?;
            let key = FilterKey::from_query_name(name.trim()).ok_or_else(|| {
                MapError::InvalidConfigValueError {
                    field: "--filter".to_string(),
                    value: raw.clone(),
                    reason: format!(
                        "unknown filter; expected one of {}",
                        FilterKey::ALL.map(FilterKey::query_name).join(", ")
                    ),
                }
            })?;
            current.set(key, value);
            steps.push(current.clone());
        }
        Ok(steps)
    }
}
