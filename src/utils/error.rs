use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapError {
    #[error("Map provider key is not configured")]
    ConfigurationMissing,

    #[error("Map provider failed to load: {message}")]
    ProviderLoad { message: String },

    #[error("Map provider cannot load outside an interactive display")]
    NonInteractiveEnvironment,

    #[error("Map provider key is empty")]
    EmptyApiKey,

    #[error("Map provider already loaded with a different key")]
    ApiKeyMismatch,

    #[error("Map view was torn down before the provider resolved")]
    ViewTornDown,

    #[error("Listing feed error: {message}")]
    DataFeed { message: String },

    #[error("Map widget error: {message}")]
    WidgetError { message: String },

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field} ({value}): {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

impl MapError {
    /// Errors that belong to the listing feed rather than to the map itself.
    pub fn is_feed_error(&self) -> bool {
        matches!(
            self,
            MapError::DataFeed { .. } | MapError::ApiError(_) | MapError::CsvError(_)
        )
    }

    /// Text suitable for an inline notice next to the map.
    pub fn user_friendly_message(&self) -> String {
        match self {
            MapError::ConfigurationMissing => {
                "The map is unavailable because no map key is configured.".to_string()
            }
            MapError::ProviderLoad { .. }
            | MapError::NonInteractiveEnvironment
            | MapError::EmptyApiKey
            | MapError::ApiKeyMismatch
            | MapError::WidgetError { .. } => "The map could not be loaded.".to_string(),
            MapError::ViewTornDown => "The map was closed.".to_string(),
            MapError::DataFeed { .. } | MapError::ApiError(_) | MapError::CsvError(_) => {
                "Listings could not be refreshed. Showing the previous results.".to_string()
            }
            MapError::ConfigError { .. }
            | MapError::ConfigValidationError { .. }
            | MapError::InvalidConfigValueError { .. }
            | MapError::MissingConfigError { .. } => format!("Invalid configuration: {}", self),
            MapError::IoError(_) | MapError::SerializationError(_) => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MapError::ConfigurationMissing | MapError::EmptyApiKey => {
                "Set map.api_key in the configuration file or the MAP_API_KEY variable"
            }
            MapError::ProviderLoad { .. } => "Reload the view to retry loading the map",
            MapError::NonInteractiveEnvironment => {
                "Run with map.interactive = true to attach a display"
            }
            MapError::ApiKeyMismatch => "Reset the provider loader before switching keys",
            MapError::ViewTornDown => "Open the view again",
            MapError::DataFeed { .. } | MapError::ApiError(_) => {
                "Check the feed endpoint and change a filter to retry"
            }
            MapError::CsvError(_) | MapError::IoError(_) => "Check the listing file path and format",
            MapError::WidgetError { .. } => "Reload the view to recreate the map",
            MapError::SerializationError(_) => "Check that the feed returns a JSON array",
            MapError::ConfigError { .. }
            | MapError::ConfigValidationError { .. }
            | MapError::InvalidConfigValueError { .. }
            | MapError::MissingConfigError { .. } => "Fix the configuration file and start again",
        }
    }
}

pub type Result<T> = std::result::Result<T, MapError>;
