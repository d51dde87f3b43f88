pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::{AppConfig, FeedKind};

pub use adapters::{
    csv_feed::CsvDataFeed, display::InMemoryDisplayTree, headless::HeadlessProvider,
    http_feed::HttpDataFeed, ConfiguredFeed,
};
pub use self::core::{
    map_host::{HostStatus, ViewLifetime},
    map_view::{MapView, ViewEvent, ViewNotice},
    marker_sync::DEFAULT_CLOSE_UP_ZOOM,
    provider_loader::ProviderLoader,
    relocator::{RelocationOutcome, ViewSurfaces},
};
pub use domain::model::{FilterKey, FilterState, GeoItem, NodeId, Position, PresentationContext, Viewport};
pub use utils::error::{MapError, Result};
