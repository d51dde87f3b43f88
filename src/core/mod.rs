pub mod info_popup;
pub mod map_host;
pub mod map_view;
pub mod marker_sync;
pub mod provider_loader;
pub mod relocator;

pub use crate::domain::model::{FilterKey, FilterState, GeoItem, Position, PresentationContext, Viewport};
pub use crate::domain::ports::{DataFeed, DisplayTree, MapProvider, MapSettings, MapWidget};
pub use crate::utils::error::Result;
