use crate::domain::model::{Bounds, FilterState, GeoItem, MapOptions, NodeId, Position, Viewport};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub type ActivationCallback = Box<dyn Fn() + Send + Sync>;

/// Entry point of an external mapping SDK.
#[async_trait]
pub trait MapProvider: Send + Sync {
    /// Loads the SDK for `api_key`. Called at most once per successful load
    /// by [`crate::core::provider_loader::ProviderLoader`].
    async fn load_script(&self, api_key: &str) -> Result<Arc<dyn ProviderHandle>>;

    /// Whether a display is attached that a widget could render into.
    fn is_interactive(&self) -> bool {
        true
    }
}

/// A loaded SDK capable of creating map widgets.
pub trait ProviderHandle: Send + Sync {
    fn create_map(&self, surface: NodeId, options: MapOptions) -> Result<Arc<dyn MapWidget>>;
}

pub trait MapWidget: Send + Sync {
    fn create_marker(&self, position: Position, title: &str) -> Arc<dyn MarkerHandle>;
    fn fit_to_bounds(&self, bounds: Bounds);
    fn set_zoom(&self, zoom: f64);
    fn set_center(&self, position: Position);
    fn viewport(&self) -> Viewport;
    /// Recomputes the rendering size after the host surface changed size.
    fn notify_resize(&self);
    fn create_popup(&self) -> Arc<dyn Popup>;
}

pub trait MarkerHandle: Send + Sync {
    fn position(&self) -> Position;
    fn title(&self) -> String;
    fn on_activate(&self, callback: ActivationCallback);
    /// Runs the activation listeners exactly as a user click would.
    fn activate(&self);
    /// Detaches the marker from its widget.
    fn remove(&self);
}

pub trait Popup: Send + Sync {
    /// `markup` is already escaped by the caller.
    fn set_content(&self, markup: &str);
    /// Opening closes whatever this popup was showing before.
    fn open_at(&self, marker: &dyn MarkerHandle);
    fn close(&self);
}

/// The retained display tree the widget's host surface lives in.
pub trait DisplayTree: Send + Sync {
    /// True when `node` exists and is still attached to the tree.
    fn is_attached(&self, node: NodeId) -> bool;
    fn parent_of(&self, node: NodeId) -> Option<NodeId>;
    fn next_sibling_of(&self, node: NodeId) -> Option<NodeId>;
    /// Moves `node` under `parent`, before `reference` or last when `None`.
    /// Moving a node keeps it alive; nothing is re-rendered from scratch.
    fn insert_before(&self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> Result<()>;
    fn scroll_locked(&self) -> bool;
    fn set_scroll_lock(&self, locked: bool);
}

/// Source of listings matching the current filters.
#[async_trait]
pub trait DataFeed: Send + Sync {
    async fn fetch_filtered_items(&self, filters: &FilterState) -> Result<Vec<GeoItem>>;
}

/// Resolved settings the map view needs at start.
pub trait MapSettings: Send + Sync {
    fn api_key(&self) -> Option<&str>;
    fn initial_viewport(&self) -> Viewport;
    fn close_up_zoom(&self) -> f64;
    fn resize_delay_ms(&self) -> u64;
    fn detail_base_url(&self) -> &str;
}
