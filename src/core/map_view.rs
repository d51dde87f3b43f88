use crate::core::info_popup::InfoPopupController;
use crate::core::map_host::{HostStatus, MapHostManager, ViewLifetime};
use crate::core::marker_sync::{MarkerSynchronizer, SyncReport};
use crate::core::provider_loader::ProviderLoader;
use crate::core::relocator::{PresentationRelocator, RelocationOutcome, ViewSurfaces};
use crate::domain::model::{FilterState, GeoItem, PresentationContext, Viewport};
use crate::domain::ports::{DataFeed, DisplayTree, MapSettings, MapWidget};
use crate::utils::error::MapError;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Inline messages the surrounding page shows next to the map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNotice {
    ConfigurationMissing,
    ProviderUnavailable(String),
    DataFeed(String),
}

impl ViewNotice {
    fn from_map_error(error: &MapError) -> Self {
        match error {
            MapError::ConfigurationMissing => ViewNotice::ConfigurationMissing,
            other => ViewNotice::ProviderUnavailable(other.to_string()),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ViewNotice::ConfigurationMissing => MapError::ConfigurationMissing.user_friendly_message(),
            ViewNotice::ProviderUnavailable(_) => "The map could not be loaded.".to_string(),
            ViewNotice::DataFeed(_) => {
                "Listings could not be refreshed. Showing the previous results.".to_string()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewEvent {
    FiltersChanged(FilterState),
    FocusItem(String),
    MarkerClicked(String),
    ToggleFullscreen,
    EnterFullscreen,
    ExitFullscreen,
    KeyPressed(String),
}

/// The map panel of the listings page.
///
/// Every entry point takes `&mut self`, so filter changes, clicks and
/// fullscreen requests are applied one at a time in arrival order.
pub struct MapView<F: DataFeed> {
    feed: F,
    host: MapHostManager,
    relocator: PresentationRelocator,
    synchronizer: Option<MarkerSynchronizer>,
    surfaces: ViewSurfaces,
    initial_viewport: Viewport,
    close_up_zoom: f64,
    detail_base_url: String,
    filters: FilterState,
    items: Vec<GeoItem>,
    map_notice: Option<ViewNotice>,
    feed_notice: Option<ViewNotice>,
    lifetime: ViewLifetime,
    started: bool,
}

impl<F: DataFeed> MapView<F> {
    /// `initial_query` is the navigation query string; it is read here once
    /// and never again.
    pub fn new<S: MapSettings>(
        settings: &S,
        loader: Arc<ProviderLoader>,
        tree: Arc<dyn DisplayTree>,
        surfaces: ViewSurfaces,
        feed: F,
        initial_query: &str,
    ) -> Self {
        let lifetime = ViewLifetime::new();
        let host = MapHostManager::new(
            loader,
            settings.api_key().map(str::to_string),
            lifetime.clone(),
        );
        let map_notice = match host.status() {
            HostStatus::ConfigurationMissing => Some(ViewNotice::ConfigurationMissing),
            _ => None,
        };
        let relocator = PresentationRelocator::new(
            tree,
            surfaces,
            Duration::from_millis(settings.resize_delay_ms()),
        );

        Self {
            feed,
            host,
            relocator,
            synchronizer: None,
            surfaces,
            initial_viewport: settings.initial_viewport(),
            close_up_zoom: settings.close_up_zoom(),
            detail_base_url: settings.detail_base_url().to_string(),
            filters: FilterState::from_query(initial_query),
            items: Vec::new(),
            map_notice,
            feed_notice: None,
            lifetime,
            started: false,
        }
    }

    /// Loads the map and the first page of listings. Map failures only
    /// produce a notice; listings are fetched either way.
    pub async fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;

        if self.map_notice.is_none() {
            match self
                .host
                .ensure_widget(self.surfaces.host, self.initial_viewport)
                .await
            {
                Ok(_) => self.attach_synchronizer(),
                Err(MapError::ViewTornDown) => return,
                Err(e) => {
                    tracing::warn!("Map unavailable: {}", e);
                    self.map_notice = Some(ViewNotice::from_map_error(&e));
                }
            }
        }

        self.refresh().await;
    }

    fn attach_synchronizer(&mut self) {
        if self.synchronizer.is_some() {
            return;
        }
        if let Some(popup) = self.host.popup() {
            let popups = Arc::new(InfoPopupController::new(
                Arc::clone(popup),
                &self.detail_base_url,
            ));
            self.synchronizer = Some(MarkerSynchronizer::new(popups, self.close_up_zoom));
        }
    }

    /// Applies a new filter selection. Identical selections are ignored.
    pub async fn set_filters(&mut self, filters: FilterState) {
        if self.started && filters == self.filters {
            tracing::debug!("Filters unchanged, nothing to fetch");
            return;
        }
        self.filters = filters;
        self.refresh().await;
    }

    /// Fetches listings for the current filters. On failure the previous
    /// markers and viewport stay as they are.
    pub async fn refresh(&mut self) {
        if !self.lifetime.is_alive() {
            return;
        }

        let result = self.feed.fetch_filtered_items(&self.filters).await;
        if !self.lifetime.is_alive() {
            tracing::debug!("View torn down during fetch, dropping results");
            return;
        }

        match result {
            Ok(items) => {
                tracing::info!("Fetched {} listings", items.len());
                self.feed_notice = None;
                self.items = items;
                self.apply_items();
            }
            Err(e) => {
                tracing::warn!("Listing feed failed: {}", e);
                self.feed_notice = Some(ViewNotice::DataFeed(e.to_string()));
            }
        }
    }

    fn apply_items(&mut self) -> Option<SyncReport> {
        let widget = self.host.widget()?;
        let synchronizer = self.synchronizer.as_mut()?;
        synchronizer.sync_if_changed(widget.as_ref(), &self.items)
    }

    pub fn focus(&self, id: &str) -> bool {
        match (self.host.widget(), self.synchronizer.as_ref()) {
            (Some(widget), Some(synchronizer)) => synchronizer.focus(widget.as_ref(), id),
            _ => false,
        }
    }

    pub fn click_marker(&self, id: &str) -> bool {
        self.synchronizer
            .as_ref()
            .map(|s| s.activate(id))
            .unwrap_or(false)
    }

    pub fn enter_fullscreen(&mut self) -> RelocationOutcome {
        self.relocator.enter_fullscreen(self.host.widget())
    }

    pub fn exit_fullscreen(&mut self) -> RelocationOutcome {
        self.relocator.exit_fullscreen(self.host.widget())
    }

    pub fn toggle_fullscreen(&mut self) -> RelocationOutcome {
        self.relocator.toggle(self.host.widget())
    }

    /// Escape leaves fullscreen. Returns whether the key was handled.
    pub fn handle_key(&mut self, key: &str) -> bool {
        if key.eq_ignore_ascii_case("escape") || key.eq_ignore_ascii_case("esc") {
            return self.exit_fullscreen() != RelocationOutcome::Unchanged;
        }
        false
    }

    pub async fn handle(&mut self, event: ViewEvent) {
        tracing::debug!("Map view event: {:?}", event);
        match event {
            ViewEvent::FiltersChanged(filters) => self.set_filters(filters).await,
            ViewEvent::FocusItem(id) => {
                self.focus(&id);
            }
            ViewEvent::MarkerClicked(id) => {
                self.click_marker(&id);
            }
            ViewEvent::ToggleFullscreen => {
                self.toggle_fullscreen();
            }
            ViewEvent::EnterFullscreen => {
                self.enter_fullscreen();
            }
            ViewEvent::ExitFullscreen => {
                self.exit_fullscreen();
            }
            ViewEvent::KeyPressed(key) => {
                self.handle_key(&key);
            }
        }
    }

    /// Waits for pending resize notifications.
    pub async fn settle(&mut self) {
        self.relocator.settle().await;
    }

    pub fn teardown(&mut self) {
        self.lifetime.tear_down();
        self.exit_fullscreen();
        self.relocator.cancel_pending();
        if let Some(synchronizer) = self.synchronizer.as_mut() {
            synchronizer.clear();
        }
        self.synchronizer = None;
        self.host.teardown();
        tracing::info!("Map view torn down");
    }

    /// A handle the page can use to tear the view down from elsewhere, e.g.
    /// while [`start`](Self::start) is still waiting on the provider.
    pub fn lifetime(&self) -> ViewLifetime {
        self.lifetime.clone()
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn items(&self) -> &[GeoItem] {
        &self.items
    }

    pub fn notices(&self) -> Vec<&ViewNotice> {
        self.map_notice.iter().chain(self.feed_notice.iter()).collect()
    }

    pub fn marker_ids(&self) -> BTreeSet<String> {
        self.synchronizer
            .as_ref()
            .map(|s| s.registry().ids())
            .unwrap_or_default()
    }

    pub fn context(&self) -> PresentationContext {
        self.relocator.context()
    }

    pub fn widget(&self) -> Option<&Arc<dyn MapWidget>> {
        self.host.widget()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.host.widget().map(|w| w.viewport())
    }

    pub fn status(&self) -> &HostStatus {
        self.host.status()
    }
}
