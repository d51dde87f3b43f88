//! Headless map provider.
//!
//! Keeps widget, marker and popup state in memory so a view can be driven
//! without a display. The CLI uses it for scripted sessions and the tests use
//! it to observe what the engine asked the widget to do.

use crate::domain::model::{Bounds, MapOptions, NodeId, Position, Viewport};
use crate::domain::ports::{
    ActivationCallback, MapProvider, MapWidget, MarkerHandle, Popup, ProviderHandle,
};
use crate::utils::error::{MapError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const MAX_ZOOM: f64 = 21.0;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct HeadlessProvider {
    interactive: bool,
    load_delay: Duration,
    failure: Option<String>,
    loads: AtomicUsize,
    maps: Arc<Mutex<Vec<Arc<HeadlessMap>>>>,
}

impl Default for HeadlessProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessProvider {
    pub fn new() -> Self {
        Self {
            interactive: true,
            load_delay: Duration::ZERO,
            failure: None,
            loads: AtomicUsize::new(0),
            maps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Every load attempt fails with `message`.
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Every map created through handles from this provider.
    pub fn maps(&self) -> Vec<Arc<HeadlessMap>> {
        lock(&self.maps).clone()
    }
}

#[async_trait]
impl MapProvider for HeadlessProvider {
    async fn load_script(&self, api_key: &str) -> Result<Arc<dyn ProviderHandle>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Headless provider loading (key length {})", api_key.len());

        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(MapError::ProviderLoad {
                message: message.clone(),
            });
        }

        Ok(Arc::new(HeadlessSdk {
            maps: Arc::clone(&self.maps),
        }))
    }

    fn is_interactive(&self) -> bool {
        self.interactive
    }
}

struct HeadlessSdk {
    maps: Arc<Mutex<Vec<Arc<HeadlessMap>>>>,
}

impl ProviderHandle for HeadlessSdk {
    fn create_map(&self, surface: NodeId, options: MapOptions) -> Result<Arc<dyn MapWidget>> {
        let map = Arc::new(HeadlessMap::with_surface(surface, options));
        lock(&self.maps).push(Arc::clone(&map));
        Ok(map)
    }
}

#[derive(Default)]
struct MapState {
    viewport: Option<Viewport>,
    markers: Vec<Arc<HeadlessMarker>>,
    last_bounds: Option<Bounds>,
    fit_count: usize,
    resize_count: usize,
    popups: Vec<Arc<HeadlessPopup>>,
}

pub struct HeadlessMap {
    surface: Option<NodeId>,
    state: Mutex<MapState>,
}

impl HeadlessMap {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            surface: None,
            state: Mutex::new(MapState {
                viewport: Some(viewport),
                ..MapState::default()
            }),
        }
    }

    fn with_surface(surface: NodeId, viewport: Viewport) -> Self {
        let mut map = Self::new(viewport);
        map.surface = Some(surface);
        map
    }

    pub fn surface(&self) -> Option<NodeId> {
        self.surface
    }

    pub fn attached_markers(&self) -> Vec<Arc<HeadlessMarker>> {
        lock(&self.state)
            .markers
            .iter()
            .filter(|m| m.is_attached())
            .cloned()
            .collect()
    }

    pub fn marker_titled(&self, title: &str) -> Option<Arc<HeadlessMarker>> {
        self.attached_markers().into_iter().find(|m| m.title == title)
    }

    pub fn last_bounds(&self) -> Option<Bounds> {
        lock(&self.state).last_bounds
    }

    pub fn fit_count(&self) -> usize {
        lock(&self.state).fit_count
    }

    pub fn resize_count(&self) -> usize {
        lock(&self.state).resize_count
    }

    pub fn popups(&self) -> Vec<Arc<HeadlessPopup>> {
        lock(&self.state).popups.clone()
    }
}

// Zoom at which `span_degrees` roughly fills a 256px tile.
fn zoom_for_span(span_degrees: f64) -> f64 {
    if span_degrees <= f64::EPSILON {
        return MAX_ZOOM;
    }
    (360.0 / span_degrees).log2().floor().clamp(0.0, MAX_ZOOM)
}

impl MapWidget for HeadlessMap {
    fn create_marker(&self, position: Position, title: &str) -> Arc<dyn MarkerHandle> {
        let marker = Arc::new(HeadlessMarker {
            position,
            title: title.to_string(),
            attached: AtomicBool::new(true),
            listeners: Mutex::new(Vec::new()),
            activations: AtomicUsize::new(0),
        });
        let mut state = lock(&self.state);
        state.markers.retain(|m| m.is_attached());
        state.markers.push(Arc::clone(&marker));
        marker
    }

    fn fit_to_bounds(&self, bounds: Bounds) {
        let span = (bounds.north - bounds.south).max(bounds.east - bounds.west);
        let mut state = lock(&self.state);
        state.viewport = Some(Viewport::new(bounds.center(), zoom_for_span(span)));
        state.last_bounds = Some(bounds);
        state.fit_count += 1;
    }

    fn set_zoom(&self, zoom: f64) {
        let mut state = lock(&self.state);
        if let Some(viewport) = state.viewport.as_mut() {
            viewport.zoom = zoom.clamp(0.0, MAX_ZOOM);
        }
    }

    fn set_center(&self, position: Position) {
        let mut state = lock(&self.state);
        if let Some(viewport) = state.viewport.as_mut() {
            viewport.center = position;
        }
    }

    fn viewport(&self) -> Viewport {
        lock(&self.state)
            .viewport
            .unwrap_or_else(|| Viewport::new(Position::new(0.0, 0.0), 0.0))
    }

    fn notify_resize(&self) {
        lock(&self.state).resize_count += 1;
    }

    fn create_popup(&self) -> Arc<dyn Popup> {
        let popup = Arc::new(HeadlessPopup::default());
        lock(&self.state).popups.push(Arc::clone(&popup));
        popup
    }
}

pub struct HeadlessMarker {
    position: Position,
    title: String,
    attached: AtomicBool,
    listeners: Mutex<Vec<Arc<dyn Fn() + Send + Sync>>>,
    activations: AtomicUsize,
}

impl HeadlessMarker {
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    pub fn activation_count(&self) -> usize {
        self.activations.load(Ordering::SeqCst)
    }

    /// Simulates a user click.
    pub fn click(&self) {
        self.activate();
    }
}

impl MarkerHandle for HeadlessMarker {
    fn position(&self) -> Position {
        self.position
    }

    fn title(&self) -> String {
        self.title.clone()
    }

    fn on_activate(&self, callback: ActivationCallback) {
        lock(&self.listeners).push(Arc::from(callback));
    }

    fn activate(&self) {
        self.activations.fetch_add(1, Ordering::SeqCst);
        // Listeners run outside the lock so they may touch this marker again.
        let listeners = lock(&self.listeners).clone();
        for listener in listeners {
            listener();
        }
    }

    fn remove(&self) {
        self.attached.store(false, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct PopupState {
    content: String,
    anchor: Option<(String, Position)>,
    open: bool,
    open_count: usize,
}

#[derive(Default)]
pub struct HeadlessPopup {
    state: Mutex<PopupState>,
}

impl HeadlessPopup {
    pub fn content(&self) -> String {
        lock(&self.state).content.clone()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open
    }

    /// Title and position of the marker the popup is anchored to.
    pub fn anchor(&self) -> Option<(String, Position)> {
        lock(&self.state).anchor.clone()
    }

    pub fn open_count(&self) -> usize {
        lock(&self.state).open_count
    }
}

impl Popup for HeadlessPopup {
    fn set_content(&self, markup: &str) {
        lock(&self.state).content = markup.to_string();
    }

    fn open_at(&self, marker: &dyn MarkerHandle) {
        let mut state = lock(&self.state);
        state.anchor = Some((marker.title(), marker.position()));
        state.open = true;
        state.open_count += 1;
    }

    fn close(&self) {
        lock(&self.state).open = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_to_bounds_centers_on_region() {
        let map = HeadlessMap::new(Viewport::new(Position::new(0.0, 0.0), 3.0));
        let bounds = Bounds::from_positions(vec![Position::new(21.0, 39.0), Position::new(22.0, 40.0)]).unwrap();
        map.fit_to_bounds(bounds);

        let viewport = map.viewport();
        assert_eq!(viewport.center, Position::new(21.5, 39.5));
        assert_eq!(viewport.zoom, 8.0);
        assert_eq!(map.fit_count(), 1);
    }

    #[test]
    fn test_removed_markers_are_not_attached() {
        let map = HeadlessMap::new(Viewport::new(Position::new(0.0, 0.0), 3.0));
        let a = map.create_marker(Position::new(1.0, 1.0), "a");
        map.create_marker(Position::new(2.0, 2.0), "b");
        a.remove();

        let titles: Vec<String> = map.attached_markers().iter().map(|m| m.title().to_string()).collect();
        assert_eq!(titles, vec!["b".to_string()]);
    }

    #[test]
    fn test_activate_runs_listeners() {
        let map = HeadlessMap::new(Viewport::new(Position::new(0.0, 0.0), 3.0));
        let marker = map.create_marker(Position::new(1.0, 1.0), "a");
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        marker.on_activate(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        marker.activate();
        marker.activate();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_maps_record_their_surface() {
        let provider = HeadlessProvider::new();
        let sdk = provider.load_script("key").await.unwrap();
        let viewport = Viewport::new(Position::new(21.5, 39.1), 11.0);
        sdk.create_map(NodeId(7), viewport).unwrap();

        let maps = provider.maps();
        assert_eq!(maps.len(), 1);
        assert_eq!(maps[0].surface(), Some(NodeId(7)));
        assert_eq!(maps[0].viewport(), viewport);
        assert_eq!(HeadlessMap::new(viewport).surface(), None);
    }

    #[tokio::test]
    async fn test_failing_provider_reports_load_error() {
        let provider = HeadlessProvider::new().failing("script blocked");
        let result = provider.load_script("key").await;
        assert!(matches!(result, Err(MapError::ProviderLoad { .. })));
        assert_eq!(provider.load_count(), 1);
    }
}
