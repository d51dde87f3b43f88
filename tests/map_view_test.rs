use async_trait::async_trait;
use listing_map::domain::ports::{DataFeed, DisplayTree, MapSettings, MapWidget};
use listing_map::{
    FilterKey, FilterState, GeoItem, HeadlessProvider, HostStatus, InMemoryDisplayTree, MapError,
    MapView, NodeId, Position, PresentationContext, ProviderLoader, RelocationOutcome, Result,
    ViewEvent, ViewNotice, ViewSurfaces, Viewport, DEFAULT_CLOSE_UP_ZOOM,
};
use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct MockFeed {
    responses: Arc<Mutex<VecDeque<Result<Vec<GeoItem>>>>>,
    calls: Arc<Mutex<Vec<FilterState>>>,
}

impl MockFeed {
    async fn respond(&self, response: Result<Vec<GeoItem>>) {
        self.responses.lock().await.push_back(response);
    }

    async fn calls(&self) -> Vec<FilterState> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl DataFeed for MockFeed {
    async fn fetch_filtered_items(&self, filters: &FilterState) -> Result<Vec<GeoItem>> {
        self.calls.lock().await.push(filters.clone());
        self.responses
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}

struct MockSettings {
    api_key: Option<String>,
}

impl MapSettings for MockSettings {
    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn initial_viewport(&self) -> Viewport {
        Viewport::new(Position::new(21.54, 39.17), 11.0)
    }

    fn close_up_zoom(&self) -> f64 {
        DEFAULT_CLOSE_UP_ZOOM
    }

    fn resize_delay_ms(&self) -> u64 {
        5
    }

    fn detail_base_url(&self) -> &str {
        "https://listings.example.com/listing"
    }
}

struct Page {
    tree: Arc<InMemoryDisplayTree>,
    panel: NodeId,
    host: NodeId,
    legend: NodeId,
    overlay: NodeId,
    placeholder: NodeId,
}

impl Page {
    fn new() -> Self {
        let tree = Arc::new(InMemoryDisplayTree::new());
        let root = tree.root();
        let panel = tree.append(root, "map-panel").unwrap();
        let host = tree.append(panel, "map-host").unwrap();
        let legend = tree.append(panel, "map-legend").unwrap();
        let placeholder = tree.append(root, "map-placeholder").unwrap();
        let overlay = tree.append(root, "fullscreen-layer").unwrap();
        Self {
            tree,
            panel,
            host,
            legend,
            overlay,
            placeholder,
        }
    }

    fn surfaces(&self) -> ViewSurfaces {
        ViewSurfaces {
            host: self.host,
            overlay: self.overlay,
            placeholder: self.placeholder,
        }
    }
}

fn listings() -> Vec<GeoItem> {
    vec![
        GeoItem::new("a", "Sea view villa").at(21.5, 39.1).with_locality("Al Rawdah"),
        GeoItem::new("b", "Unlocated flat").at(f64::NAN, 39.2),
        GeoItem::new("c", "Family flat").at(21.7, 39.3).with_locality("Al Safa"),
    ]
}

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn build_view(
    provider: Arc<HeadlessProvider>,
    feed: MockFeed,
    page: &Page,
    api_key: Option<&str>,
    query: &str,
) -> MapView<MockFeed> {
    let settings = MockSettings {
        api_key: api_key.map(str::to_string),
    };
    MapView::new(
        &settings,
        Arc::new(ProviderLoader::new(provider)),
        page.tree.clone(),
        page.surfaces(),
        feed,
        query,
    )
}

#[tokio::test]
async fn test_start_places_markers_for_mappable_listings() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed.clone(), &page, Some("key"), "");

    view.start().await;

    assert_eq!(view.status(), &HostStatus::Ready);
    assert_eq!(view.marker_ids(), ids(&["a", "c"]));
    assert_eq!(view.items().len(), 3);
    assert!(view.notices().is_empty());
    assert_eq!(provider.load_count(), 1);

    let map = &provider.maps()[0];
    assert_eq!(map.surface(), Some(page.host));
    assert_eq!(map.attached_markers().len(), 2);
    let bounds = map.last_bounds().unwrap();
    assert!(bounds.contains(Position::new(21.5, 39.1)));
    assert!(bounds.contains(Position::new(21.7, 39.3)));
}

#[tokio::test]
async fn test_initial_filters_come_from_query() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    let page = Page::new();
    let mut view = build_view(
        provider,
        feed.clone(),
        &page,
        Some("key"),
        "?neighborhood=Al+Rawdah&dealType=rent&propertyType=",
    );

    view.start().await;

    let calls = feed.calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get(FilterKey::Neighborhood), Some("Al Rawdah"));
    assert_eq!(calls[0].get(FilterKey::DealType), Some("rent"));
    assert_eq!(calls[0].get(FilterKey::PropertyType), None);
}

#[tokio::test]
async fn test_successive_filter_changes_keep_latest_results() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    feed.respond(Ok(vec![GeoItem::new("c", "Family flat").at(21.7, 39.3)])).await;
    feed.respond(Ok(vec![
        GeoItem::new("d", "Shop").at(21.4, 39.0),
        GeoItem::new("e", "Office").at(21.45, 39.05),
    ]))
    .await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed.clone(), &page, Some("key"), "");

    view.start().await;
    view.set_filters(FilterState::new().with(FilterKey::DealType, "rent")).await;
    view.set_filters(FilterState::new().with(FilterKey::DealType, "sale")).await;

    assert_eq!(view.marker_ids(), ids(&["d", "e"]));
    assert_eq!(provider.maps()[0].attached_markers().len(), 2);
    assert_eq!(provider.maps().len(), 1);
    assert_eq!(provider.load_count(), 1);
}

#[tokio::test]
async fn test_single_result_zooms_close() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(vec![GeoItem::new("a", "Villa").at(21.5, 39.1)])).await;
    let page = Page::new();
    let mut view = build_view(provider, feed, &page, Some("key"), "");

    view.start().await;

    assert_eq!(
        view.viewport(),
        Some(Viewport::new(Position::new(21.5, 39.1), DEFAULT_CLOSE_UP_ZOOM))
    );
}

#[tokio::test]
async fn test_unchanged_filters_do_not_refetch() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    let page = Page::new();
    let mut view = build_view(provider, feed.clone(), &page, Some("key"), "deal_type=rent");

    view.start().await;
    view.set_filters(FilterState::from_query("deal_type=rent&neighborhood=")).await;

    assert_eq!(feed.calls().await.len(), 1);
}

#[tokio::test]
async fn test_feed_failure_keeps_existing_markers() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    feed.respond(Err(MapError::DataFeed {
        message: "HTTP 503".to_string(),
    }))
    .await;
    feed.respond(Ok(vec![GeoItem::new("a", "Villa").at(21.5, 39.1)])).await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed, &page, Some("key"), "");

    view.start().await;
    let viewport = view.viewport();
    let marker = provider.maps()[0].marker_titled("Sea view villa").unwrap();

    view.set_filters(FilterState::new().with(FilterKey::PropertyType, "villa")).await;

    assert_eq!(view.marker_ids(), ids(&["a", "c"]));
    assert_eq!(view.viewport(), viewport);
    assert!(marker.is_attached());
    assert!(matches!(view.notices().as_slice(), [ViewNotice::DataFeed(_)]));

    view.set_filters(FilterState::new().with(FilterKey::PropertyType, "flat")).await;
    assert!(view.notices().is_empty());
    assert_eq!(view.marker_ids(), ids(&["a"]));
}

#[tokio::test]
async fn test_missing_key_shows_notice_and_still_lists() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed, &page, None, "");

    view.start().await;

    assert_eq!(view.notices(), vec![&ViewNotice::ConfigurationMissing]);
    assert_eq!(view.status(), &HostStatus::ConfigurationMissing);
    assert_eq!(view.items().len(), 3);
    assert!(view.marker_ids().is_empty());
    assert_eq!(provider.load_count(), 0);
}

#[tokio::test]
async fn test_provider_failure_shows_notice() {
    let provider = Arc::new(HeadlessProvider::new().failing("script blocked"));
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    let page = Page::new();
    let mut view = build_view(provider, feed, &page, Some("key"), "");

    view.start().await;

    assert!(matches!(
        view.notices().as_slice(),
        [ViewNotice::ProviderUnavailable(_)]
    ));
    assert_eq!(view.items().len(), 3);
    assert!(view.widget().is_none());
}

#[tokio::test]
async fn test_fullscreen_round_trip_keeps_widget_state() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed, &page, Some("key"), "");
    view.start().await;

    let widget: Arc<dyn MapWidget> = Arc::clone(view.widget().unwrap());
    widget.set_zoom(13.0);
    let viewport = view.viewport();
    let markers = view.marker_ids();

    assert_eq!(view.enter_fullscreen(), RelocationOutcome::Relocated);
    assert_eq!(view.context(), PresentationContext::Fullscreen);
    assert_eq!(page.tree.parent_of(page.host), Some(page.overlay));
    assert!(page.tree.scroll_locked());

    assert_eq!(view.exit_fullscreen(), RelocationOutcome::Relocated);
    view.settle().await;

    assert!(Arc::ptr_eq(&widget, view.widget().unwrap()));
    assert_eq!(view.viewport(), viewport);
    assert_eq!(view.marker_ids(), markers);
    assert_eq!(page.tree.parent_of(page.host), Some(page.panel));
    assert_eq!(page.tree.next_sibling_of(page.host), Some(page.legend));
    assert!(!page.tree.scroll_locked());
    assert_eq!(provider.maps().len(), 1);
    assert_eq!(provider.maps()[0].resize_count(), 2);
}

#[tokio::test]
async fn test_double_exit_changes_nothing() {
    let provider = Arc::new(HeadlessProvider::new());
    let page = Page::new();
    let mut view = build_view(provider, MockFeed::default(), &page, Some("key"), "");
    view.start().await;

    view.enter_fullscreen();
    view.exit_fullscreen();
    let moves = page.tree.move_count();

    assert_eq!(view.exit_fullscreen(), RelocationOutcome::Unchanged);
    assert_eq!(page.tree.move_count(), moves);
}

#[tokio::test]
async fn test_fullscreen_without_widget_still_relocates() {
    let provider = Arc::new(HeadlessProvider::new());
    let page = Page::new();
    let mut view = build_view(provider, MockFeed::default(), &page, None, "");
    view.start().await;

    assert_eq!(view.enter_fullscreen(), RelocationOutcome::Relocated);
    assert_eq!(page.tree.parent_of(page.host), Some(page.overlay));
    assert_eq!(view.exit_fullscreen(), RelocationOutcome::Relocated);
    view.settle().await;
    assert_eq!(page.tree.parent_of(page.host), Some(page.panel));
}

#[tokio::test]
async fn test_escape_leaves_fullscreen() {
    let provider = Arc::new(HeadlessProvider::new());
    let page = Page::new();
    let mut view = build_view(provider, MockFeed::default(), &page, Some("key"), "");
    view.start().await;

    view.handle(ViewEvent::ToggleFullscreen).await;
    assert_eq!(view.context(), PresentationContext::Fullscreen);

    view.handle(ViewEvent::KeyPressed("Enter".to_string())).await;
    assert_eq!(view.context(), PresentationContext::Fullscreen);

    view.handle(ViewEvent::KeyPressed("Escape".to_string())).await;
    assert_eq!(view.context(), PresentationContext::Embedded);
    assert_eq!(page.tree.parent_of(page.host), Some(page.panel));
}

#[tokio::test]
async fn test_focus_and_click_share_popup_path() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed, &page, Some("key"), "");
    view.start().await;
    let map = provider.maps()[0].clone();
    let popup = map.popups()[0].clone();

    view.handle(ViewEvent::FocusItem("c".to_string())).await;
    assert!(popup.is_open());
    assert!(popup.content().contains("Family flat"));
    assert!(popup.content().contains("https://listings.example.com/listing/c"));
    assert_eq!(view.viewport().unwrap().center, Position::new(21.7, 39.3));

    let viewport = view.viewport();
    view.handle(ViewEvent::MarkerClicked("a".to_string())).await;
    assert!(popup.content().contains("Al Rawdah"));
    assert_eq!(view.viewport(), viewport);
    assert_eq!(map.popups().len(), 1);

    view.handle(ViewEvent::FocusItem("missing-id".to_string())).await;
    assert_eq!(view.viewport(), viewport);
    assert_eq!(popup.open_count(), 2);
}

#[tokio::test]
async fn test_teardown_while_loading_discards_provider() {
    let provider = Arc::new(HeadlessProvider::new().with_load_delay(Duration::from_millis(20)));
    let feed = MockFeed::default();
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed.clone(), &page, Some("key"), "");
    let lifetime = view.lifetime();

    tokio::join!(view.start(), async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        lifetime.tear_down();
    });

    assert!(provider.maps().is_empty());
    assert!(view.widget().is_none());
    assert!(view.notices().is_empty());
    assert!(feed.calls().await.is_empty());
}

#[tokio::test]
async fn test_teardown_releases_fullscreen() {
    let provider = Arc::new(HeadlessProvider::new());
    let feed = MockFeed::default();
    feed.respond(Ok(listings())).await;
    let page = Page::new();
    let mut view = build_view(provider.clone(), feed, &page, Some("key"), "");
    view.start().await;
    view.enter_fullscreen();

    view.teardown();

    assert!(!page.tree.scroll_locked());
    assert_eq!(page.tree.parent_of(page.host), Some(page.panel));
    assert!(provider.maps()[0].attached_markers().is_empty());
    assert_eq!(view.status(), &HostStatus::TornDown);
}
