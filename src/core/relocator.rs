use crate::domain::model::{NodeId, PresentationContext};
use crate::domain::ports::{DisplayTree, MapWidget};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub const DEFAULT_RESIZE_DELAY: Duration = Duration::from_millis(50);

/// Where the host surface sat before it went fullscreen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocationMemo {
    pub parent: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub scroll_was_locked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelocationOutcome {
    Relocated,
    /// The original parent was gone, so the surface went to the placeholder.
    FellBackToPlaceholder,
    Unchanged,
}

/// The display-tree nodes a map view is mounted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewSurfaces {
    /// The node the widget renders into. It is moved, never recreated.
    pub host: NodeId,
    /// Top-level layer that holds the host while fullscreen.
    pub overlay: NodeId,
    /// Reserved slot used when the original parent is gone on exit.
    pub placeholder: NodeId,
}

/// Moves the widget's host surface between the page and a fullscreen overlay.
///
/// Only the host node's position in the display tree changes. The widget
/// itself is passed in by reference and only ever receives resize
/// notifications, so pan, zoom and markers survive every transition.
pub struct PresentationRelocator {
    tree: Arc<dyn DisplayTree>,
    surfaces: ViewSurfaces,
    context: PresentationContext,
    memo: Option<RelocationMemo>,
    resize_delay: Duration,
    pending_resizes: Vec<JoinHandle<()>>,
}

impl PresentationRelocator {
    pub fn new(tree: Arc<dyn DisplayTree>, surfaces: ViewSurfaces, resize_delay: Duration) -> Self {
        Self {
            tree,
            surfaces,
            context: PresentationContext::Embedded,
            memo: None,
            resize_delay,
            pending_resizes: Vec::new(),
        }
    }

    pub fn context(&self) -> PresentationContext {
        self.context
    }

    pub fn memo(&self) -> Option<&RelocationMemo> {
        self.memo.as_ref()
    }

    pub fn enter_fullscreen(&mut self, widget: Option<&Arc<dyn MapWidget>>) -> RelocationOutcome {
        if self.context == PresentationContext::Fullscreen {
            return RelocationOutcome::Unchanged;
        }

        let host = self.surfaces.host;
        let memo = RelocationMemo {
            parent: self.tree.parent_of(host),
            next_sibling: self.tree.next_sibling_of(host),
            scroll_was_locked: self.tree.scroll_locked(),
        };

        self.tree.set_scroll_lock(true);
        if let Err(e) = self.tree.insert_before(self.surfaces.overlay, host, None) {
            tracing::warn!("Could not move map into the fullscreen layer: {}", e);
            self.tree.set_scroll_lock(memo.scroll_was_locked);
            return RelocationOutcome::Unchanged;
        }

        tracing::debug!("Map entered fullscreen (memo {:?})", memo);
        self.memo = Some(memo);
        self.context = PresentationContext::Fullscreen;
        self.schedule_resize(widget);
        RelocationOutcome::Relocated
    }

    pub fn exit_fullscreen(&mut self, widget: Option<&Arc<dyn MapWidget>>) -> RelocationOutcome {
        if self.context == PresentationContext::Embedded {
            return RelocationOutcome::Unchanged;
        }

        let memo = self.memo.take();
        let outcome = if memo.is_some_and(|m| self.restore(m)) {
            RelocationOutcome::Relocated
        } else {
            self.move_to_placeholder();
            RelocationOutcome::FellBackToPlaceholder
        };

        self.tree
            .set_scroll_lock(memo.map(|m| m.scroll_was_locked).unwrap_or(false));
        self.context = PresentationContext::Embedded;
        tracing::debug!("Map left fullscreen ({:?})", outcome);
        self.schedule_resize(widget);
        outcome
    }

    pub fn toggle(&mut self, widget: Option<&Arc<dyn MapWidget>>) -> RelocationOutcome {
        match self.context {
            PresentationContext::Embedded => self.enter_fullscreen(widget),
            PresentationContext::Fullscreen => self.exit_fullscreen(widget),
        }
    }

    fn restore(&self, memo: RelocationMemo) -> bool {
        let Some(parent) = memo.parent.filter(|p| self.tree.is_attached(*p)) else {
            return false;
        };
        // The old sibling may have moved away while we were fullscreen.
        let reference = memo
            .next_sibling
            .filter(|s| self.tree.parent_of(*s) == Some(parent));

        match self.tree.insert_before(parent, self.surfaces.host, reference) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Could not restore map to its original position: {}", e);
                false
            }
        }
    }

    fn move_to_placeholder(&self) {
        tracing::info!("Original map container is gone, using the placeholder slot");
        if let Err(e) = self
            .tree
            .insert_before(self.surfaces.placeholder, self.surfaces.host, None)
        {
            tracing::warn!("Could not move map into the placeholder slot: {}", e);
        }
    }

    fn schedule_resize(&mut self, widget: Option<&Arc<dyn MapWidget>>) {
        let Some(widget) = widget.cloned() else {
            tracing::debug!("No map widget yet, skipping resize");
            return;
        };

        self.pending_resizes.retain(|handle| !handle.is_finished());
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let delay = self.resize_delay;
                self.pending_resizes.push(runtime.spawn(async move {
                    tokio::time::sleep(delay).await;
                    widget.notify_resize();
                }));
            }
            Err(_) => widget.notify_resize(),
        }
    }

    /// Waits for every scheduled resize notification to fire.
    pub async fn settle(&mut self) {
        for handle in self.pending_resizes.drain(..) {
            if let Err(e) = handle.await {
                tracing::warn!("Resize notification task failed: {}", e);
            }
        }
    }

    pub fn cancel_pending(&mut self) {
        for handle in self.pending_resizes.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::display::InMemoryDisplayTree;
    use crate::adapters::headless::HeadlessMap;
    use crate::domain::model::{Position, Viewport};

    struct Page {
        tree: Arc<InMemoryDisplayTree>,
        panel: NodeId,
        host: NodeId,
        legend: NodeId,
        placeholder: NodeId,
        overlay: NodeId,
    }

    fn page() -> Page {
        let tree = Arc::new(InMemoryDisplayTree::new());
        let root = tree.root();
        let panel = tree.append(root, "map-panel").unwrap();
        let host = tree.append(panel, "map-host").unwrap();
        let legend = tree.append(panel, "legend").unwrap();
        let placeholder = tree.append(root, "map-placeholder").unwrap();
        let overlay = tree.append(root, "fullscreen-layer").unwrap();
        Page {
            tree,
            panel,
            host,
            legend,
            placeholder,
            overlay,
        }
    }

    fn relocator(page: &Page) -> PresentationRelocator {
        PresentationRelocator::new(
            page.tree.clone(),
            ViewSurfaces {
                host: page.host,
                overlay: page.overlay,
                placeholder: page.placeholder,
            },
            Duration::from_millis(5),
        )
    }

    fn widget() -> Arc<HeadlessMap> {
        Arc::new(HeadlessMap::new(Viewport::new(Position::new(21.5, 39.1), 12.0)))
    }

    #[tokio::test]
    async fn test_round_trip_restores_parent_and_sibling() {
        let page = page();
        let mut relocator = relocator(&page);
        let map = widget();
        let widget: Arc<dyn MapWidget> = map.clone();

        assert_eq!(relocator.enter_fullscreen(Some(&widget)), RelocationOutcome::Relocated);
        assert_eq!(page.tree.parent_of(page.host), Some(page.overlay));
        assert!(page.tree.scroll_locked());

        assert_eq!(relocator.exit_fullscreen(Some(&widget)), RelocationOutcome::Relocated);
        assert_eq!(page.tree.parent_of(page.host), Some(page.panel));
        assert_eq!(page.tree.next_sibling_of(page.host), Some(page.legend));
        assert_eq!(page.tree.children(page.panel), vec![page.host, page.legend]);
        assert!(!page.tree.scroll_locked());

        relocator.settle().await;
        assert_eq!(map.resize_count(), 2);
    }

    #[tokio::test]
    async fn test_double_exit_is_noop() {
        let page = page();
        let mut relocator = relocator(&page);

        relocator.enter_fullscreen(None);
        relocator.exit_fullscreen(None);
        let moves = page.tree.move_count();

        assert_eq!(relocator.exit_fullscreen(None), RelocationOutcome::Unchanged);
        assert_eq!(page.tree.move_count(), moves);
        assert_eq!(relocator.context(), PresentationContext::Embedded);
    }

    #[tokio::test]
    async fn test_double_enter_is_noop() {
        let page = page();
        let mut relocator = relocator(&page);

        relocator.enter_fullscreen(None);
        let memo = *relocator.memo().unwrap();
        assert_eq!(relocator.enter_fullscreen(None), RelocationOutcome::Unchanged);
        assert_eq!(relocator.memo(), Some(&memo));
        assert_eq!(memo.parent, Some(page.panel));
    }

    #[tokio::test]
    async fn test_missing_parent_falls_back_to_placeholder() {
        let page = page();
        let mut relocator = relocator(&page);

        relocator.enter_fullscreen(None);
        page.tree.remove(page.panel);

        assert_eq!(
            relocator.exit_fullscreen(None),
            RelocationOutcome::FellBackToPlaceholder
        );
        assert_eq!(page.tree.parent_of(page.host), Some(page.placeholder));
        assert!(!page.tree.scroll_locked());
    }

    #[tokio::test]
    async fn test_moved_sibling_restores_at_end_of_parent() {
        let page = page();
        let mut relocator = relocator(&page);

        relocator.enter_fullscreen(None);
        page.tree.insert_before(page.placeholder, page.legend, None).unwrap();
        relocator.exit_fullscreen(None);

        assert_eq!(page.tree.children(page.panel), vec![page.host]);
    }

    #[tokio::test]
    async fn test_prior_scroll_lock_is_preserved() {
        let page = page();
        let mut relocator = relocator(&page);
        page.tree.set_scroll_lock(true);

        relocator.enter_fullscreen(None);
        relocator.exit_fullscreen(None);

        assert!(page.tree.scroll_locked());
    }

    #[tokio::test]
    async fn test_quick_reversal_fires_both_resizes() {
        let page = page();
        let mut relocator = relocator(&page);
        let map = widget();
        let widget: Arc<dyn MapWidget> = map.clone();
        let before = map.viewport();

        relocator.toggle(Some(&widget));
        relocator.toggle(Some(&widget));
        relocator.settle().await;

        assert_eq!(map.resize_count(), 2);
        assert_eq!(map.viewport(), before);
    }

    #[test]
    fn test_resize_without_runtime_is_immediate() {
        let page = page();
        let mut relocator = relocator(&page);
        let map = widget();
        let widget: Arc<dyn MapWidget> = map.clone();

        relocator.enter_fullscreen(Some(&widget));

        assert_eq!(map.resize_count(), 1);
    }
}
