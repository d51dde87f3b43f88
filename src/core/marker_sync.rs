use crate::core::info_popup::InfoPopupController;
use crate::domain::model::{Bounds, GeoItem, Position};
use crate::domain::ports::{MapWidget, MarkerHandle};
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Zoom applied when the map shows a single listing or focuses one.
pub const DEFAULT_CLOSE_UP_ZOOM: f64 = 15.0;

/// Markers currently on the widget, keyed by item id.
#[derive(Default)]
pub struct MarkerRegistry {
    markers: HashMap<String, Arc<dyn MarkerHandle>>,
}

impl MarkerRegistry {
    pub fn get(&self, id: &str) -> Option<&Arc<dyn MarkerHandle>> {
        self.markers.get(id)
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn ids(&self) -> BTreeSet<String> {
        self.markers.keys().cloned().collect()
    }

    fn positions(&self) -> Vec<Position> {
        self.markers.values().map(|m| m.position()).collect()
    }

    fn insert(&mut self, id: String, marker: Arc<dyn MarkerHandle>) -> Option<Arc<dyn MarkerHandle>> {
        self.markers.insert(id, marker)
    }

    /// Detaches every marker from the widget and empties the registry.
    fn clear(&mut self) {
        for (_, marker) in self.markers.drain() {
            marker.remove();
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewportChange {
    Untouched,
    CloseUp(Position),
    Fitted(Bounds),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub markers: usize,
    pub skipped: usize,
    pub viewport: ViewportChange,
}

/// Content signature of the mappable part of `items`, in order: ids, exact
/// coordinates and everything the popup shows.
pub fn item_signature(items: &[GeoItem]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for item in items {
        if let Some(position) = item.position() {
            item.id.hash(&mut hasher);
            position.lat.to_bits().hash(&mut hasher);
            position.lng.to_bits().hash(&mut hasher);
            item.title.hash(&mut hasher);
            item.locality_text().hash(&mut hasher);
        }
    }
    hasher.finish()
}

pub struct MarkerSynchronizer {
    registry: MarkerRegistry,
    popups: Arc<InfoPopupController>,
    close_up_zoom: f64,
    last_signature: Option<u64>,
}

impl MarkerSynchronizer {
    pub fn new(popups: Arc<InfoPopupController>, close_up_zoom: f64) -> Self {
        Self {
            registry: MarkerRegistry::default(),
            popups,
            close_up_zoom,
            last_signature: None,
        }
    }

    pub fn registry(&self) -> &MarkerRegistry {
        &self.registry
    }

    pub fn popups(&self) -> &Arc<InfoPopupController> {
        &self.popups
    }

    /// Rebuilds every marker from `items` and adjusts the viewport.
    pub fn sync(&mut self, widget: &dyn MapWidget, items: &[GeoItem]) -> SyncReport {
        let mappable: Vec<(&GeoItem, Position)> = items
            .iter()
            .filter_map(|item| item.position().map(|p| (item, p)))
            .collect();
        let skipped = items.len() - mappable.len();

        // The popup may be anchored to a marker that is about to go away.
        self.popups.close();
        self.registry.clear();

        for (item, position) in &mappable {
            let marker = widget.create_marker(*position, &item.title);
            self.attach_popup(&marker, item);
            if let Some(previous) = self.registry.insert(item.id.clone(), marker) {
                tracing::debug!("Duplicate listing id {}, keeping the later entry", item.id);
                previous.remove();
            }
        }

        let viewport = self.apply_viewport_policy(widget);
        self.last_signature = Some(item_signature(items));

        tracing::debug!(
            "Synced {} markers ({} listings without coordinates), viewport {:?}",
            self.registry.len(),
            skipped,
            viewport
        );

        SyncReport {
            markers: self.registry.len(),
            skipped,
            viewport,
        }
    }

    /// Like [`sync`](Self::sync), but skips the rebuild when the mappable
    /// content is identical to the last sync.
    pub fn sync_if_changed(&mut self, widget: &dyn MapWidget, items: &[GeoItem]) -> Option<SyncReport> {
        if self.last_signature == Some(item_signature(items)) {
            tracing::debug!("Listing set unchanged, keeping markers");
            return None;
        }
        Some(self.sync(widget, items))
    }

    fn attach_popup(&self, marker: &Arc<dyn MarkerHandle>, item: &GeoItem) {
        let popups = Arc::clone(&self.popups);
        let anchor = Arc::downgrade(marker);
        let item = item.clone();
        marker.on_activate(Box::new(move || {
            if let Some(marker) = anchor.upgrade() {
                popups.show(&item, marker.as_ref());
            }
        }));
    }

    fn apply_viewport_policy(&self, widget: &dyn MapWidget) -> ViewportChange {
        // Markers stacked on the same spot count once.
        let mut seen = HashSet::new();
        let positions: Vec<Position> = self
            .registry
            .positions()
            .into_iter()
            .filter(|p| seen.insert((p.lat.to_bits(), p.lng.to_bits())))
            .collect();
        match positions.as_slice() {
            [] => ViewportChange::Untouched,
            // A bounds fit on one point has no meaningful zoom.
            [only] => {
                widget.set_zoom(self.close_up_zoom);
                widget.set_center(*only);
                ViewportChange::CloseUp(*only)
            }
            all => match Bounds::from_positions(all.iter().copied()) {
                Some(bounds) => {
                    widget.fit_to_bounds(bounds);
                    ViewportChange::Fitted(bounds)
                }
                None => ViewportChange::Untouched,
            },
        }
    }

    /// Zooms in on a registered listing and opens its popup through the
    /// same activation path as a click. Unknown ids are ignored.
    pub fn focus(&self, widget: &dyn MapWidget, id: &str) -> bool {
        let Some(marker) = self.registry.get(id) else {
            tracing::debug!("Focus requested for unmapped listing {}", id);
            return false;
        };

        if widget.viewport().zoom < self.close_up_zoom {
            widget.set_zoom(self.close_up_zoom);
        }
        widget.set_center(marker.position());
        marker.activate();
        true
    }

    /// Activates a marker without moving the viewport, as a click does.
    pub fn activate(&self, id: &str) -> bool {
        match self.registry.get(id) {
            Some(marker) => {
                marker.activate();
                true
            }
            None => false,
        }
    }

    /// Removes all markers, e.g. when the view goes away.
    pub fn clear(&mut self) {
        self.registry.clear();
        self.last_signature = None;
    }
}
