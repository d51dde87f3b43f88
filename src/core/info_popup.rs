use crate::domain::model::GeoItem;
use crate::domain::ports::{MarkerHandle, Popup};
use crate::utils::escape::html_escape;
use std::sync::Arc;
use url::Url;

/// Shows listing details in the single popup shared by every marker.
pub struct InfoPopupController {
    popup: Arc<dyn Popup>,
    detail_base: Option<Url>,
}

impl InfoPopupController {
    pub fn new(popup: Arc<dyn Popup>, detail_base_url: &str) -> Self {
        let detail_base = match Url::parse(detail_base_url) {
            Ok(url) if !url.cannot_be_a_base() => Some(url),
            Ok(_) | Err(_) => {
                if !detail_base_url.is_empty() {
                    tracing::warn!("Ignoring unusable listing detail URL: {}", detail_base_url);
                }
                None
            }
        };
        Self { popup, detail_base }
    }

    pub fn show(&self, item: &GeoItem, marker: &dyn MarkerHandle) {
        tracing::debug!("Opening popup for listing {}", item.id);
        self.popup.set_content(&self.render_content(item));
        self.popup.open_at(marker);
    }

    pub fn close(&self) {
        self.popup.close();
    }

    /// Link to the listing detail view for `id`, with the id percent-encoded
    /// as a single path segment.
    pub fn detail_url(&self, id: &str) -> Option<Url> {
        let mut url = self.detail_base.clone()?;
        {
            let mut segments = url.path_segments_mut().ok()?;
            segments.pop_if_empty().push(id);
        }
        Some(url)
    }

    pub fn render_content(&self, item: &GeoItem) -> String {
        let mut html = String::from("<div class=\"map-popup\">");
        html.push_str(&format!(
            "<strong class=\"map-popup-title\">{}</strong>",
            html_escape(&item.title)
        ));

        let locality = item.locality_text();
        if !locality.is_empty() {
            html.push_str(&format!(
                "<div class=\"map-popup-locality\">{}</div>",
                html_escape(&locality)
            ));
        }

        if let Some(url) = self.detail_url(&item.id) {
            html.push_str(&format!(
                "<a class=\"map-popup-link\" href=\"{}\">View details</a>",
                html_escape(url.as_str())
            ));
        }

        html.push_str("</div>");
        html
    }
}
