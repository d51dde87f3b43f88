use crate::core::provider_loader::ProviderLoader;
use crate::domain::model::{NodeId, Viewport};
use crate::domain::ports::{MapWidget, Popup};
use crate::utils::error::{MapError, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag marking the end of a view's life. Clones observe the same
/// flag, so the host page can tear a view down while it is still loading.
#[derive(Debug, Clone, Default)]
pub struct ViewLifetime {
    torn_down: Arc<AtomicBool>,
}

impl ViewLifetime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tear_down(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }

    pub fn is_alive(&self) -> bool {
        !self.torn_down.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostStatus {
    Idle,
    Loading,
    Ready,
    ConfigurationMissing,
    LoadFailed(String),
    TornDown,
}

/// Owns the view's single widget and its shared popup.
pub struct MapHostManager {
    loader: Arc<ProviderLoader>,
    api_key: Option<String>,
    widget: Option<Arc<dyn MapWidget>>,
    popup: Option<Arc<dyn Popup>>,
    status: HostStatus,
    lifetime: ViewLifetime,
}

// Unsubstituted `${VAR}` placeholders from the config file count as missing.
fn usable_key(api_key: Option<String>) -> Option<String> {
    api_key
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty() && !(k.starts_with("${") && k.ends_with('}')))
}

impl MapHostManager {
    pub fn new(loader: Arc<ProviderLoader>, api_key: Option<String>, lifetime: ViewLifetime) -> Self {
        let api_key = usable_key(api_key);
        let status = if api_key.is_some() {
            HostStatus::Idle
        } else {
            tracing::warn!("No map provider key configured, map disabled");
            HostStatus::ConfigurationMissing
        };
        Self {
            loader,
            api_key,
            widget: None,
            popup: None,
            status,
            lifetime,
        }
    }

    pub fn status(&self) -> &HostStatus {
        &self.status
    }

    pub fn widget(&self) -> Option<&Arc<dyn MapWidget>> {
        self.widget.as_ref()
    }

    pub fn popup(&self) -> Option<&Arc<dyn Popup>> {
        self.popup.as_ref()
    }

    /// Returns the view's widget, creating it on the first successful call.
    /// Later calls hand back the same widget without touching its viewport.
    pub async fn ensure_widget(&mut self, surface: NodeId, initial: Viewport) -> Result<Arc<dyn MapWidget>> {
        if let Some(widget) = &self.widget {
            return Ok(Arc::clone(widget));
        }

        match &self.status {
            HostStatus::ConfigurationMissing => return Err(MapError::ConfigurationMissing),
            HostStatus::TornDown => return Err(MapError::ViewTornDown),
            HostStatus::LoadFailed(message) => {
                return Err(MapError::ProviderLoad {
                    message: message.clone(),
                })
            }
            HostStatus::Idle | HostStatus::Loading | HostStatus::Ready => {}
        }
        let Some(api_key) = self.api_key.clone() else {
            self.status = HostStatus::ConfigurationMissing;
            return Err(MapError::ConfigurationMissing);
        };

        self.status = HostStatus::Loading;
        let acquired = self.loader.acquire(&api_key).await;

        if !self.lifetime.is_alive() {
            tracing::debug!("View torn down while the map provider was loading, discarding");
            self.status = HostStatus::TornDown;
            return Err(MapError::ViewTornDown);
        }

        let handle = acquired.inspect_err(|e| {
            self.status = HostStatus::LoadFailed(e.to_string());
        })?;

        let widget = handle.create_map(surface, initial).inspect_err(|e| {
            tracing::warn!("Map widget creation failed: {}", e);
            self.status = HostStatus::LoadFailed(e.to_string());
        })?;

        tracing::info!(
            "Map widget created on {} at ({:.4}, {:.4}) zoom {}",
            surface,
            initial.center.lat,
            initial.center.lng,
            initial.zoom
        );
        self.popup = Some(widget.create_popup());
        self.widget = Some(Arc::clone(&widget));
        self.status = HostStatus::Ready;
        Ok(widget)
    }

    pub fn teardown(&mut self) {
        self.lifetime.tear_down();
        if let Some(popup) = self.popup.take() {
            popup.close();
        }
        self.widget = None;
        self.status = HostStatus::TornDown;
    }
}
