use crate::domain::ports::{MapProvider, ProviderHandle};
use crate::utils::error::{MapError, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type LoadOutcome = std::result::Result<Arc<dyn ProviderHandle>, String>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

struct Acquisition {
    api_key: String,
    load: SharedLoad,
}

impl Acquisition {
    fn failed(&self) -> bool {
        matches!(self.load.peek(), Some(Err(_)))
    }
}

/// Loads the mapping SDK once per process.
///
/// Every caller awaits the same shared acquisition, so concurrent views never
/// trigger a second load. A failed load stays failed until [`reset`] is called;
/// there is no automatic retry.
///
/// [`reset`]: ProviderLoader::reset
pub struct ProviderLoader {
    provider: Arc<dyn MapProvider>,
    current: Mutex<Option<Acquisition>>,
}

impl ProviderLoader {
    pub fn new(provider: Arc<dyn MapProvider>) -> Self {
        Self {
            provider,
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Acquisition>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn acquire(&self, api_key: &str) -> Result<Arc<dyn ProviderHandle>> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(MapError::EmptyApiKey);
        }
        if !self.provider.is_interactive() {
            return Err(MapError::NonInteractiveEnvironment);
        }

        let load = {
            let mut current = self.current();
            match current.as_ref() {
                Some(acquisition) if acquisition.api_key == api_key => {
                    tracing::debug!("Joining existing map provider acquisition");
                    acquisition.load.clone()
                }
                Some(acquisition) if !acquisition.failed() => {
                    return Err(MapError::ApiKeyMismatch);
                }
                _ => {
                    let load = self.start_load(api_key);
                    *current = Some(Acquisition {
                        api_key: api_key.to_string(),
                        load: load.clone(),
                    });
                    load
                }
            }
        };

        load.await
            .map_err(|message| MapError::ProviderLoad { message })
    }

    fn start_load(&self, api_key: &str) -> SharedLoad {
        tracing::info!("Loading map provider");
        let provider = Arc::clone(&self.provider);
        let api_key = api_key.to_string();
        async move {
            match provider.load_script(&api_key).await {
                Ok(handle) => {
                    tracing::info!("Map provider ready");
                    Ok(handle)
                }
                Err(e) => {
                    tracing::warn!("Map provider failed to load: {}", e);
                    Err(match e {
                        MapError::ProviderLoad { message } => message,
                        other => other.to_string(),
                    })
                }
            }
        }
        .boxed()
        .shared()
    }

    /// The resolved handle, if a load has already succeeded.
    pub fn get(&self) -> Option<Arc<dyn ProviderHandle>> {
        self.current()
            .as_ref()
            .and_then(|acquisition| acquisition.load.peek())
            .and_then(|outcome| outcome.as_ref().ok().cloned())
    }

    pub fn is_pending(&self) -> bool {
        self.current()
            .as_ref()
            .map(|acquisition| acquisition.load.peek().is_none())
            .unwrap_or(false)
    }

    /// Forgets the current acquisition. Callers already awaiting it still
    /// receive its result.
    pub fn reset(&self) {
        if self.current().take().is_some() {
            tracing::debug!("Map provider loader reset");
        }
    }
}
