//! Single-slot model client cache.
//!
//! Holds at most one live [`ModelClient`] and the model it was built for.
//! A request naming a different model replaces the slot; the previous handle
//! is dropped once the last in-flight caller releases it.

use std::sync::{Arc, Mutex};

use tracing::info;

use crate::inference::client::{BackendError, ClientFactory, ModelClient};

struct CachedClient {
    model: String,
    client: Arc<dyn ModelClient>,
}

/// Get-or-create cache keyed by model name.
///
/// The lock is held across construction so two callers racing on different
/// models never both build. Callers are expected to run on blocking worker
/// threads, since building a client may block.
pub struct ClientCache {
    factory: Arc<dyn ClientFactory>,
    slot: Mutex<Option<CachedClient>>,
    builds: prometheus::IntCounter,
}

impl ClientCache {
    pub fn new(factory: Arc<dyn ClientFactory>, builds: prometheus::IntCounter) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
            builds,
        }
    }

    /// Return the client for `model`, building it if the slot is empty or stale.
    pub fn acquire(&self, model: &str) -> Result<Arc<dyn ModelClient>, BackendError> {
        // A poisoned lock only means a builder panicked; the slot is still usable.
        let mut slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(cached) = slot.as_ref() {
            if cached.model == model {
                return Ok(cached.client.clone());
            }
        }

        let previous = slot.as_ref().map(|c| c.model.clone());
        let client = self.factory.build(model)?;
        self.builds.inc();
        info!(model = client.model(), previous = ?previous, "Backend client built");

        *slot = Some(CachedClient {
            model: model.to_string(),
            client: client.clone(),
        });
        Ok(client)
    }

    /// Model the cached client is bound to, if any.
    #[cfg(test)]
    pub fn current_model(&self) -> Option<String> {
        let slot = self.slot.lock().unwrap_or_else(|e| e.into_inner());
        slot.as_ref().map(|c| c.model.clone())
    }
}
