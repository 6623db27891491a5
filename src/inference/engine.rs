//! Completion orchestrator: one prompt in, one canonical text out.
//!
//! The engine:
//! 1. Acquires the cached client for the requested model
//! 2. Runs the blocking backend call on tokio's blocking pool
//! 3. Normalizes whatever the backend returned into a single string

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::inference::cache::ClientCache;

/// The inference engine. Cheap to clone; clones share the client cache.
#[derive(Clone)]
pub struct InferenceEngine {
    /// Single-slot client cache.
    cache: Arc<ClientCache>,

    /// Incremented on every failed completion.
    failures: prometheus::IntCounter,
}

impl InferenceEngine {
    /// Create a new inference engine.
    pub fn new(cache: Arc<ClientCache>, failures: prometheus::IntCounter) -> Self {
        Self { cache, failures }
    }

    /// Run `prompt` against `model` and return the canonical reply text.
    ///
    /// The backend call blocks, so acquire and invoke both happen off the
    /// async workers; dropping the returned future does not cancel a call
    /// that has already started.
    pub async fn complete(
        &self,
        request_id: String,
        model: String,
        prompt: String,
    ) -> Result<String, GatewayError> {
        let cache = self.cache.clone();
        let started = Instant::now();

        debug!(
            request_id = %request_id,
            model = %model,
            prompt_len = prompt.len(),
            "Dispatching backend call"
        );

        let result = tokio::task::spawn_blocking(move || {
            let client = cache.acquire(&model)?;
            client.invoke(&prompt)
        })
        .await;

        let reply = match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(e)) => {
                self.failures.inc();
                warn!(request_id = %request_id, error = %e, "Backend call failed");
                return Err(e.into());
            }
            Err(e) => {
                self.failures.inc();
                warn!(request_id = %request_id, error = %e, "Backend worker failed");
                return Err(e.into());
            }
        };

        debug!(request_id = %request_id, shape = reply.shape(), "Backend reply shape");
        let text = reply.normalize();

        info!(
            request_id = %request_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            chars = text.len(),
            "Backend call complete"
        );

        Ok(text)
    }
}
