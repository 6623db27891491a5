//! Backend model clients.
//!
//! A [`ModelClient`] is bound to one model and turns a prompt into a
//! [`BackendReply`] with a single blocking call. A [`ClientFactory`] builds
//! clients by model name so the [`ClientCache`](super::cache::ClientCache)
//! can swap them when a request names a different model.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::BackendConfig;
use crate::inference::reply::{BackendReply, ReplyMessage};

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Failed to build client for model {model}: {reason}")]
    Build { model: String, reason: String },

    #[error("Backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// A handle bound to a single model.
pub trait ModelClient: Send + Sync {
    /// Model this handle was built for.
    fn model(&self) -> &str;

    /// Run the prompt to completion. Blocks the calling thread.
    fn invoke(&self, prompt: &str) -> Result<BackendReply, BackendError>;
}

/// Builds model clients on demand.
pub trait ClientFactory: Send + Sync {
    fn build(&self, model: &str) -> Result<Arc<dyn ModelClient>, BackendError>;
}

// ─── Ollama ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: [OllamaMessage<'a>; 1],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// The part of an `/api/chat` response the gateway cares about.
#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ReplyMessage,
}

/// Blocking client for Ollama's `/api/chat` endpoint.
pub struct OllamaClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OllamaClient {
    pub fn new(
        base_url: &str,
        model: &str,
        timeout: Option<Duration>,
    ) -> Result<Self, BackendError> {
        // `timeout(None)` disables reqwest's default 30s bound.
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Build {
                model: model.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint: format!("{}/api/chat", base_url.trim_end_matches('/')),
            model: model.to_string(),
        })
    }
}

impl ModelClient for OllamaClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn invoke(&self, prompt: &str) -> Result<BackendReply, BackendError> {
        let body = OllamaChatRequest {
            model: &self.model,
            messages: [OllamaMessage {
                role: "user",
                content: prompt,
            }],
            stream: false,
        };

        let response = self.http.post(&self.endpoint).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(status_error(status.as_u16(), body));
        }

        let value: Value = response.json()?;
        debug!(model = %self.model, "Ollama reply received");
        decode_chat_reply(value)
    }
}

/// Map a non-2xx answer to an error, using Ollama's `{"error": ...}` text when present.
fn status_error(status: u16, body: String) -> BackendError {
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(String::from));
    match message {
        Some(message) => BackendError::Backend(message),
        None => BackendError::Status { status, body },
    }
}

/// Decode an `/api/chat` body, preferring the typed `message` when present.
fn decode_chat_reply(value: Value) -> Result<BackendReply, BackendError> {
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        return Err(BackendError::Backend(error.to_string()));
    }
    let reply = match serde_json::from_value::<OllamaChatResponse>(value.clone()) {
        Ok(parsed) => BackendReply::Message(parsed.message),
        Err(_) => BackendReply::from_value(value),
    };
    Ok(reply)
}

/// Builds [`OllamaClient`]s against the configured backend.
pub struct OllamaFactory {
    config: BackendConfig,
}

impl OllamaFactory {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }
}

impl ClientFactory for OllamaFactory {
    fn build(&self, model: &str) -> Result<Arc<dyn ModelClient>, BackendError> {
        let client = OllamaClient::new(&self.config.base_url, model, self.config.timeout())?;
        Ok(Arc::new(client))
    }
}
