//! OpenAI-compatible HTTP API.
//!
//! Implements the subset of the OpenAI API a chat UI needs:
//! - POST /v1/chat/completions
//! - GET /v1/models
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::State;
use axum::http::header;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::config::{Config, ModelEntry};
use crate::error::GatewayError;
use crate::inference::cache::ClientCache;
use crate::inference::client::ClientFactory;
use crate::inference::engine::InferenceEngine;
use crate::inference::prompt::{build_prompt, ChatMessage, Role};
use crate::metrics::GatewayMetrics;
use crate::server::streaming::ChunkStreamer;

/// Application state shared across handlers.
pub struct AppState {
    pub engine: InferenceEngine,
    pub streamer: ChunkStreamer,
    pub config: Arc<Config>,
    pub metrics: GatewayMetrics,
}

impl AppState {
    /// Wire the engine, streamer and metrics around a client factory.
    pub fn new(config: Arc<Config>, factory: Arc<dyn ClientFactory>) -> prometheus::Result<Self> {
        let metrics = GatewayMetrics::new()?;
        let cache = Arc::new(ClientCache::new(factory, metrics.client_builds.clone()));
        let engine = InferenceEngine::new(cache, metrics.backend_failures.clone());
        let streamer = ChunkStreamer::new(&config.streaming, metrics.stream_chunks.clone());

        Ok(Self {
            engine,
            streamer,
            config,
            metrics,
        })
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = state.config.server.cors;

    let router = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/models", get(list_models))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state);

    let router = if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    };
    router.layer(TraceLayer::new_for_http())
}

// ─── Request/Response Types ────────────────────────────────────────────────

/// Chat completion request (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub messages: Vec<ChatMessage>,
    /// Prepended to the last user message when present.
    #[serde(default)]
    pub system: Option<String>,
    /// Falls back to `backend.default_model`.
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    /// Accepted for compatibility; not forwarded to the backend.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Accepted for compatibility; not forwarded to the backend.
    #[serde(default)]
    pub temperature: Option<f64>,
}

fn default_stream() -> bool {
    true
}

/// Framing shared by every payload of one response.
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub id: String,
    pub created: u64,
    pub model: String,
}

impl ResponseMeta {
    pub fn new(model: &str) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::new_v4()),
            created: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default(),
            model: model.to_string(),
        }
    }
}

/// Chat completion response (non-streaming).
#[derive(Debug, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Serialize)]
pub struct ChatChoice {
    pub index: usize,
    pub message: ChatMessage,
    pub finish_reason: String,
}

impl ChatCompletionResponse {
    fn new(meta: ResponseMeta, content: String) -> Self {
        Self {
            id: meta.id,
            object: "chat.completion".to_string(),
            created: meta.created,
            model: meta.model,
            choices: vec![ChatChoice {
                index: 0,
                message: ChatMessage::new(Role::Assistant, content),
                finish_reason: "stop".to_string(),
            }],
        }
    }
}

/// Model listing response.
#[derive(Debug, Serialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub owned_by: String,
}

impl From<&ModelEntry> for ModelInfo {
    fn from(entry: &ModelEntry) -> Self {
        Self {
            id: entry.id.clone(),
            object: "model".to_string(),
            created: entry.created,
            owned_by: entry.owned_by.clone(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

async fn chat_completions(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatCompletionRequest>,
) -> Result<Response, GatewayError> {
    let model = req
        .model
        .unwrap_or_else(|| state.config.backend.default_model.clone());
    if model.is_empty() {
        return Err(GatewayError::BadRequest("model must not be empty".to_string()));
    }

    let meta = ResponseMeta::new(&model);
    info!(
        request_id = %meta.id,
        model = %model,
        messages = req.messages.len(),
        stream = req.stream,
        "Chat completion request"
    );

    let prompt = build_prompt(&req.messages, req.system.as_deref());

    if req.stream {
        state.metrics.requests.with_label_values(&["stream"]).inc();

        let engine = state.engine.clone();
        let request_id = meta.id.clone();
        let text = async move { engine.complete(request_id, model, prompt).await };
        let events = state.streamer.stream(meta, text);

        // No keep-alive comments: every frame is a data frame.
        Ok(([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response())
    } else {
        state.metrics.requests.with_label_values(&["complete"]).inc();

        let text = state
            .engine
            .complete(meta.id.clone(), model, prompt)
            .await?;
        Ok(Json(ChatCompletionResponse::new(meta, text)).into_response())
    }
}

async fn list_models(State(state): State<Arc<AppState>>) -> Json<ModelList> {
    Json(ModelList {
        object: "list".to_string(),
        data: state.config.models.iter().map(ModelInfo::from).collect(),
    })
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        model: state.config.backend.default_model.clone(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Result<String, GatewayError> {
    Ok(state.metrics.render()?)
}
