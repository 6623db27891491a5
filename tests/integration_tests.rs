//! Integration tests for the full request pipeline.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use ollama_gateway::config::Config;
use ollama_gateway::inference::client::{BackendError, ClientFactory, ModelClient};
use ollama_gateway::inference::reply::BackendReply;
use ollama_gateway::server::openai_api::{build_router, AppState};

/// Echoes the prompt back, replies with raw JSON for `json:` prompts and
/// fails on `explode`. Every prompt is recorded.
struct ScriptedClient {
    model: String,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ModelClient for ScriptedClient {
    fn model(&self) -> &str {
        &self.model
    }

    fn invoke(&self, prompt: &str) -> Result<BackendReply, BackendError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if prompt == "explode" {
            return Err(BackendError::Backend("backend exploded".into()));
        }
        if let Some(raw) = prompt.strip_prefix("json:") {
            let value: Value = serde_json::from_str(raw).unwrap();
            return Ok(BackendReply::from_value(value));
        }
        Ok(BackendReply::Text(prompt.to_string()))
    }
}

#[derive(Default)]
struct ScriptedFactory {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl ClientFactory for ScriptedFactory {
    fn build(&self, model: &str) -> Result<Arc<dyn ModelClient>, BackendError> {
        Ok(Arc::new(ScriptedClient {
            model: model.to_string(),
            prompts: self.prompts.clone(),
        }))
    }
}

fn test_app() -> (Router, Arc<Mutex<Vec<String>>>) {
    let mut config = Config::default();
    config.streaming.chunk_delay_ms = 0;

    let factory = Arc::new(ScriptedFactory::default());
    let prompts = factory.prompts.clone();
    let state = Arc::new(AppState::new(Arc::new(config), factory).unwrap());
    (build_router(state), prompts)
}

fn chat_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/v1/chat/completions")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Split an event-stream body into the payloads of its `data:` frames.
fn frames(body: &str) -> Vec<&str> {
    assert!(body.ends_with("\n\n"), "body must end on a frame boundary");
    body.split_terminator("\n\n")
        .map(|f| f.strip_prefix("data: ").expect("every frame is a data frame"))
        .collect()
}

#[tokio::test]
async fn test_non_streaming_envelope() {
    let (app, prompts) = test_app();

    let response = app
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "stream": false
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "phi4:latest");
    assert!(body["id"].as_str().unwrap().starts_with("chatcmpl-"));
    assert_eq!(body["choices"].as_array().unwrap().len(), 1);
    assert_eq!(body["choices"][0]["index"], 0);
    assert_eq!(body["choices"][0]["message"]["role"], "assistant");
    assert_eq!(body["choices"][0]["message"]["content"], "Hello");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");

    assert_eq!(*prompts.lock().unwrap(), vec!["Hello".to_string()]);
}

#[tokio::test]
async fn test_non_streaming_normalizes_odd_shapes() {
    let cases = [
        (r#"json:{"content": "hi there"}"#, "hi there"),
        ("json:[]", "[]"),
        (r#"json:["first", "second"]"#, "first"),
        ("json:null", "null"),
        ("json:12", "12"),
    ];

    for (prompt, expected) in cases {
        let (app, _) = test_app();
        let response = app
            .oneshot(chat_request(json!({
                "messages": [{"role": "user", "content": prompt}],
                "stream": false
            })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "prompt {prompt}");

        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["choices"][0]["message"]["content"], expected, "prompt {prompt}");
    }
}

#[tokio::test]
async fn test_non_streaming_backend_failure_is_500() {
    let (app, _) = test_app();

    let response = app
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "explode"}],
            "stream": false
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(body["detail"], "Backend error: backend exploded");
}

#[tokio::test]
async fn test_streaming_frames_and_round_trip() {
    let (app, _) = test_app();
    let text: String = (0..23).map(|i| format!("word{i}")).collect::<Vec<_>>().join(" ");

    // `stream` defaults to true.
    let response = app
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": text}]
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "text/event-stream");
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-cache");
    assert_eq!(response.headers()[header::CONNECTION], "keep-alive");

    let body = body_text(response).await;
    assert!(body.ends_with("data: [DONE]\n\n"));

    let frames = frames(&body);
    // 3 content chunks, stop chunk, sentinel.
    assert_eq!(frames.len(), 5);
    assert_eq!(frames[4], "[DONE]");

    let chunks: Vec<Value> = frames[..4]
        .iter()
        .map(|f| serde_json::from_str(f).unwrap())
        .collect();

    let id = chunks[0]["id"].clone();
    for chunk in &chunks {
        assert_eq!(chunk["id"], id);
        assert_eq!(chunk["object"], "chat.completion.chunk");
        assert_eq!(chunk["model"], "phi4:latest");
    }

    let rebuilt: String = chunks[..3]
        .iter()
        .map(|c| c["choices"][0]["delta"]["content"].as_str().unwrap())
        .collect();
    assert_eq!(rebuilt, text);
    assert!(chunks[..3].iter().all(|c| c["choices"][0]["finish_reason"].is_null()));

    assert_eq!(chunks[3]["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunks[3]["choices"][0]["delta"], json!({}));
}

#[tokio::test]
async fn test_streaming_failure_is_in_band() {
    let (app, _) = test_app();

    let response = app
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "explode"}],
            "stream": true
        })))
        .await
        .unwrap();
    // Headers are committed before the backend runs.
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    let frames = frames(&body);
    assert_eq!(frames.len(), 1);

    let error: Value = serde_json::from_str(frames[0]).unwrap();
    assert_eq!(error["error"]["type"], "server_error");
    assert_eq!(error["error"]["message"], "Backend error: backend exploded");
    assert!(!body.contains("[DONE]"));
}

#[tokio::test]
async fn test_streaming_empty_prompt_terminates_normally() {
    let (app, prompts) = test_app();

    let response = app
        .oneshot(chat_request(json!({"messages": []})))
        .await
        .unwrap();
    let body = body_text(response).await;
    let frames = frames(&body);

    assert_eq!(frames.len(), 2);
    let stop: Value = serde_json::from_str(frames[0]).unwrap();
    assert_eq!(stop["choices"][0]["finish_reason"], "stop");
    assert_eq!(frames[1], "[DONE]");
    assert_eq!(*prompts.lock().unwrap(), vec![String::new()]);
}

#[tokio::test]
async fn test_system_prompt_is_folded_into_prompt() {
    let (app, prompts) = test_app();

    let response = app
        .oneshot(chat_request(json!({
            "messages": [
                {"role": "user", "content": "earlier"},
                {"role": "assistant", "content": "reply"},
                {"role": "user", "content": "Hello"}
            ],
            "system": "You are terse.",
            "stream": false,
            "max_tokens": 64,
            "temperature": 0.2
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        *prompts.lock().unwrap(),
        vec!["You are terse.\n\nUser: Hello\n\nAssistant:".to_string()]
    );
}

#[tokio::test]
async fn test_unknown_roles_in_history_are_accepted() {
    let (app, prompts) = test_app();

    let response = app
        .oneshot(chat_request(json!({
            "messages": [
                {"role": "developer", "content": "Answer in French."},
                {"role": "user", "content": "Hello"},
                {"role": "tool", "content": "{\"temp\": 21}"}
            ],
            "stream": false
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(*prompts.lock().unwrap(), vec!["Hello".to_string()]);
}

#[tokio::test]
async fn test_empty_model_rejected() {
    let (app, prompts) = test_app();

    let response = app
        .oneshot(chat_request(json!({
            "messages": [{"role": "user", "content": "Hello"}],
            "model": "",
            "stream": false
        })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_model_switch_rebuilds_client() {
    let (app, _) = test_app();

    for model in ["phi4:latest", "phi4:latest", "gemma3:latest"] {
        let response = app
            .clone()
            .oneshot(chat_request(json!({
                "messages": [{"role": "user", "content": "Hi"}],
                "model": model,
                "stream": false
            })))
            .await
            .unwrap();
        let body: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(body["model"], model);
    }

    let metrics = body_text(app.oneshot(get("/metrics")).await.unwrap()).await;
    assert!(metrics.contains("gateway_client_builds_total 2"));
    assert!(metrics.contains(r#"gateway_requests_total{mode="complete"} 3"#));
}

#[tokio::test]
async fn test_models_and_health() {
    let (app, _) = test_app();

    let response = app.clone().oneshot(get("/v1/models")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let models: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(models["object"], "list");
    let data = models["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(data[0]["id"], "phi4:latest");
    assert_eq!(data[0]["object"], "model");
    assert_eq!(data[0]["owned_by"], "ollama");

    let response = app.oneshot(get("/health")).await.unwrap();
    let health: Value = serde_json::from_str(&body_text(response).await).unwrap();
    assert_eq!(health, json!({"status": "healthy", "model": "phi4:latest"}));
}
