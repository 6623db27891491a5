//! Backend reply decoding and normalization.
//!
//! The backend's return shape has varied across versions, so every reply is
//! decoded into a [`BackendReply`] at the client boundary and collapsed into a
//! single canonical string by [`BackendReply::normalize`]. Everything past this
//! module only ever sees a `String`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A typed message carrying a `content` field, e.g. Ollama's `/api/chat` `message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub content: String,
}

/// A raw reply from the model backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendReply {
    /// Plain text.
    Text(String),
    /// A structured value exposing a `content` field.
    Message(ReplyMessage),
    /// An untyped mapping, which may or may not carry a `content` key.
    Mapping(Map<String, Value>),
    /// An ordered sequence; only the first element is used.
    Sequence(Vec<Value>),
    /// Anything else (null, numbers, booleans).
    Other(Value),
}

impl BackendReply {
    /// Decode an arbitrary JSON value by its shape.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::String(s) => BackendReply::Text(s),
            Value::Object(map) => BackendReply::Mapping(map),
            Value::Array(items) => BackendReply::Sequence(items),
            other => BackendReply::Other(other),
        }
    }

    /// Short tag naming the decoded shape, for logging.
    pub fn shape(&self) -> &'static str {
        match self {
            BackendReply::Text(_) => "text",
            BackendReply::Message(_) => "message",
            BackendReply::Mapping(_) => "mapping",
            BackendReply::Sequence(_) => "sequence",
            BackendReply::Other(_) => "other",
        }
    }

    /// Collapse the reply into its canonical text. Total over every shape.
    pub fn normalize(self) -> String {
        match self {
            BackendReply::Text(text) => text,
            BackendReply::Message(message) => message.content,
            BackendReply::Mapping(mut map) => match map.remove("content") {
                Some(content) => render(&content),
                None => render(&Value::Object(map)),
            },
            // The emptiness guard matters: `[]` renders as a whole below.
            BackendReply::Sequence(items) if !items.is_empty() => render(&items[0]),
            BackendReply::Sequence(items) => render(&Value::Array(items)),
            BackendReply::Other(value) => render(&value),
        }
    }
}

/// Textual form of a JSON value: strings verbatim, everything else as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_text_passes_through() {
        assert_eq!(BackendReply::Text("hello world".into()).normalize(), "hello world");
    }

    #[test]
    fn test_message_content_field() {
        let reply = BackendReply::Message(ReplyMessage {
            role: Some("assistant".to_string()),
            content: "from the field".to_string(),
        });
        assert_eq!(reply.normalize(), "from the field");
    }

    #[test]
    fn test_mapping_with_content_key() {
        let reply = BackendReply::from_value(json!({"content": "hi there"}));
        assert_eq!(reply.shape(), "mapping");
        assert_eq!(reply.normalize(), "hi there");
    }

    #[test]
    fn test_mapping_with_non_string_content_is_literal() {
        let reply = BackendReply::from_value(json!({"content": 42, "role": "assistant"}));
        assert_eq!(reply.normalize(), "42");
    }

    #[test]
    fn test_mapping_without_content_renders_whole() {
        let reply = BackendReply::from_value(json!({"text": "nope"}));
        assert_eq!(reply.normalize(), r#"{"text":"nope"}"#);
    }

    #[test]
    fn test_sequence_uses_first_element() {
        let reply = BackendReply::from_value(json!(["first", "second"]));
        assert_eq!(reply.normalize(), "first");

        let reply = BackendReply::from_value(json!([{"a": 1}, "second"]));
        assert_eq!(reply.normalize(), r#"{"a":1}"#);
    }

    #[test]
    fn test_empty_sequence_falls_through() {
        let reply = BackendReply::from_value(json!([]));
        assert_eq!(reply.shape(), "sequence");
        assert_eq!(reply.normalize(), "[]");
    }

    #[test]
    fn test_scalars_render_as_text() {
        assert_eq!(BackendReply::from_value(Value::Null).normalize(), "null");
        assert_eq!(BackendReply::from_value(json!(3.5)).normalize(), "3.5");
        assert_eq!(BackendReply::from_value(json!(true)).normalize(), "true");
        assert_eq!(BackendReply::from_value(json!(7)).shape(), "other");
    }
}
