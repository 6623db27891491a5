//! Prompt assembly.
//!
//! Only the last user turn is forwarded; earlier history is dropped. An
//! optional system prompt is folded in front of it in a plain-text
//! `User:`/`Assistant:` frame because the backend call takes a single string.

use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    /// Any other role (`tool`, `developer`, ...). Accepted and never forwarded.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Build the single prompt string sent to the backend.
pub fn build_prompt(messages: &[ChatMessage], system: Option<&str>) -> String {
    let user = messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("");

    match system.filter(|s| !s.is_empty()) {
        Some(system) if !user.is_empty() => {
            format!("{system}\n\nUser: {user}\n\nAssistant:")
        }
        Some(system) => system.to_string(),
        None => user.to_string(),
    }
}
