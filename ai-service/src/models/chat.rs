use serde::{Deserialize, Serialize};
use validator::Validate;

/// One turn of a conversation, forwarded to the model as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Overrides the configured default model for this call.
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub messages: Vec<ChatMessage>,
    pub response: String,
}
