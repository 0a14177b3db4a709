use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub prompt: String,
    pub response: String,
}

/// Body of `POST /ai/stream`. The prompt is trimmed and must not be empty.
#[derive(Debug, Deserialize, Validate)]
pub struct StreamRequest {
    pub prompt: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl StreamRequest {
    /// The prompt with surrounding whitespace removed, or `None` if nothing is left.
    pub fn trimmed_prompt(&self) -> Option<&str> {
        let prompt = self.prompt.trim();
        (!prompt.is_empty()).then_some(prompt)
    }
}
