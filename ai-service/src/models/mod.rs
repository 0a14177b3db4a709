//! Request and response bodies for the AI endpoints.

pub mod chat;
pub mod generate;

pub use chat::{ChatMessage, ChatRequest, ChatResponse};
pub use generate::{GenerateRequest, GenerateResponse, StreamRequest};
