use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Json,
};
use futures::Stream;
use service_core::error::AppError;
use service_core::utils::ValidatedJson;
use std::convert::Infallible;

use super::stream::into_sse;
use crate::models::{ChatRequest, ChatResponse};
use crate::services::relay;
use crate::startup::AppState;

fn require_messages(req: &ChatRequest) -> Result<(), AppError> {
    if req.messages.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("messages required")));
    }
    Ok(())
}

#[tracing::instrument(skip_all)]
pub async fn chat(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    require_messages(&req)?;

    let response = state
        .text_provider
        .chat(&req.messages, req.model.as_deref())
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Chat failed");
            AppError::from(e)
        })?;

    tracing::info!(message_count = req.messages.len(), "Chat completed");

    Ok(Json(ChatResponse {
        messages: req.messages,
        response,
    }))
}

#[tracing::instrument(skip_all)]
pub async fn chat_stream(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    require_messages(&req)?;

    tracing::info!(message_count = req.messages.len(), "Opening chat stream");

    let provider = state.text_provider.clone();
    let ChatRequest { messages, model } = req;
    Ok(into_sse(relay(async move {
        provider.chat_stream(&messages, model.as_deref()).await
    })))
}
