//! Server-sent event framing for relayed generation streams.
//!
//! Each [`RelayEvent`] becomes one SSE event whose payload is a single line of
//! JSON. The body ends after the terminal event; no keep-alive comments are sent.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::{Stream, StreamExt};
use serde_json::json;
use service_core::error::AppError;
use service_core::utils::ValidatedJson;
use std::convert::Infallible;

use crate::models::StreamRequest;
use crate::services::{relay, Relay, RelayEvent};
use crate::startup::AppState;

impl From<RelayEvent> for Event {
    fn from(event: RelayEvent) -> Self {
        match event {
            RelayEvent::Data(text) => Event::default().data(json!({ "chunk": text }).to_string()),
            RelayEvent::Done => Event::default()
                .event("done")
                .data(json!({ "done": true }).to_string()),
            RelayEvent::Error(message) => Event::default()
                .event("error")
                .data(json!({ "error": message }).to_string()),
        }
    }
}

pub fn into_sse(events: Relay) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(events.map(|event| Ok(Event::from(event))))
}

#[tracing::instrument(skip_all)]
pub async fn stream_text(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<StreamRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let prompt = req
        .trimmed_prompt()
        .ok_or_else(|| AppError::BadRequest(anyhow::anyhow!("prompt is required")))?
        .to_string();

    tracing::info!(prompt_len = prompt.len(), "Opening generation stream");

    let provider = state.text_provider.clone();
    let model = req.model;
    Ok(into_sse(relay(async move {
        provider.generate_stream(&prompt, model.as_deref()).await
    })))
}

