//! Turns a provider's chunk stream into client-facing relay events.
//!
//! A relay emits zero or more `Data` events followed by exactly one terminal
//! event (`Done` or `Error`), then ends. Once a terminal event has been
//! produced the upstream chunk stream is closed. Dropping the relay early
//! drops the chunk stream too, which cancels the upstream request.

use super::providers::{ChunkStream, ProviderError};
use futures::future::BoxFuture;
use futures::stream::{FusedStream, Stream, StreamExt};
use futures::FutureExt;
use metrics::counter;
use std::future::Future;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

/// One event delivered to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    /// A non-empty piece of generated text.
    Data(String),
    /// Normal end of the response.
    Done,
    /// The provider failed; carries its error message.
    Error(String),
}

impl RelayEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayEvent::Data(_))
    }
}

enum State {
    Opening(BoxFuture<'static, Result<ChunkStream, ProviderError>>),
    Streaming(ChunkStream),
    Finished,
}

/// Stream of [`RelayEvent`]s over a not-yet-opened provider stream.
pub struct Relay {
    state: State,
    pending: Option<RelayEvent>,
    data_events: usize,
}

/// Relay the stream produced by `open`.
///
/// `open` runs on first poll. If it fails, the relay yields a single `Error`.
pub fn relay<F>(open: F) -> Relay
where
    F: Future<Output = Result<ChunkStream, ProviderError>> + Send + 'static,
{
    Relay {
        state: State::Opening(open.boxed()),
        pending: None,
        data_events: 0,
    }
}

impl Relay {
    fn finish(&mut self, outcome: &'static str) {
        if let State::Streaming(chunks) = &mut self.state {
            chunks.close();
        }
        self.state = State::Finished;

        tracing::info!(outcome, data_events = self.data_events, "Relay finished");
        counter!("ai_stream_terminations_total", "outcome" => outcome).increment(1);
    }

    fn fail(&mut self, err: ProviderError) -> RelayEvent {
        tracing::warn!(error = %err, "Provider stream failed");
        self.finish("error");
        RelayEvent::Error(err.to_string())
    }
}

impl Stream for Relay {
    type Item = RelayEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RelayEvent>> {
        let this = self.get_mut();

        if let Some(event) = this.pending.take() {
            return Poll::Ready(Some(event));
        }

        loop {
            match &mut this.state {
                State::Opening(open) => match ready!(open.as_mut().poll(cx)) {
                    Ok(chunks) => {
                        tracing::debug!("Provider stream opened");
                        this.state = State::Streaming(chunks);
                    }
                    Err(err) => return Poll::Ready(Some(this.fail(err))),
                },
                State::Streaming(chunks) => {
                    let event = match ready!(chunks.poll_next_unpin(cx)) {
                        Some(Ok(chunk)) => {
                            let text = chunk.text.filter(|t| !t.is_empty());
                            match (text, chunk.is_final) {
                                (Some(text), false) => {
                                    this.data_events += 1;
                                    RelayEvent::Data(text)
                                }
                                (None, false) => continue,
                                (Some(text), true) => {
                                    this.data_events += 1;
                                    this.finish("done");
                                    this.pending = Some(RelayEvent::Done);
                                    RelayEvent::Data(text)
                                }
                                (None, true) => {
                                    this.finish("done");
                                    RelayEvent::Done
                                }
                            }
                        }
                        Some(Err(err)) => this.fail(err),
                        // Source ended without a final marker.
                        None => {
                            this.finish("done");
                            RelayEvent::Done
                        }
                    };
                    return Poll::Ready(Some(event));
                }
                State::Finished => return Poll::Ready(None),
            }
        }
    }
}

impl FusedStream for Relay {
    fn is_terminated(&self) -> bool {
        matches!(self.state, State::Finished) && self.pending.is_none()
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        if !matches!(self.state, State::Finished) {
            tracing::info!(
                data_events = self.data_events,
                "Client disconnected; cancelling provider stream"
            );
            counter!("ai_stream_terminations_total", "outcome" => "cancelled").increment(1);
        }
    }
}
