//! Generation client abstractions and implementations.
//!
//! `TextProvider` is the seam between the HTTP handlers and the hosted model.
//! Streaming calls hand back a `ChunkStream`: an ordered sequence of
//! `IncrementalChunk` results that can be closed early, which releases the
//! upstream connection.

pub mod mock;
pub mod ollama;

use crate::models::ChatMessage;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Error type for provider operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Network error: {0}")]
    NetworkError(String),
}

/// One increment of generated text.
///
/// `is_final` marks end-of-stream; a final chunk may still carry trailing text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IncrementalChunk {
    pub text: Option<String>,
    pub is_final: bool,
}

impl IncrementalChunk {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            is_final: false,
        }
    }

    pub fn finished() -> Self {
        Self {
            text: None,
            is_final: true,
        }
    }
}

/// Cancellable sequence of chunks produced by a provider.
///
/// Dropping the stream or calling [`ChunkStream::close`] stops consumption and
/// fires the producer's cancellation token, if one was attached.
pub struct ChunkStream {
    inner: BoxStream<'static, Result<IncrementalChunk, ProviderError>>,
    cancel: Option<DropGuard>,
}

impl ChunkStream {
    pub fn new<S>(inner: S) -> Self
    where
        S: Stream<Item = Result<IncrementalChunk, ProviderError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            cancel: None,
        }
    }

    /// Attach a token that is cancelled when this stream is closed or dropped.
    pub fn with_cancellation<S>(inner: S, token: CancellationToken) -> Self
    where
        S: Stream<Item = Result<IncrementalChunk, ProviderError>> + Send + 'static,
    {
        Self {
            inner: inner.boxed(),
            cancel: Some(token.drop_guard()),
        }
    }

    /// Release the underlying source. Further polls yield `None`.
    pub fn close(&mut self) {
        self.inner = stream::empty().boxed();
        self.cancel.take();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_none()
    }
}

impl Stream for ChunkStream {
    type Item = Result<IncrementalChunk, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for ChunkStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkStream")
            .field("cancellable", &self.cancel.is_some())
            .finish_non_exhaustive()
    }
}

/// Trait for text generation providers (e.g., Ollama).
///
/// `model` overrides the provider's default model for a single call.
#[async_trait]
pub trait TextProvider: Send + Sync {
    /// Generate a complete response for a prompt.
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError>;

    /// Generate a complete response for a conversation.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<String, ProviderError>;

    /// Stream a response for a prompt.
    async fn generate_stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<ChunkStream, ProviderError>;

    /// Stream a response for a conversation.
    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<ChunkStream, ProviderError>;

    /// Health check.
    async fn health_check(&self) -> Result<(), ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn close_cancels_token_and_ends_stream() {
        let token = CancellationToken::new();
        let mut chunks = ChunkStream::with_cancellation(
            stream::iter(vec![Ok(IncrementalChunk::text("a"))]),
            token.clone(),
        );

        chunks.close();

        assert!(token.is_cancelled());
        assert!(chunks.is_closed());
        assert_eq!(chunks.next().await, None);
    }

    #[tokio::test]
    async fn drop_cancels_token() {
        let token = CancellationToken::new();
        let chunks = ChunkStream::with_cancellation(stream::pending(), token.clone());

        drop(chunks);

        assert!(token.is_cancelled());
    }
}
