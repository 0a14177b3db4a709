//! Ollama provider implementation.
//!
//! Talks to the Ollama REST API (`/api/generate`, `/api/chat`, `/api/tags`).
//! Streaming responses arrive as newline-delimited JSON; each line is decoded
//! into an `IncrementalChunk` by a reader task feeding a bounded channel.

use super::{ChunkStream, IncrementalChunk, ProviderError, TextProvider};
use crate::config::OllamaConfig;
use crate::models::ChatMessage;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const CHANNEL_CAPACITY: usize = 32;

/// Ollama text provider.
pub struct OllamaTextProvider {
    config: OllamaConfig,
    client: Client,
}

impl OllamaTextProvider {
    pub fn new(config: OllamaConfig) -> Result<Self, ProviderError> {
        // Streams can run for minutes, so only connection setup is bounded.
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.config.host.trim_end_matches('/'), path)
    }

    /// The per-call override if it is non-blank, otherwise the configured default.
    fn model<'a>(&'a self, model: Option<&'a str>) -> &'a str {
        model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| self.config.model.trim())
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.bearer_auth(self.config.api_key.expose_secret())
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Response, ProviderError> {
        let response = self
            .authorized(self.client.post(self.api_url(path)))
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        check_status(response).await
    }

    /// Open a streaming call and hand its body to a reader task.
    async fn open_stream<B, L>(&self, path: &str, body: &B) -> Result<ChunkStream, ProviderError>
    where
        B: Serialize,
        L: StreamLine,
    {
        let response = self.post(path, body).await?;

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let token = CancellationToken::new();
        let reader_token = token.clone();

        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = NdjsonDecoder::default();

            loop {
                let next = tokio::select! {
                    _ = reader_token.cancelled() => {
                        tracing::debug!("Ollama stream cancelled by consumer");
                        return;
                    }
                    _ = tx.closed() => return,
                    next = bytes.next() => next,
                };

                let exhausted = next.is_none();
                let lines = match next {
                    Some(Ok(data)) => decoder.push(&data),
                    Some(Err(e)) => {
                        let _ = tx.send(Err(ProviderError::NetworkError(e.to_string()))).await;
                        return;
                    }
                    None => decoder.finish(),
                };

                for line in lines {
                    let chunk = parse_line::<L>(&line);
                    let stop = !matches!(chunk, Ok(IncrementalChunk { is_final: false, .. }));
                    if tx.send(chunk).await.is_err() || stop {
                        return;
                    }
                }

                if exhausted {
                    return;
                }
            }
        });

        Ok(ChunkStream::with_cancellation(
            ReceiverStream::new(rx),
            token,
        ))
    }
}

#[async_trait]
impl TextProvider for OllamaTextProvider {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError> {
        let model = self.model(model);
        tracing::debug!(model, prompt_len = prompt.len(), "Sending generate request to Ollama");

        let body = GenerateBody {
            model,
            prompt,
            stream: false,
        };
        let reply: GenerateLine = parse_json(self.post("generate", &body).await?).await?;
        reply.into_result().map(|r| r.response.unwrap_or_default().trim().to_string())
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<String, ProviderError> {
        let model = self.model(model);
        tracing::debug!(model, message_count = messages.len(), "Sending chat request to Ollama");

        let body = ChatBody {
            model,
            messages,
            stream: false,
        };
        let reply: ChatLine = parse_json(self.post("chat", &body).await?).await?;
        reply.into_result().map(|r| r.text().unwrap_or_default().trim().to_string())
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<ChunkStream, ProviderError> {
        let model = self.model(model);
        tracing::debug!(model, prompt_len = prompt.len(), "Starting streaming generate on Ollama");

        let body = GenerateBody {
            model,
            prompt,
            stream: true,
        };
        self.open_stream::<_, GenerateLine>("generate", &body).await
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<ChunkStream, ProviderError> {
        let model = self.model(model);
        tracing::debug!(model, message_count = messages.len(), "Starting streaming chat on Ollama");

        let body = ChatBody {
            model,
            messages,
            stream: true,
        };
        self.open_stream::<_, ChatLine>("chat", &body).await
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        let response = self
            .authorized(self.client.get(self.api_url("tags")))
            .send()
            .await
            .map_err(|e| ProviderError::NetworkError(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(ProviderError::ApiError(format!(
                "Health check failed: {}",
                response.status()
            )))
        }
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(ProviderError::RateLimited);
    }

    let error_text = response.text().await.unwrap_or_default();
    Err(ProviderError::ApiError(format!(
        "Ollama API error {}: {}",
        status, error_text
    )))
}

async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

fn parse_line<L: StreamLine>(line: &str) -> Result<IncrementalChunk, ProviderError> {
    let parsed: L = serde_json::from_str(line)
        .map_err(|e| ProviderError::InvalidResponse(format!("Malformed stream line: {}", e)))?;
    parsed.into_chunk()
}

/// Splits a byte stream into complete lines.
///
/// Lines may straddle network reads, and multi-byte characters may be split
/// between them, so bytes are buffered until a `\n` arrives.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buffer: Vec<u8>,
}

impl NdjsonDecoder {
    /// Feed bytes and return every line completed by them. Blank lines are skipped.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(data);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            push_line(&mut lines, &line);
        }
        lines
    }

    /// Flush a trailing line that had no terminating newline.
    pub fn finish(&mut self) -> Vec<String> {
        let rest = std::mem::take(&mut self.buffer);
        let mut lines = Vec::new();
        push_line(&mut lines, &rest);
        lines
    }
}

fn push_line(lines: &mut Vec<String>, raw: &[u8]) {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if !line.is_empty() {
        lines.push(line.to_string());
    }
}

/// One decoded line of a streaming response.
trait StreamLine: DeserializeOwned + Send + 'static {
    fn error(&self) -> Option<&str>;
    fn text(&self) -> Option<String>;
    fn done(&self) -> bool;

    fn into_result(self) -> Result<Self, ProviderError>
    where
        Self: Sized,
    {
        match self.error() {
            Some(message) => Err(ProviderError::ApiError(message.to_string())),
            None => Ok(self),
        }
    }

    fn into_chunk(self) -> Result<IncrementalChunk, ProviderError>
    where
        Self: Sized,
    {
        let line = self.into_result()?;
        Ok(IncrementalChunk {
            text: line.text().filter(|t| !t.is_empty()),
            is_final: line.done(),
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateLine {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl StreamLine for GenerateLine {
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn text(&self) -> Option<String> {
        self.response.clone()
    }

    fn done(&self) -> bool {
        self.done
    }
}

#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: Option<String>,
}

impl StreamLine for ChatLine {
    fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    fn text(&self) -> Option<String> {
        self.message
            .as_ref()
            .and_then(|m| m.content.clone())
            .filter(|c| !c.is_empty())
            .or_else(|| self.response.clone())
    }

    fn done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_splits_lines_across_reads() {
        let mut decoder = NdjsonDecoder::default();

        assert!(decoder.push(b"{\"response\":\"He").is_empty());
        assert_eq!(
            decoder.push(b"l\"}\n{\"response\":\"lo\"}\n"),
            vec!["{\"response\":\"Hel\"}", "{\"response\":\"lo\"}"]
        );
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn decoder_skips_blank_lines_and_flushes_tail() {
        let mut decoder = NdjsonDecoder::default();

        assert_eq!(decoder.push(b"\n\r\n{\"done\":false}\n"), vec!["{\"done\":false}"]);
        assert!(decoder.push(b"{\"done\":true}").is_empty());
        assert_eq!(decoder.finish(), vec!["{\"done\":true}"]);
    }

    #[test]
    fn decoder_keeps_split_utf8_intact() {
        let mut decoder = NdjsonDecoder::default();
        let line = "{\"response\":\"héllo\"}\n".as_bytes();
        let (head, tail) = line.split_at(15);

        assert!(decoder.push(head).is_empty());
        assert_eq!(decoder.push(tail), vec!["{\"response\":\"héllo\"}"]);
    }

    #[test]
    fn generate_line_maps_to_chunk() {
        let chunk = parse_line::<GenerateLine>(r#"{"response":"Hi","done":false}"#);
        assert_eq!(chunk, Ok(IncrementalChunk::text("Hi")));

        let last = parse_line::<GenerateLine>(r#"{"response":"","done":true}"#);
        assert_eq!(last, Ok(IncrementalChunk::finished()));
    }

    #[test]
    fn chat_line_prefers_message_content() {
        let chunk =
            parse_line::<ChatLine>(r#"{"message":{"role":"assistant","content":"yo"},"done":false}"#);
        assert_eq!(chunk, Ok(IncrementalChunk::text("yo")));

        let fallback = parse_line::<ChatLine>(r#"{"response":"alt","done":true}"#);
        assert_eq!(
            fallback,
            Ok(IncrementalChunk {
                text: Some("alt".into()),
                is_final: true
            })
        );
    }

    #[test]
    fn error_line_is_a_fault() {
        let chunk = parse_line::<GenerateLine>(r#"{"error":"model not found"}"#);
        assert_eq!(chunk, Err(ProviderError::ApiError("model not found".into())));
    }

    #[test]
    fn malformed_line_is_invalid_response() {
        let chunk = parse_line::<GenerateLine>("not json");
        assert!(matches!(chunk, Err(ProviderError::InvalidResponse(_))));
    }
}
