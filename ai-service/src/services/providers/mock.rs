//! Mock provider for testing.

use super::{ChunkStream, IncrementalChunk, ProviderError, TextProvider};
use crate::models::ChatMessage;
use async_trait::async_trait;
use std::sync::Mutex;

type Script = Vec<Result<IncrementalChunk, ProviderError>>;

/// Mock text provider for testing.
///
/// By default it echoes the prompt (or the last chat message) back, streamed
/// in two pieces. `with_script` replaces the streamed sequence verbatim.
pub struct MockTextProvider {
    enabled: bool,
    script: Option<Script>,
    open_error: Option<ProviderError>,
    models: Mutex<Vec<Option<String>>>,
}

impl MockTextProvider {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            script: None,
            open_error: None,
            models: Mutex::new(Vec::new()),
        }
    }

    /// Stream exactly these results from every streaming call.
    pub fn with_script(mut self, script: Script) -> Self {
        self.script = Some(script);
        self
    }

    /// Fail every call with this error.
    pub fn failing(mut self, error: ProviderError) -> Self {
        self.open_error = Some(error);
        self
    }

    /// Model overrides seen so far, in call order.
    pub fn models_seen(&self) -> Vec<Option<String>> {
        self.models.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn start(&self, model: Option<&str>) -> Result<(), ProviderError> {
        if let Ok(mut models) = self.models.lock() {
            models.push(model.map(str::to_string));
        }
        if !self.enabled {
            return Err(ProviderError::NotConfigured(
                "Mock text provider not enabled".to_string(),
            ));
        }
        match &self.open_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn echo(&self, text: &str) -> String {
        format!("Mock response for: {}", text)
    }

    fn stream_of(&self, text: &str) -> ChunkStream {
        let script = self.script.clone().unwrap_or_else(|| {
            let reply = self.echo(text);
            let split = reply
                .char_indices()
                .nth(reply.chars().count() / 2)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let (head, tail) = reply.split_at(split);
            vec![
                Ok(IncrementalChunk::text(head)),
                Ok(IncrementalChunk {
                    text: Some(tail.to_string()),
                    is_final: true,
                }),
            ]
        });

        ChunkStream::new(tokio_stream::iter(script))
    }
}

fn last_content(messages: &[ChatMessage]) -> &str {
    messages.last().map(|m| m.content.as_str()).unwrap_or("")
}

#[async_trait]
impl TextProvider for MockTextProvider {
    async fn generate(&self, prompt: &str, model: Option<&str>) -> Result<String, ProviderError> {
        self.start(model)?;
        Ok(self.echo(prompt))
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<String, ProviderError> {
        self.start(model)?;
        Ok(self.echo(last_content(messages)))
    }

    async fn generate_stream(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<ChunkStream, ProviderError> {
        self.start(model)?;
        Ok(self.stream_of(prompt))
    }

    async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        model: Option<&str>,
    ) -> Result<ChunkStream, ProviderError> {
        self.start(model)?;
        Ok(self.stream_of(last_content(messages)))
    }

    async fn health_check(&self) -> Result<(), ProviderError> {
        self.start(None)
    }
}
