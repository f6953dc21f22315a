// Generation module
// Chat model collaborator producing a cancellable stream of text fragments

pub mod ollama;

#[cfg(test)]
mod tests;

use anyhow::Result;
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

pub use ollama::OllamaChat;

/// Fragments buffered between the producer and the consumer
pub const STREAM_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[inline]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// A system instruction plus the conversation so far
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub system: String,
    pub messages: Vec<ChatMessage>,
}

impl GenerationRequest {
    /// Conversation with the system instruction prepended
    #[inline]
    pub fn to_messages(&self) -> Vec<ChatMessage> {
        std::iter::once(ChatMessage::system(self.system.clone()))
            .chain(self.messages.iter().cloned())
            .collect()
    }
}

/// Single-consumer stream of generated text.
///
/// Dropping the stream closes the channel; the producer notices on its next
/// send and stops reading from the model.
#[derive(Debug)]
pub struct TextStream {
    rx: mpsc::Receiver<Result<String>>,
}

impl TextStream {
    #[inline]
    pub fn new(rx: mpsc::Receiver<Result<String>>) -> Self {
        Self { rx }
    }

    /// Producer handle and the stream it feeds
    #[inline]
    pub fn channel() -> (mpsc::Sender<Result<String>>, Self) {
        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        (tx, Self::new(rx))
    }

    /// Drain the stream into one string, stopping at the first error
    #[inline]
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(fragment) = self.rx.recv().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for TextStream {
    type Item = Result<String>;

    #[inline]
    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Streams a chat completion
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Start generating; errors before the first fragment are returned here,
    /// later ones arrive through the stream
    async fn stream_chat(&self, request: GenerationRequest) -> Result<TextStream>;
}
