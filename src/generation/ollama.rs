use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::BufRead;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{ChatMessage, GenerationRequest, TextGenerator, TextStream};
use crate::F1RagError;
use crate::config::Config;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

/// How the NDJSON read loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    /// The model reported `done`
    Completed,
    /// The body ended without a `done` line
    Truncated,
    /// The consumer dropped the stream
    Cancelled,
    /// A read, parse or model error was forwarded to the consumer
    Failed,
}

/// Streaming chat client for Ollama's `/api/chat`
#[derive(Debug, Clone)]
pub struct OllamaChat {
    base_url: Url,
    model: String,
    temperature: f32,
    agent: ureq::Agent,
}

impl OllamaChat {
    #[inline]
    pub fn new(config: &Config) -> Result<Self> {
        let base_url = config
            .ollama_url()
            .context("Failed to generate Ollama URL from config")?;

        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(
                config.generation.timeout_seconds,
            )))
            .build()
            .into();

        Ok(Self {
            base_url,
            model: config.ollama.chat_model.clone(),
            temperature: config.generation.temperature,
            agent,
        })
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, request: &GenerationRequest) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: request.to_messages(),
            stream: true,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };
        serde_json::to_string(&body).context("Failed to serialize chat request")
    }
}

#[async_trait]
impl TextGenerator for OllamaChat {
    #[inline]
    async fn stream_chat(&self, request: GenerationRequest) -> Result<TextStream> {
        let url = self
            .base_url
            .join("/api/chat")
            .context("Failed to build chat URL")?;
        let body = self.request_body(&request)?;
        let agent = self.agent.clone();
        let model = self.model.clone();

        let (tx, stream) = TextStream::channel();
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();

        debug!(
            "Starting chat with {} ({} messages)",
            model,
            request.messages.len()
        );

        tokio::task::spawn_blocking(move || {
            let response = match agent
                .post(url.as_str())
                .header("Content-Type", "application/json")
                .send(&body)
            {
                Ok(response) => response,
                Err(e) => {
                    error!("Chat request to {} failed: {}", url, e);
                    let failure = F1RagError::Generation(format!("Chat request failed: {}", e));
                    let _ = ready_tx.send(Err(failure.into()));
                    return;
                }
            };

            if ready_tx.send(Ok(())).is_err() {
                debug!("Chat caller went away before streaming started");
                return;
            }

            let reader = std::io::BufReader::new(response.into_body().into_reader());
            match forward_ndjson(reader, &tx) {
                StreamEnd::Completed => info!("Chat with {} completed", model),
                StreamEnd::Cancelled => info!("Chat with {} cancelled by consumer", model),
                StreamEnd::Truncated => warn!("Chat stream from {} ended without done", model),
                StreamEnd::Failed => warn!("Chat stream from {} failed", model),
            }
        });

        ready_rx
            .await
            .context("Chat task ended before connecting")??;

        Ok(stream)
    }
}

/// Forward `message.content` fragments from an Ollama NDJSON body to `tx`.
///
/// Returns as soon as the model is done, the consumer is gone, or an error
/// has been forwarded; remaining input is left unread.
#[inline]
pub fn forward_ndjson<R: BufRead>(reader: R, tx: &mpsc::Sender<Result<String>>) -> StreamEnd {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                let _ = tx.blocking_send(Err(anyhow::anyhow!("Failed to read chat stream: {}", e)));
                return StreamEnd::Failed;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let chunk: ChatChunk = match serde_json::from_str(&line) {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = tx.blocking_send(Err(anyhow::anyhow!("Invalid chat stream line: {}", e)));
                return StreamEnd::Failed;
            }
        };

        if let Some(message) = chunk.error {
            let failure = F1RagError::Generation(format!("Model error: {}", message));
            let _ = tx.blocking_send(Err(failure.into()));
            return StreamEnd::Failed;
        }

        if let Some(content) = chunk.message.map(|m| m.content).filter(|c| !c.is_empty()) {
            if tx.blocking_send(Ok(content)).is_err() {
                return StreamEnd::Cancelled;
            }
        }

        if chunk.done {
            return StreamEnd::Completed;
        }
    }

    StreamEnd::Truncated
}
