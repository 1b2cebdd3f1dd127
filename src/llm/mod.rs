//! LLM provider abstractions and per-vendor adapters.
//!
//! Two capability sets: [`EmbeddingProvider`] (OpenAI, Voyage, Ollama) and
//! [`CompletionProvider`] (Anthropic, OpenAI, Ollama). A vendor missing a
//! capability fails at pipeline construction in [`factory`], never per
//! request.

pub mod anthropic;
pub mod factory;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod voyage;

use std::fmt::Write as _;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};

/// Errors from LLM provider calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// The vendor answered with a non-success status.
    #[error("{provider} API error (status {status}): {message}")]
    Api {
        provider: &'static str,
        status: u16,
        message: String,
    },
    /// The request never completed (connect, timeout, TLS, mid-body).
    #[error("{provider} request failed: {source}")]
    Http {
        provider: &'static str,
        #[source]
        source: reqwest::Error,
    },
    /// The vendor answered 200 with a body we could not use.
    #[error("invalid {provider} response: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

impl LlmError {
    /// Whether the failure is transient (rate limit, overload, network,
    /// timeout) and an outer layer may retry it. The core never retries.
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Api { status, .. } => {
                *status == 429 || *status == 408 || (500..=599).contains(status)
            }
            LlmError::Http { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            _ => false,
        }
    }
}

/// Generates vector embeddings from text.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    /// Generate embeddings for multiple texts, returned in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;

    /// Dimensionality of the produced embeddings.
    fn dimensions(&self) -> usize;

    /// Name of the model in use.
    fn model_name(&self) -> &str;
}

/// An ordered stream of completion chunks. The stream ending is the close
/// signal; an `Err` item is the error signal and terminates the stream.
pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, LlmError>> + Send>>;

/// Generates text completions.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Generate a completion for the given request.
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError>;

    /// Generate a streaming completion.
    async fn complete_stream(&self, req: CompletionRequest) -> Result<CompletionStream, LlmError>;

    /// Name of the model in use.
    fn model_name(&self) -> &str;
}

/// A message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// "user", "assistant", or "system".
    pub role: String,
    pub content: String,
}

/// A retrieved document passed to the completion provider.
#[derive(Debug, Clone, Default)]
pub struct ContextDocument {
    pub content: String,
    pub source: String,
    pub score: f64,
}

/// A request to a completion provider.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    /// System-level instruction for the model.
    pub system_prompt: String,
    /// Retrieved documents to include in the prompt.
    pub context: Vec<ContextDocument>,
    /// Conversation history, ending with the current user turn.
    pub messages: Vec<Message>,
    /// Maximum tokens to generate; 0 uses the provider default.
    pub max_tokens: usize,
    /// Randomness; negative uses the provider default.
    pub temperature: f64,
}

/// A non-streaming completion response.
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub content: String,
    pub finish_reason: String,
    pub usage: TokenUsage,
}

/// One chunk of a streaming response. `finish_reason` stays empty until
/// the final chunk, which may also carry the usage tally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub content: String,
    pub finish_reason: String,
    pub usage: Option<TokenUsage>,
}

/// Token consumption for a request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

/// Format context documents for inclusion in a prompt. Shared by every
/// completion adapter so the model sees one consistent shape.
pub fn format_context(docs: &[ContextDocument]) -> String {
    let mut out = String::from("Use the following context to answer the question:\n\n");

    for (i, doc) in docs.iter().enumerate() {
        let _ = write!(out, "--- Document {}", i + 1);
        if !doc.source.is_empty() {
            let _ = write!(out, " (Source: {})", doc.source);
        }
        out.push_str(" ---\n");
        out.push_str(&doc.content);
        out.push_str("\n\n");
    }

    out
}

/// Convert a reqwest byte stream into a stream of complete lines. Used by
/// the streaming adapters to split SSE and NDJSON bodies.
pub(crate) fn stream_lines(
    byte_stream: impl Stream<Item = reqwest::Result<bytes::Bytes>> + Send + 'static,
    provider: &'static str,
) -> impl Stream<Item = Result<String, LlmError>> + Send {
    futures_util::stream::unfold(
        (Box::pin(byte_stream), String::new()),
        move |(mut stream, mut buffer)| async move {
            loop {
                // Try to extract a complete line from the buffer first
                if let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].to_string();
                    buffer = buffer[newline_pos + 1..].to_string();
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                // No complete line buffered, read more bytes
                match stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.push_str(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Err(source)) => {
                        return Some((
                            Err(LlmError::Http { provider, source }),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        // Stream ended, flush whatever remains
                        if !buffer.trim().is_empty() {
                            let remaining = std::mem::take(&mut buffer);
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}

/// Read a non-success response into an [`LlmError::Api`].
pub(crate) async fn response_error(provider: &'static str, resp: reqwest::Response) -> LlmError {
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    LlmError::Api {
        provider,
        status,
        message,
    }
}
