//! Mock providers used by tests and local development.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use super::{
    CompletionProvider, CompletionRequest, CompletionResponse, CompletionStream,
    EmbeddingProvider, LlmError, StreamChunk, TokenUsage,
};

/// Embedding provider that always returns the same vector.
#[derive(Clone)]
pub struct MockEmbedding {
    vector: Vec<f32>,
    fail: bool,
    call_count: Arc<AtomicUsize>,
}

impl MockEmbedding {
    /// Always return `vector`.
    pub fn returning(vector: Vec<f32>) -> Self {
        Self {
            vector,
            fail: false,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every call.
    pub fn failing() -> Self {
        Self {
            vector: Vec::new(),
            fail: true,
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
                message: "mock embedding failure".to_string(),
            });
        }
        Ok(self.vector.clone())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.vector.len()
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }
}

/// Completion provider with a canned answer and a canned chunk sequence.
#[derive(Clone)]
pub struct MockCompletion {
    answer: String,
    chunks: Vec<String>,
    total_tokens: usize,
    fail: bool,
    stream_error: Option<String>,
    /// Requests seen by `complete`/`complete_stream`, for assertions.
    pub requests: Arc<parking_lot::Mutex<Vec<CompletionRequest>>>,
}

impl MockCompletion {
    pub fn new(answer: impl Into<String>, chunks: Vec<String>, total_tokens: usize) -> Self {
        Self {
            answer: answer.into(),
            chunks,
            total_tokens,
            fail: false,
            stream_error: None,
            requests: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    /// Fail every call up front.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("", Vec::new(), 0)
        }
    }

    /// Emit the configured chunks, then an error, instead of ending
    /// cleanly.
    pub fn with_stream_error(mut self, message: impl Into<String>) -> Self {
        self.stream_error = Some(message.into());
        self
    }
}

#[async_trait]
impl CompletionProvider for MockCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.requests.lock().push(req);
        if self.fail {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
                message: "mock completion failure".to_string(),
            });
        }
        Ok(CompletionResponse {
            content: self.answer.clone(),
            finish_reason: "stop".to_string(),
            usage: TokenUsage {
                prompt_tokens: self.total_tokens,
                completion_tokens: 0,
                total_tokens: self.total_tokens,
            },
        })
    }

    async fn complete_stream(&self, req: CompletionRequest) -> Result<CompletionStream, LlmError> {
        self.requests.lock().push(req);
        if self.fail {
            return Err(LlmError::Api {
                provider: "mock",
                status: 500,
                message: "mock completion failure".to_string(),
            });
        }

        let mut items: Vec<Result<StreamChunk, LlmError>> = self
            .chunks
            .iter()
            .map(|content| {
                Ok(StreamChunk {
                    content: content.clone(),
                    ..Default::default()
                })
            })
            .collect();

        if let Some(message) = &self.stream_error {
            items.push(Err(LlmError::Api {
                provider: "mock",
                status: 500,
                message: message.clone(),
            }));
        }

        Ok(Box::pin(futures_util::stream::iter(items)))
    }

    fn model_name(&self) -> &str {
        "mock-completion"
    }
}
