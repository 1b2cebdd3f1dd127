//! Ollama adapters for local inference. No credential is required; the
//! endpoint defaults to a local HTTP service.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{
    response_error, stream_lines, CompletionProvider, CompletionRequest, CompletionResponse,
    CompletionStream, EmbeddingProvider, LlmError, Message, StreamChunk, TokenUsage,
};

const PROVIDER: &str = "ollama";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_CHAT_MODEL: &str = "llama3.2";
/// nomic-embed-text output width.
const DEFAULT_DIMENSIONS: usize = 768;
// Local models can be slow to load
const REQUEST_TIMEOUT_SECS: u64 = 120;
const STREAM_TIMEOUT_SECS: u64 = 300;

/// Resolve the Ollama endpoint: explicit config, then `OLLAMA_HOST`, then
/// the local default.
pub fn resolve_base_url(configured: Option<String>) -> String {
    if let Some(url) = configured {
        return url;
    }
    if let Ok(host) = std::env::var("OLLAMA_HOST") {
        if !host.is_empty() {
            return host;
        }
    }
    DEFAULT_BASE_URL.to_string()
}

fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .unwrap_or_default()
}

// ─── Embeddings ──────────────────────────────────────────

/// Ollama embedding provider (`POST /api/embeddings`).
pub struct OllamaEmbedding {
    http: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbedding {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: build_http_client(),
            base_url: resolve_base_url(base_url),
            model: model.unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            dimensions: DEFAULT_DIMENSIONS,
        }
    }

    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    // Ollama returns float64 values
    embedding: Vec<f64>,
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let resp = self
            .http
            .post(format!("{}/api/embeddings", self.base_url))
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|source| LlmError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !resp.status().is_success() {
            return Err(response_error(PROVIDER, resp).await);
        }

        let body: EmbeddingResponse =
            resp.json().await.map_err(|e| LlmError::InvalidResponse {
                provider: PROVIDER,
                message: e.to_string(),
            })?;

        Ok(body.embedding.into_iter().map(|v| v as f32).collect())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        // The embeddings endpoint is single-prompt; batch sequentially
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ─── Chat completions ────────────────────────────────────

/// Ollama completion provider (`POST /api/chat`, NDJSON streaming).
pub struct OllamaCompletion {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f64,
}

impl OllamaCompletion {
    pub fn new(model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: build_http_client(),
            base_url: resolve_base_url(base_url),
            model: model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            temperature: 0.7,
        }
    }

    fn chat_request(&self, req: &CompletionRequest, stream: bool) -> ChatRequest {
        let temperature = if req.temperature >= 0.0 {
            req.temperature
        } else {
            self.temperature
        };

        ChatRequest {
            model: self.model.clone(),
            messages: build_messages(req),
            stream,
            options: ChatOptions {
                temperature,
                num_predict: req.max_tokens,
            },
        }
    }
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f64,
    #[serde(skip_serializing_if = "is_zero")]
    num_predict: usize,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
    done: bool,
    #[serde(default)]
    prompt_eval_count: usize,
    #[serde(default)]
    eval_count: usize,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

/// Same chat shape as the OpenAI-style API: system prompt and context go
/// in as leading system messages.
fn build_messages(req: &CompletionRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(req.messages.len() + 2);

    if !req.system_prompt.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: req.system_prompt.clone(),
        });
    }
    if !req.context.is_empty() {
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: super::format_context(&req.context),
        });
    }
    for Message { role, content } in &req.messages {
        messages.push(ChatMessage {
            role: role.clone(),
            content: content.clone(),
        });
    }

    messages
}

/// Parse one NDJSON line of an Ollama chat stream. The `done: true` line
/// is the terminal sentinel and carries the usage tally. Malformed lines
/// are skipped.
fn parse_stream_line(line: &str) -> Option<(StreamChunk, bool)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let body: ChatResponse = serde_json::from_str(line).ok()?;

    if body.done {
        return Some((
            StreamChunk {
                content: body.message.content,
                finish_reason: "stop".to_string(),
                usage: Some(TokenUsage {
                    prompt_tokens: body.prompt_eval_count,
                    completion_tokens: body.eval_count,
                    total_tokens: body.prompt_eval_count + body.eval_count,
                }),
            },
            true,
        ));
    }

    if body.message.content.is_empty() {
        return None;
    }
    Some((
        StreamChunk {
            content: body.message.content,
            ..Default::default()
        },
        false,
    ))
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.chat_request(&req, false))
            .send()
            .await
            .map_err(|source| LlmError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !resp.status().is_success() {
            return Err(response_error(PROVIDER, resp).await);
        }

        let body: ChatResponse = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        let finish_reason = if body.done { "stop" } else { "length" };

        Ok(CompletionResponse {
            content: body.message.content,
            finish_reason: finish_reason.to_string(),
            usage: TokenUsage {
                prompt_tokens: body.prompt_eval_count,
                completion_tokens: body.eval_count,
                total_tokens: body.prompt_eval_count + body.eval_count,
            },
        })
    }

    async fn complete_stream(&self, req: CompletionRequest) -> Result<CompletionStream, LlmError> {
        let resp = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
            .json(&self.chat_request(&req, true))
            .send()
            .await
            .map_err(|source| LlmError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !resp.status().is_success() {
            return Err(response_error(PROVIDER, resp).await);
        }

        let lines = stream_lines(resp.bytes_stream(), PROVIDER);
        let stream = futures_util::stream::unfold(
            (Box::pin(lines), false),
            |(mut lines, done)| async move {
                if done {
                    return None;
                }
                loop {
                    match lines.next().await {
                        Some(Ok(line)) => {
                            if let Some((chunk, is_terminal)) = parse_stream_line(&line) {
                                return Some((Ok(chunk), (lines, is_terminal)));
                            }
                            continue;
                        }
                        Some(Err(e)) => return Some((Err(e), (lines, done))),
                        None => return None,
                    }
                }
            },
        );

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_chunk() {
        let line = r#"{"message":{"role":"assistant","content":"The main"},"done":false}"#;
        let (chunk, done) = parse_stream_line(line).unwrap();
        assert_eq!(chunk.content, "The main");
        assert!(!done);
    }

    #[test]
    fn test_parse_done_chunk_carries_usage() {
        let line = r#"{"message":{"role":"assistant","content":""},"done":true,"prompt_eval_count":100,"eval_count":20}"#;
        let (chunk, done) = parse_stream_line(line).unwrap();
        assert!(done);
        assert_eq!(chunk.finish_reason, "stop");
        assert_eq!(chunk.usage.unwrap().total_tokens, 120);
    }

    #[test]
    fn test_parse_empty_content_skipped() {
        let line = r#"{"message":{"role":"assistant","content":""},"done":false}"#;
        assert!(parse_stream_line(line).is_none());
    }

    #[test]
    fn test_parse_malformed_line_skipped() {
        assert!(parse_stream_line("not valid json{{{").is_none());
        assert!(parse_stream_line("").is_none());
    }

    #[test]
    fn test_build_messages_shape() {
        let req = CompletionRequest {
            system_prompt: "prompt".into(),
            context: vec![crate::llm::ContextDocument {
                content: "ctx".into(),
                ..Default::default()
            }],
            messages: vec![Message {
                role: "user".into(),
                content: "q".into(),
            }],
            ..Default::default()
        };
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[1].role, "system");
        assert_eq!(msgs[2].role, "user");
    }

    #[test]
    fn test_resolve_base_url_prefers_config() {
        assert_eq!(
            resolve_base_url(Some("http://gpu-box:11434".into())),
            "http://gpu-box:11434"
        );
    }

    #[test]
    fn test_defaults() {
        let embed = OllamaEmbedding::new(None, Some(DEFAULT_BASE_URL.into()));
        assert_eq!(embed.model_name(), "nomic-embed-text");
        assert_eq!(embed.dimensions(), 768);

        let chat = OllamaCompletion::new(None, Some(DEFAULT_BASE_URL.into()));
        assert_eq!(chat.model_name(), "llama3.2");
    }
}
