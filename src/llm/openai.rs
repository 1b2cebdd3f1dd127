//! OpenAI adapters: embeddings and chat completions.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{
    response_error, stream_lines, CompletionProvider, CompletionRequest, CompletionResponse,
    CompletionStream, EmbeddingProvider, LlmError, Message, StreamChunk, TokenUsage,
};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
/// text-embedding-3-small output width.
const DEFAULT_DIMENSIONS: usize = 1536;
const EMBED_BATCH_SIZE: usize = 64;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const STREAM_TIMEOUT_SECS: u64 = 300;

/// Shared OpenAI API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl Client {
    pub fn new(api_key: impl Into<String>, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .header("Authorization", format!("Bearer {}", self.api_key))
    }
}

// ─── Embeddings ──────────────────────────────────────────

/// OpenAI embedding provider (`POST /embeddings`).
pub struct OpenAiEmbedding {
    client: Client,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedding {
    pub fn new(client: Client, model: Option<String>) -> Self {
        Self {
            client,
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
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER,
                message: "no embedding returned".to_string(),
            })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(EMBED_BATCH_SIZE) {
            let resp = self
                .client
                .post("/embeddings")
                .json(&EmbeddingRequest {
                    model: &self.model,
                    input: chunk,
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

            all.extend(body.data.into_iter().map(|d| d.embedding));
        }

        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

// ─── Chat completions ────────────────────────────────────

/// OpenAI completion provider (`POST /chat/completions`).
pub struct OpenAiCompletion {
    client: Client,
    model: String,
    max_tokens: usize,
    temperature: f64,
}

impl OpenAiCompletion {
    pub fn new(client: Client, model: Option<String>) -> Self {
        Self {
            client,
            model: model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            max_tokens: 4096,
            temperature: 0.7,
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
    #[serde(skip_serializing_if = "is_zero")]
    max_tokens: usize,
    temperature: f64,
    stream: bool,
}

fn is_zero(n: &usize) -> bool {
    *n == 0
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    #[serde(default)]
    finish_reason: String,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Deserialize, Default)]
struct Usage {
    #[serde(default)]
    prompt_tokens: usize,
    #[serde(default)]
    completion_tokens: usize,
    #[serde(default)]
    total_tokens: usize,
}

#[derive(Deserialize)]
struct StreamChunkBody {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

/// Parse one SSE line of an OpenAI completion stream. Returns `None` for
/// lines carrying nothing to forward: non-data lines, the `[DONE]`
/// sentinel, role-only deltas, and malformed chunks (skipped).
fn parse_stream_line(line: &str) -> Option<StreamChunk> {
    let data = line.trim().strip_prefix("data: ")?.trim();
    if data == "[DONE]" {
        return None;
    }

    let body: StreamChunkBody = serde_json::from_str(data).ok()?;

    let mut chunk = StreamChunk::default();
    if let Some(choice) = body.choices.first() {
        if let Some(content) = &choice.delta.content {
            chunk.content = content.clone();
        }
        if let Some(reason) = &choice.finish_reason {
            chunk.finish_reason = reason.clone();
        }
    }
    if let Some(usage) = body.usage {
        chunk.usage = Some(TokenUsage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        });
    }

    if chunk.content.is_empty() && chunk.finish_reason.is_empty() && chunk.usage.is_none() {
        return None;
    }
    Some(chunk)
}

/// Build the chat message array: system prompt and formatted context go in
/// as system messages ahead of the conversation.
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

impl OpenAiCompletion {
    fn chat_request(&self, req: &CompletionRequest, stream: bool) -> ChatRequest {
        let max_tokens = if req.max_tokens > 0 {
            req.max_tokens
        } else {
            self.max_tokens
        };
        let temperature = if req.temperature >= 0.0 {
            req.temperature
        } else {
            self.temperature
        };

        ChatRequest {
            model: self.model.clone(),
            messages: build_messages(req),
            max_tokens,
            temperature,
            stream,
        }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let resp = self
            .client
            .post("/chat/completions")
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

        let choice = body
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse {
                provider: PROVIDER,
                message: "no completion returned".to_string(),
            })?;

        Ok(CompletionResponse {
            content: choice.message.content,
            finish_reason: choice.finish_reason,
            usage: TokenUsage {
                prompt_tokens: body.usage.prompt_tokens,
                completion_tokens: body.usage.completion_tokens,
                total_tokens: body.usage.total_tokens,
            },
        })
    }

    async fn complete_stream(&self, req: CompletionRequest) -> Result<CompletionStream, LlmError> {
        let resp = self
            .client
            .post("/chat/completions")
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

        let stream = stream_lines(resp.bytes_stream(), PROVIDER).filter_map(|line| async move {
            match line {
                Ok(line) => parse_stream_line(&line).map(Ok),
                Err(e) => Some(Err(e)),
            }
        });

        Ok(Box::pin(stream))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ContextDocument;

    // ─── Stream line parsing ─────────────────────────────

    #[test]
    fn test_parse_content_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#;
        let chunk = parse_stream_line(line).unwrap();
        assert_eq!(chunk.content, "Hello");
        assert!(chunk.finish_reason.is_empty());
    }

    #[test]
    fn test_parse_done_sentinel() {
        assert!(parse_stream_line("data: [DONE]").is_none());
    }

    #[test]
    fn test_parse_role_only_delta_skipped() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(parse_stream_line(line).is_none());
    }

    #[test]
    fn test_parse_malformed_chunk_skipped() {
        assert!(parse_stream_line("data: {broken json").is_none());
    }

    #[test]
    fn test_parse_non_data_line_skipped() {
        assert!(parse_stream_line("event: message").is_none());
        assert!(parse_stream_line("").is_none());
    }

    #[test]
    fn test_parse_finish_reason_with_usage() {
        let line = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}],"usage":{"prompt_tokens":100,"completion_tokens":20,"total_tokens":120}}"#;
        let chunk = parse_stream_line(line).unwrap();
        assert_eq!(chunk.finish_reason, "stop");
        assert_eq!(chunk.usage.unwrap().total_tokens, 120);
    }

    // ─── Message building ────────────────────────────────

    #[test]
    fn test_build_messages_prepends_system_messages() {
        let req = CompletionRequest {
            system_prompt: "be helpful".into(),
            context: vec![ContextDocument {
                content: "ctx doc".into(),
                ..Default::default()
            }],
            messages: vec![
                Message {
                    role: "user".into(),
                    content: "q1".into(),
                },
                Message {
                    role: "assistant".into(),
                    content: "a1".into(),
                },
            ],
            ..Default::default()
        };

        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 4);
        assert_eq!(msgs[0].role, "system");
        assert_eq!(msgs[0].content, "be helpful");
        assert_eq!(msgs[1].role, "system");
        assert!(msgs[1].content.contains("ctx doc"));
        assert_eq!(msgs[2].role, "user");
        assert_eq!(msgs[3].role, "assistant");
    }

    #[test]
    fn test_build_messages_without_prompt_or_context() {
        let req = CompletionRequest {
            messages: vec![Message {
                role: "user".into(),
                content: "hello".into(),
            }],
            ..Default::default()
        };
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].role, "user");
    }

    #[test]
    fn test_request_overrides_beat_provider_defaults() {
        let provider = OpenAiCompletion::new(Client::new("sk-test", None), None);
        let req = CompletionRequest {
            max_tokens: 512,
            temperature: 0.1,
            ..Default::default()
        };
        let chat_req = provider.chat_request(&req, false);
        assert_eq!(chat_req.max_tokens, 512);
        assert!((chat_req.temperature - 0.1).abs() < f64::EPSILON);

        let defaults = CompletionRequest {
            temperature: -1.0,
            ..Default::default()
        };
        let chat_req = provider.chat_request(&defaults, false);
        assert_eq!(chat_req.max_tokens, 4096);
        assert!((chat_req.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_models() {
        let embed = OpenAiEmbedding::new(Client::new("sk-test", None), None);
        assert_eq!(embed.model_name(), "text-embedding-3-small");
        assert_eq!(embed.dimensions(), 1536);

        let chat = OpenAiCompletion::new(Client::new("sk-test", None), None);
        assert_eq!(chat.model_name(), "gpt-4o-mini");
    }
}
