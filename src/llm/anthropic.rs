//! Anthropic completion adapter (Messages API). Anthropic has no
//! embedding endpoint, so only the completion capability exists here.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};

use super::{
    response_error, stream_lines, CompletionProvider, CompletionRequest, CompletionResponse,
    CompletionStream, LlmError, Message, StreamChunk, TokenUsage,
};

const PROVIDER: &str = "anthropic";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT_SECS: u64 = 60;
const STREAM_TIMEOUT_SECS: u64 = 300;

/// Anthropic Messages API completion provider.
pub struct AnthropicCompletion {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
    temperature: f64,
}

impl AnthropicCompletion {
    pub fn new(api_key: impl Into<String>, model: Option<String>, base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(10))
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .unwrap_or_default(),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            max_tokens: 4096,
            temperature: 0.7,
        }
    }

    fn post_messages(&self) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
    }

    fn messages_request(&self, req: &CompletionRequest, stream: bool) -> MessagesRequest {
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

        let (messages, system) = build_messages(req);

        MessagesRequest {
            model: self.model.clone(),
            max_tokens,
            system,
            messages,
            temperature,
            stream,
        }
    }
}

#[derive(Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<ApiMessage>,
    temperature: f64,
    stream: bool,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: String,
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize, Default)]
struct ApiUsage {
    #[serde(default)]
    input_tokens: usize,
    #[serde(default)]
    output_tokens: usize,
}

/// Convert the request into Anthropic's shape: conversation turns plus a
/// separate system string. The system prompt and formatted context are
/// concatenated; stray `system` roles in the conversation are folded in.
fn build_messages(req: &CompletionRequest) -> (Vec<ApiMessage>, String) {
    let mut system_parts = Vec::new();
    if !req.system_prompt.is_empty() {
        system_parts.push(req.system_prompt.clone());
    }
    if !req.context.is_empty() {
        system_parts.push(super::format_context(&req.context));
    }
    let mut system = system_parts.join("\n\n");

    let mut messages = Vec::with_capacity(req.messages.len());
    for Message { role, content } in &req.messages {
        if role == "system" {
            // Anthropic only accepts user/assistant turns
            system = format!("{content}\n\n{system}");
            continue;
        }
        messages.push(ApiMessage {
            role: role.clone(),
            content: content.clone(),
        });
    }

    (messages, system)
}

// ─── Streaming events ────────────────────────────────────

#[derive(Deserialize)]
struct StreamEventBody {
    #[serde(rename = "type")]
    event_type: String,
    delta: Option<EventDelta>,
    message: Option<EventMessage>,
    usage: Option<EventUsage>,
}

#[derive(Deserialize)]
struct EventDelta {
    #[serde(rename = "type", default)]
    delta_type: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    stop_reason: String,
}

#[derive(Deserialize)]
struct EventMessage {
    #[serde(default)]
    usage: ApiUsage,
}

#[derive(Deserialize)]
struct EventUsage {
    #[serde(default)]
    output_tokens: usize,
}

/// Streaming parser state: input token count arrives in `message_start`,
/// output tokens in the final `message_delta`.
#[derive(Default)]
struct StreamState {
    input_tokens: usize,
    output_tokens: usize,
    done: bool,
}

/// Interpret one SSE data line. Malformed lines are skipped.
fn parse_stream_line(line: &str, state: &mut StreamState) -> Option<StreamChunk> {
    let data = line.trim().strip_prefix("data: ")?.trim();
    if data.is_empty() {
        return None;
    }

    let event: StreamEventBody = serde_json::from_str(data).ok()?;

    match event.event_type.as_str() {
        "message_start" => {
            if let Some(message) = event.message {
                state.input_tokens = message.usage.input_tokens;
            }
            None
        }
        "content_block_delta" => {
            let delta = event.delta?;
            if delta.delta_type == "text_delta" && !delta.text.is_empty() {
                Some(StreamChunk {
                    content: delta.text,
                    ..Default::default()
                })
            } else {
                None
            }
        }
        "message_delta" => {
            if let Some(usage) = event.usage {
                state.output_tokens = usage.output_tokens;
            }
            let delta = event.delta?;
            if delta.stop_reason.is_empty() {
                return None;
            }
            Some(StreamChunk {
                content: String::new(),
                finish_reason: delta.stop_reason,
                usage: Some(TokenUsage {
                    prompt_tokens: state.input_tokens,
                    completion_tokens: state.output_tokens,
                    total_tokens: state.input_tokens + state.output_tokens,
                }),
            })
        }
        "message_stop" => {
            state.done = true;
            None
        }
        _ => None,
    }
}

#[async_trait]
impl CompletionProvider for AnthropicCompletion {
    async fn complete(&self, req: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let resp = self
            .post_messages()
            .json(&self.messages_request(&req, false))
            .send()
            .await
            .map_err(|source| LlmError::Http {
                provider: PROVIDER,
                source,
            })?;

        if !resp.status().is_success() {
            return Err(response_error(PROVIDER, resp).await);
        }

        let body: MessagesResponse = resp.json().await.map_err(|e| LlmError::InvalidResponse {
            provider: PROVIDER,
            message: e.to_string(),
        })?;

        let content: String = body
            .content
            .iter()
            .filter(|b| b.block_type == "text")
            .map(|b| b.text.as_str())
            .collect();

        Ok(CompletionResponse {
            content,
            finish_reason: body.stop_reason,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                total_tokens: body.usage.input_tokens + body.usage.output_tokens,
            },
        })
    }

    async fn complete_stream(&self, req: CompletionRequest) -> Result<CompletionStream, LlmError> {
        let resp = self
            .post_messages()
            .timeout(Duration::from_secs(STREAM_TIMEOUT_SECS))
            .json(&self.messages_request(&req, true))
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
            (Box::pin(lines), StreamState::default()),
            |(mut lines, mut state)| async move {
                loop {
                    if state.done {
                        return None;
                    }
                    match lines.next().await {
                        Some(Ok(line)) => {
                            if let Some(chunk) = parse_stream_line(&line, &mut state) {
                                return Some((Ok(chunk), (lines, state)));
                            }
                            // Terminal event may arrive without a chunk
                            continue;
                        }
                        Some(Err(e)) => return Some((Err(e), (lines, state))),
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
