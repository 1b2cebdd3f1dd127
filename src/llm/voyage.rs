//! Voyage AI embedding adapter. Voyage is embedding-only; there is no
//! completion capability.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{response_error, EmbeddingProvider, LlmError};

const PROVIDER: &str = "voyage";
const DEFAULT_BASE_URL: &str = "https://api.voyageai.com/v1";
const DEFAULT_MODEL: &str = "voyage-3";
/// voyage-3 output width.
const DEFAULT_DIMENSIONS: usize = 1024;
const REQUEST_TIMEOUT_SECS: u64 = 60;
const EMBED_BATCH_SIZE: usize = 128;

/// Voyage embedding provider (`POST /embeddings`).
pub struct VoyageEmbedding {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimensions: usize,
}

impl VoyageEmbedding {
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
    index: usize,
}

#[async_trait]
impl EmbeddingProvider for VoyageEmbedding {
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
                .http
                .post(format!("{}/embeddings", self.base_url))
                .header("Authorization", format!("Bearer {}", self.api_key))
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

            // Voyage tags each embedding with its input index; order by it
            let mut data = body.data;
            data.sort_by_key(|d| d.index);
            all.extend(data.into_iter().map(|d| d.embedding));
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
