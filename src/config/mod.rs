//! Configuration loading and validation for the RAG server.
//!
//! Configuration is a single YAML document with three layers: global
//! settings, `defaults` that apply to every pipeline, and per-pipeline
//! overrides. The cascade (pipeline > defaults > global) is resolved once
//! at load time by [`loader`]; nothing is re-resolved at runtime.

mod apikeys;
mod loader;
mod validation;

pub use apikeys::{ApiKeyError, ApiKeyLoader, LoadedKeys};
pub use loader::{load, ConfigError, CONFIG_FILE_NAME, SYSTEM_CONFIG_PATH};
pub use validation::{ValidationError, ValidationErrors};

use serde::Deserialize;

/// Root configuration structure for the server.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub api_keys: ApiKeysConfig,
    pub defaults: Defaults,
    pub pipelines: Vec<PipelineConfig>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub port: u16,
    pub tls: TlsConfig,
    pub cors: CorsConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 8080,
            tls: TlsConfig::default(),
            cors: CorsConfig::default(),
        }
    }
}

/// TLS settings. Certificate handling is delegated to a fronting proxy;
/// the fields are validated so misconfiguration fails at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub cert_file: String,
    pub key_file: String,
}

/// CORS settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub enabled: bool,
    /// Origins to allow, or `["*"]` for all.
    pub allowed_origins: Vec<String>,
}

/// Paths to files containing API keys for LLM providers. When unset, keys
/// are loaded from environment variables or default dotfile locations
/// (`~/.openai-api-key`, `~/.anthropic-api-key`, `~/.voyage-api-key`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiKeysConfig {
    pub openai: String,
    pub anthropic: String,
    pub voyage: String,
}

/// Default values that can be overridden per-pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub token_budget: Option<usize>,
    pub top_n: Option<usize>,
    pub embedding_llm: LlmConfig,
    pub rag_llm: LlmConfig,
    pub api_keys: ApiKeysConfig,
}

/// A single RAG pipeline configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub name: String,
    pub description: String,
    pub database: DatabaseConfig,
    pub tables: Vec<TableSource>,
    pub embedding_llm: LlmConfig,
    pub rag_llm: LlmConfig,
    pub api_keys: ApiKeysConfig,
    pub token_budget: Option<usize>,
    pub top_n: Option<usize>,
    pub system_prompt: Option<String>,
    pub search: SearchConfig,
}

/// PostgreSQL connection settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub ssl_mode: String,
    // Certificate-based authentication
    pub ssl_cert: String,
    pub ssl_key: String,
    pub ssl_root_ca: String,
}

/// A table with text and vector columns for hybrid search.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TableSource {
    pub table: String,
    pub text_column: String,
    pub vector_column: String,
    /// Optional ID column (required for views).
    pub id_column: String,
    /// Optional filter, raw SQL or structured.
    pub filter: Option<ConfigFilter>,
}

/// Settings for search behavior.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Enable hybrid search (default: true).
    pub hybrid_enabled: Option<bool>,
    /// Weight for vector vs BM25, in `[0, 1]`. `1.0` selects pure-vector
    /// retrieval; values in between keep plain RRF fusion.
    pub vector_weight: Option<f64>,
}

impl SearchConfig {
    pub fn hybrid_enabled(&self) -> bool {
        self.hybrid_enabled.unwrap_or(true)
    }
}

/// Settings for an LLM provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
}

/// A single filter condition.
#[derive(Debug, Clone, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

/// A collection of conditions joined by a logical operator. Used for API
/// request filters, which must be parameterized for security.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Filter {
    pub conditions: Vec<FilterCondition>,
    /// "AND" or "OR", default "AND".
    #[serde(default)]
    pub logic: String,
}

/// A filter in pipeline configuration: either a raw SQL fragment
/// (admin-controlled, emitted verbatim) or a structured [`Filter`].
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConfigFilter {
    RawSql(String),
    Structured(Filter),
}
