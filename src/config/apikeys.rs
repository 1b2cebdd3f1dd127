//! API key resolution for LLM providers.
//!
//! Keys are resolved per pipeline, and only for the providers that
//! pipeline actually uses. Resolution order for each provider:
//!
//! 1. Configured file path (already cascaded pipeline > defaults > global)
//! 2. Environment variable
//! 3. Default dotfile in the home directory

use std::path::PathBuf;

use super::validation::expand_path;
use super::{ApiKeysConfig, PipelineConfig};

pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";
pub const ENV_VOYAGE_API_KEY: &str = "VOYAGE_API_KEY";

const DEFAULT_OPENAI_KEY_FILE: &str = ".openai-api-key";
const DEFAULT_ANTHROPIC_KEY_FILE: &str = ".anthropic-api-key";
const DEFAULT_VOYAGE_KEY_FILE: &str = ".voyage-api-key";

/// Errors produced while loading API keys.
#[derive(Debug, thiserror::Error)]
pub enum ApiKeyError {
    #[error("{provider} API key file not found: {path}")]
    FileNotFound { provider: &'static str, path: String },
    #[error("failed to read {provider} API key: {source}")]
    Io {
        provider: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{provider} API key file is empty: {path}")]
    EmptyKey { provider: &'static str, path: String },
    #[error("{provider} API key not found: set {env_var} environment variable or create {path}")]
    NotFound {
        provider: &'static str,
        env_var: &'static str,
        path: String,
    },
}

/// Resolved credentials for one pipeline. `None` means the provider is
/// unavailable to that pipeline.
#[derive(Debug, Clone, Default)]
pub struct LoadedKeys {
    pub openai: Option<String>,
    pub anthropic: Option<String>,
    pub voyage: Option<String>,
}

/// Loads API keys from configured paths, environment variables, or default
/// dotfile locations.
pub struct ApiKeyLoader {
    config: ApiKeysConfig,
}

impl ApiKeyLoader {
    /// Create a loader over an already-cascaded key path configuration.
    pub fn new(config: ApiKeysConfig) -> Self {
        Self { config }
    }

    /// Load only the keys required by the given pipeline's providers.
    pub fn load_for_pipeline(&self, pipeline: &PipelineConfig) -> Result<LoadedKeys, ApiKeyError> {
        let embedding = pipeline.embedding_llm.provider.to_lowercase();
        let completion = pipeline.rag_llm.provider.to_lowercase();
        let needs = |provider: &str| embedding == provider || completion == provider;

        let mut keys = LoadedKeys::default();

        if needs("openai") {
            keys.openai = Some(self.load_openai_key()?);
        }
        if needs("anthropic") {
            keys.anthropic = Some(self.load_anthropic_key()?);
        }
        if needs("voyage") {
            keys.voyage = Some(self.load_voyage_key()?);
        }
        // Ollama requires no API key

        Ok(keys)
    }

    pub fn load_openai_key(&self) -> Result<String, ApiKeyError> {
        self.load_key(
            &self.config.openai,
            ENV_OPENAI_API_KEY,
            DEFAULT_OPENAI_KEY_FILE,
            "OpenAI",
        )
    }

    pub fn load_anthropic_key(&self) -> Result<String, ApiKeyError> {
        self.load_key(
            &self.config.anthropic,
            ENV_ANTHROPIC_API_KEY,
            DEFAULT_ANTHROPIC_KEY_FILE,
            "Anthropic",
        )
    }

    pub fn load_voyage_key(&self) -> Result<String, ApiKeyError> {
        self.load_key(
            &self.config.voyage,
            ENV_VOYAGE_API_KEY,
            DEFAULT_VOYAGE_KEY_FILE,
            "Voyage",
        )
    }

    fn load_key(
        &self,
        config_path: &str,
        env_var: &'static str,
        default_file: &str,
        provider: &'static str,
    ) -> Result<String, ApiKeyError> {
        // Priority 1: configured file path
        if !config_path.is_empty() {
            return read_key_file(&expand_path(config_path), provider);
        }

        // Priority 2: environment variable
        if let Ok(key) = std::env::var(env_var) {
            if !key.is_empty() {
                return Ok(key);
            }
        }

        // Priority 3: default dotfile
        let path = dirs::home_dir()
            .map(|home| home.join(default_file))
            .unwrap_or_else(|| PathBuf::from(default_file));

        if !path.exists() {
            return Err(ApiKeyError::NotFound {
                provider,
                env_var,
                path: path.display().to_string(),
            });
        }

        read_key_file(&path, provider)
    }
}

fn read_key_file(path: &PathBuf, provider: &'static str) -> Result<String, ApiKeyError> {
    if !path.exists() {
        return Err(ApiKeyError::FileNotFound {
            provider,
            path: path.display().to_string(),
        });
    }

    let data = std::fs::read_to_string(path).map_err(|source| ApiKeyError::Io {
        provider,
        source,
    })?;

    let key = data.trim().to_string();
    if key.is_empty() {
        return Err(ApiKeyError::EmptyKey {
            provider,
            path: path.display().to_string(),
        });
    }

    Ok(key)
}
