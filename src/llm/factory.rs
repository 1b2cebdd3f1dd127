//! Provider construction from configuration. Capability mismatches and
//! missing credentials fail here, at pipeline construction, never per
//! request.

use std::sync::Arc;

use crate::config::{LlmConfig, LoadedKeys};

use super::anthropic::AnthropicCompletion;
use super::ollama::{OllamaCompletion, OllamaEmbedding};
use super::openai::{Client as OpenAiClient, OpenAiCompletion, OpenAiEmbedding};
use super::voyage::VoyageEmbedding;
use super::{CompletionProvider, EmbeddingProvider};

/// Errors from provider construction.
#[derive(Debug, thiserror::Error)]
pub enum FactoryError {
    #[error("unknown {kind} provider: {name}")]
    UnknownProvider { kind: &'static str, name: String },
    #[error("{0} API key not configured")]
    MissingApiKey(&'static str),
    #[error("{provider} does not provide {capability}")]
    UnsupportedCapability {
        provider: &'static str,
        capability: &'static str,
    },
}

/// Create an embedding provider from configuration.
pub fn new_embedding_provider(
    cfg: &LlmConfig,
    keys: &LoadedKeys,
) -> Result<Arc<dyn EmbeddingProvider>, FactoryError> {
    let model = (!cfg.model.is_empty()).then(|| cfg.model.clone());

    match cfg.provider.to_lowercase().as_str() {
        "openai" => {
            let key = keys
                .openai
                .as_deref()
                .ok_or(FactoryError::MissingApiKey("OpenAI"))?;
            let client = OpenAiClient::new(key, cfg.base_url.clone());
            Ok(Arc::new(OpenAiEmbedding::new(client, model)))
        }
        "voyage" => {
            let key = keys
                .voyage
                .as_deref()
                .ok_or(FactoryError::MissingApiKey("Voyage"))?;
            Ok(Arc::new(VoyageEmbedding::new(
                key,
                model,
                cfg.base_url.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(OllamaEmbedding::new(model, cfg.base_url.clone()))),
        "anthropic" => Err(FactoryError::UnsupportedCapability {
            provider: "anthropic",
            capability: "an embedding API",
        }),
        _ => Err(FactoryError::UnknownProvider {
            kind: "embedding",
            name: cfg.provider.clone(),
        }),
    }
}

/// Create a completion provider from configuration.
pub fn new_completion_provider(
    cfg: &LlmConfig,
    keys: &LoadedKeys,
) -> Result<Arc<dyn CompletionProvider>, FactoryError> {
    let model = (!cfg.model.is_empty()).then(|| cfg.model.clone());

    match cfg.provider.to_lowercase().as_str() {
        "openai" => {
            let key = keys
                .openai
                .as_deref()
                .ok_or(FactoryError::MissingApiKey("OpenAI"))?;
            let client = OpenAiClient::new(key, cfg.base_url.clone());
            Ok(Arc::new(OpenAiCompletion::new(client, model)))
        }
        "anthropic" => {
            let key = keys
                .anthropic
                .as_deref()
                .ok_or(FactoryError::MissingApiKey("Anthropic"))?;
            Ok(Arc::new(AnthropicCompletion::new(
                key,
                model,
                cfg.base_url.clone(),
            )))
        }
        "ollama" => Ok(Arc::new(OllamaCompletion::new(model, cfg.base_url.clone()))),
        "voyage" => Err(FactoryError::UnsupportedCapability {
            provider: "voyage",
            capability: "a completion API",
        }),
        _ => Err(FactoryError::UnknownProvider {
            kind: "completion",
            name: cfg.provider.clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm(provider: &str, model: &str) -> LlmConfig {
        LlmConfig {
            provider: provider.to_string(),
            model: model.to_string(),
            base_url: None,
        }
    }

    fn keys_with_all() -> LoadedKeys {
        LoadedKeys {
            openai: Some("sk-openai".into()),
            anthropic: Some("sk-ant".into()),
            voyage: Some("sk-voyage".into()),
        }
    }

    #[test]
    fn test_embedding_providers_constructed() {
        let keys = keys_with_all();
        for provider in ["openai", "voyage", "ollama"] {
            let cfg = llm(provider, "some-model");
            let p = new_embedding_provider(&cfg, &keys).unwrap();
            assert_eq!(p.model_name(), "some-model");
        }
    }

    #[test]
    fn test_completion_providers_constructed() {
        let keys = keys_with_all();
        for provider in ["openai", "anthropic", "ollama"] {
            let cfg = llm(provider, "some-model");
            let p = new_completion_provider(&cfg, &keys).unwrap();
            assert_eq!(p.model_name(), "some-model");
        }
    }

    #[test]
    fn test_case_insensitive_provider_names() {
        let keys = keys_with_all();
        assert!(new_completion_provider(&llm("Anthropic", "m"), &keys).is_ok());
        assert!(new_embedding_provider(&llm("OpenAI", "m"), &keys).is_ok());
    }

    #[test]
    fn test_anthropic_cannot_embed() {
        let err = new_embedding_provider(&llm("anthropic", "m"), &keys_with_all()).err().unwrap();
        assert!(matches!(err, FactoryError::UnsupportedCapability { .. }));
    }

    #[test]
    fn test_voyage_cannot_complete() {
        let err = new_completion_provider(&llm("voyage", "m"), &keys_with_all()).err().unwrap();
        assert!(matches!(err, FactoryError::UnsupportedCapability { .. }));
    }

    #[test]
    fn test_missing_key_rejected() {
        let keys = LoadedKeys::default();
        let err = new_embedding_provider(&llm("openai", "m"), &keys).err().unwrap();
        assert!(matches!(err, FactoryError::MissingApiKey("OpenAI")));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let keys = LoadedKeys::default();
        assert!(new_embedding_provider(&llm("ollama", "m"), &keys).is_ok());
        assert!(new_completion_provider(&llm("ollama", "m"), &keys).is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = new_embedding_provider(&llm("cohere", "m"), &keys_with_all()).err().unwrap();
        assert!(matches!(err, FactoryError::UnknownProvider { .. }));
    }
}
