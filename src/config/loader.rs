//! Configuration file discovery, parsing, and the defaults cascade.

use std::path::{Path, PathBuf};

use super::{Config, ValidationErrors};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "pgedge-rag-server.yaml";

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/pgedge/pgedge-rag-server.yaml";

/// Errors produced while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(String),
    #[error("no configuration file found; searched: {0:?}")]
    NoConfigFile(Vec<String>),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Load the configuration from `path`, or search default locations when
/// `path` is `None`.
///
/// Search order:
/// 1. Explicit path (if provided)
/// 2. `/etc/pgedge/pgedge-rag-server.yaml`
/// 3. `pgedge-rag-server.yaml` in the binary's directory
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = find_config_file(path)?;
    load_from_file(&config_path)
}

fn find_config_file(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        return Ok(path.to_path_buf());
    }

    let mut searched = vec![PathBuf::from(SYSTEM_CONFIG_PATH)];
    if let Some(p) = binary_dir_config_path() {
        searched.push(p);
    }

    for candidate in &searched {
        if candidate.exists() {
            return Ok(candidate.clone());
        }
    }

    Err(ConfigError::NoConfigFile(
        searched
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
    ))
}

fn binary_dir_config_path() -> Option<PathBuf> {
    let executable = std::env::current_exe().ok()?;
    // Resolve symlinks to get the actual binary location
    let executable = std::fs::canonicalize(executable).ok()?;
    Some(executable.parent()?.join(CONFIG_FILE_NAME))
}

fn load_from_file(path: &Path) -> Result<Config, ConfigError> {
    let data = std::fs::read_to_string(path)?;

    let mut cfg: Config = serde_yaml::from_str(&data)?;
    apply_defaults(&mut cfg);
    cfg.validate()?;

    Ok(cfg)
}

/// Resolve the pipeline > defaults > global cascade in place. Runs once at
/// load time; pipelines are never re-resolved afterwards.
pub(crate) fn apply_defaults(cfg: &mut Config) {
    let defaults = cfg.defaults.clone();
    let global_keys = cfg.api_keys.clone();

    for p in &mut cfg.pipelines {
        if p.token_budget.is_none() {
            p.token_budget = defaults.token_budget;
        }
        if p.top_n.is_none() {
            p.top_n = defaults.top_n;
        }

        if p.embedding_llm.provider.is_empty() {
            p.embedding_llm.provider = defaults.embedding_llm.provider.clone();
        }
        if p.embedding_llm.model.is_empty() {
            p.embedding_llm.model = defaults.embedding_llm.model.clone();
        }
        if p.embedding_llm.base_url.is_none() {
            p.embedding_llm.base_url = defaults.embedding_llm.base_url.clone();
        }

        if p.rag_llm.provider.is_empty() {
            p.rag_llm.provider = defaults.rag_llm.provider.clone();
        }
        if p.rag_llm.model.is_empty() {
            p.rag_llm.model = defaults.rag_llm.model.clone();
        }
        if p.rag_llm.base_url.is_none() {
            p.rag_llm.base_url = defaults.rag_llm.base_url.clone();
        }

        // API key paths cascade: pipeline -> defaults -> global
        if p.api_keys.anthropic.is_empty() {
            p.api_keys.anthropic = if !defaults.api_keys.anthropic.is_empty() {
                defaults.api_keys.anthropic.clone()
            } else {
                global_keys.anthropic.clone()
            };
        }
        if p.api_keys.openai.is_empty() {
            p.api_keys.openai = if !defaults.api_keys.openai.is_empty() {
                defaults.api_keys.openai.clone()
            } else {
                global_keys.openai.clone()
            };
        }
        if p.api_keys.voyage.is_empty() {
            p.api_keys.voyage = if !defaults.api_keys.voyage.is_empty() {
                defaults.api_keys.voyage.clone()
            } else {
                global_keys.voyage.clone()
            };
        }

        if p.database.port == 0 {
            p.database.port = 5432;
        }
        if p.database.ssl_mode.is_empty() {
            p.database.ssl_mode = "prefer".to_string();
        }
    }
}
