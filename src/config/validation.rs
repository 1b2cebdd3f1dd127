//! Configuration validation. All problems are collected and reported
//! together rather than failing on the first one.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use super::{Config, DatabaseConfig, LlmConfig, PipelineConfig, TableSource};

const EMBEDDING_PROVIDERS: &[&str] = &["openai", "voyage", "ollama"];
const COMPLETION_PROVIDERS: &[&str] = &["anthropic", "openai", "ollama"];

const VALID_SSL_MODES: &[&str] = &[
    "disable",
    "allow",
    "prefer",
    "require",
    "verify-ca",
    "verify-full",
];

/// A single configuration validation error.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// A collection of validation errors.
#[derive(Debug, Clone, Default)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

impl std::error::Error for ValidationErrors {}

impl ValidationErrors {
    fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.push(ValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Expand a leading `~/` to the user's home directory.
pub(crate) fn expand_path(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

impl Config {
    /// Check the configuration and return all validation errors found.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errs = ValidationErrors::default();

        self.validate_server(&mut errs);
        self.validate_defaults(&mut errs);
        self.validate_pipelines(&mut errs);

        if errs.is_empty() {
            Ok(())
        } else {
            Err(errs)
        }
    }

    fn validate_server(&self, errs: &mut ValidationErrors) {
        if self.server.port == 0 {
            errs.push("server.port", "must be between 1 and 65535");
        }

        if self.server.tls.enabled {
            if self.server.tls.cert_file.is_empty() {
                errs.push("server.tls.cert_file", "required when TLS is enabled");
            } else if !expand_path(&self.server.tls.cert_file).exists() {
                errs.push(
                    "server.tls.cert_file",
                    format!("file not found: {}", self.server.tls.cert_file),
                );
            }

            if self.server.tls.key_file.is_empty() {
                errs.push("server.tls.key_file", "required when TLS is enabled");
            } else if !expand_path(&self.server.tls.key_file).exists() {
                errs.push(
                    "server.tls.key_file",
                    format!("file not found: {}", self.server.tls.key_file),
                );
            }
        }
    }

    fn validate_defaults(&self, errs: &mut ValidationErrors) {
        if !self.defaults.embedding_llm.provider.is_empty() {
            validate_llm_optional(
                "defaults.embedding_llm",
                &self.defaults.embedding_llm,
                EMBEDDING_PROVIDERS,
                errs,
            );
        }
        if !self.defaults.rag_llm.provider.is_empty() {
            validate_llm_optional(
                "defaults.rag_llm",
                &self.defaults.rag_llm,
                COMPLETION_PROVIDERS,
                errs,
            );
        }
    }

    fn validate_pipelines(&self, errs: &mut ValidationErrors) {
        if self.pipelines.is_empty() {
            errs.push("pipelines", "at least one pipeline must be configured");
            return;
        }

        let mut names = HashSet::new();
        for (i, p) in self.pipelines.iter().enumerate() {
            if !names.insert(p.name.clone()) {
                errs.push(
                    format!("pipelines[{i}].name"),
                    format!("duplicate pipeline name: {}", p.name),
                );
            }
            validate_pipeline(i, p, errs);
        }
    }
}

fn validate_pipeline(index: usize, p: &PipelineConfig, errs: &mut ValidationErrors) {
    let prefix = format!("pipelines[{index}]");

    if p.name.is_empty() {
        errs.push(format!("{prefix}.name"), "required");
    }

    validate_database(&format!("{prefix}.database"), &p.database, errs);

    if p.tables.is_empty() {
        errs.push(
            format!("{prefix}.tables"),
            "at least one table must be configured",
        );
    } else {
        for (j, ts) in p.tables.iter().enumerate() {
            validate_table(&format!("{prefix}.tables[{j}]"), ts, errs);
        }
    }

    validate_llm(
        &format!("{prefix}.embedding_llm"),
        &p.embedding_llm,
        EMBEDDING_PROVIDERS,
        errs,
    );
    validate_llm(
        &format!("{prefix}.rag_llm"),
        &p.rag_llm,
        COMPLETION_PROVIDERS,
        errs,
    );

    if let Some(w) = p.search.vector_weight {
        if !(0.0..=1.0).contains(&w) {
            errs.push(
                format!("{prefix}.search.vector_weight"),
                "must be between 0.0 and 1.0",
            );
        }
    }
}

fn validate_database(prefix: &str, db: &DatabaseConfig, errs: &mut ValidationErrors) {
    if db.host.is_empty() {
        errs.push(format!("{prefix}.host"), "required");
    }
    if db.database.is_empty() {
        errs.push(format!("{prefix}.database"), "required");
    }
    if db.port == 0 {
        errs.push(format!("{prefix}.port"), "must be between 1 and 65535");
    }
    if !db.ssl_mode.is_empty() && !VALID_SSL_MODES.contains(&db.ssl_mode.as_str()) {
        errs.push(
            format!("{prefix}.ssl_mode"),
            "must be one of: disable, allow, prefer, require, verify-ca, verify-full",
        );
    }
}

fn validate_table(prefix: &str, ts: &TableSource, errs: &mut ValidationErrors) {
    if ts.table.is_empty() {
        errs.push(format!("{prefix}.table"), "required");
    }
    if ts.text_column.is_empty() {
        errs.push(format!("{prefix}.text_column"), "required");
    }
    if ts.vector_column.is_empty() {
        errs.push(format!("{prefix}.vector_column"), "required");
    }
}

fn validate_llm(
    prefix: &str,
    llm: &LlmConfig,
    valid_providers: &[&str],
    errs: &mut ValidationErrors,
) {
    if llm.provider.is_empty() {
        errs.push(format!("{prefix}.provider"), "required");
    } else if !valid_providers.contains(&llm.provider.to_lowercase().as_str()) {
        errs.push(
            format!("{prefix}.provider"),
            format!("must be one of: {}", valid_providers.join(", ")),
        );
    }

    if llm.model.is_empty() {
        errs.push(format!("{prefix}.model"), "required");
    }
}

fn validate_llm_optional(
    prefix: &str,
    llm: &LlmConfig,
    valid_providers: &[&str],
    errs: &mut ValidationErrors,
) {
    if !valid_providers.contains(&llm.provider.to_lowercase().as_str()) {
        errs.push(
            format!("{prefix}.provider"),
            format!("must be one of: {}", valid_providers.join(", ")),
        );
    }
    if llm.model.is_empty() {
        errs.push(format!("{prefix}.model"), "required when provider is set");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::apply_defaults;

    fn valid_config() -> Config {
        let yaml = r#"
server:
  listen_address: 127.0.0.1
  port: 8080
pipelines:
  - name: docs
    database:
      host: localhost
      database: docs_db
    tables:
      - table: documents
        text_column: content
        vector_column: embedding
    embedding_llm:
      provider: openai
      model: text-embedding-3-small
    rag_llm:
      provider: anthropic
      model: claude-sonnet-4-20250514
"#;
        let mut cfg: Config = serde_yaml::from_str(yaml).unwrap();
        apply_defaults(&mut cfg);
        cfg
    }

    #[test]
    fn test_valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_no_pipelines_rejected() {
        let cfg = Config::default();
        let errs = cfg.validate().unwrap_err();
        assert!(errs.0.iter().any(|e| e.field == "pipelines"));
    }

    #[test]
    fn test_duplicate_pipeline_names_rejected() {
        let mut cfg = valid_config();
        let dup = cfg.pipelines[0].clone();
        cfg.pipelines.push(dup);
        let errs = cfg.validate().unwrap_err();
        assert!(errs
            .0
            .iter()
            .any(|e| e.message.contains("duplicate pipeline name")));
    }

    #[test]
    fn test_invalid_embedding_provider_rejected() {
        let mut cfg = valid_config();
        cfg.pipelines[0].embedding_llm.provider = "anthropic".into();
        let errs = cfg.validate().unwrap_err();
        assert!(errs
            .0
            .iter()
            .any(|e| e.field.contains("embedding_llm.provider")));
    }

    #[test]
    fn test_invalid_completion_provider_rejected() {
        let mut cfg = valid_config();
        cfg.pipelines[0].rag_llm.provider = "voyage".into();
        let errs = cfg.validate().unwrap_err();
        assert!(errs.0.iter().any(|e| e.field.contains("rag_llm.provider")));
    }

    #[test]
    fn test_vector_weight_out_of_range_rejected() {
        let mut cfg = valid_config();
        cfg.pipelines[0].search.vector_weight = Some(1.5);
        let errs = cfg.validate().unwrap_err();
        assert!(errs
            .0
            .iter()
            .any(|e| e.field.contains("search.vector_weight")));
    }

    #[test]
    fn test_invalid_ssl_mode_rejected() {
        let mut cfg = valid_config();
        cfg.pipelines[0].database.ssl_mode = "sometimes".into();
        let errs = cfg.validate().unwrap_err();
        assert!(errs.0.iter().any(|e| e.field.contains("ssl_mode")));
    }

    #[test]
    fn test_missing_table_columns_rejected() {
        let mut cfg = valid_config();
        cfg.pipelines[0].tables[0].vector_column = String::new();
        let errs = cfg.validate().unwrap_err();
        assert!(errs.0.iter().any(|e| e.field.contains("vector_column")));
    }

    #[test]
    fn test_tls_enabled_without_files_rejected() {
        let mut cfg = valid_config();
        cfg.server.tls.enabled = true;
        let errs = cfg.validate().unwrap_err();
        assert!(errs.0.iter().any(|e| e.field == "server.tls.cert_file"));
        assert!(errs.0.iter().any(|e| e.field == "server.tls.key_file"));
    }

    #[test]
    fn test_expand_path_home() {
        let expanded = expand_path("~/.openai-api-key");
        assert!(!expanded.to_string_lossy().starts_with("~"));
    }
}
