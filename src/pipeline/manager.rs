//! Pipeline lifecycle: construction from validated configuration, lookup,
//! and teardown.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{ApiKeyError, ApiKeyLoader, Config, PipelineConfig};
use crate::db::{DbError, DocumentStore, Pool};
use crate::llm::factory::{self, FactoryError};

use super::{
    Info, Orchestrator, OrchestratorConfig, PipelineError, QueryRequest, QueryResponse,
    StreamEvent, DEFAULT_TOKEN_BUDGET, DEFAULT_TOP_N,
};

/// Errors from pipeline construction.
#[derive(Debug, thiserror::Error)]
pub enum ManagerError {
    #[error("failed to load API keys for pipeline {name}: {source}")]
    ApiKeys {
        name: String,
        #[source]
        source: ApiKeyError,
    },
    #[error("failed to connect to database for pipeline {name}: {source}")]
    Database {
        name: String,
        #[source]
        source: DbError,
    },
    #[error("failed to create provider for pipeline {name}: {source}")]
    Provider {
        name: String,
        #[source]
        source: FactoryError,
    },
}

/// A configured RAG pipeline with its providers initialized.
pub struct Pipeline {
    name: String,
    description: String,
    pool: Option<Pool>,
    orchestrator: Orchestrator,
}

impl Pipeline {
    /// Assemble a pipeline from parts. This is the dependency injection
    /// seam: production pipelines come out of [`Manager::new`], tests
    /// build them over mock stores and providers.
    pub fn from_parts(
        name: impl Into<String>,
        description: impl Into<String>,
        orchestrator: Orchestrator,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            pool: None,
            orchestrator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Run a RAG query.
    pub async fn execute(&self, req: QueryRequest) -> Result<QueryResponse, PipelineError> {
        self.orchestrator.execute(req).await
    }

    /// Run a streaming RAG query.
    pub async fn execute_stream(
        &self,
        req: QueryRequest,
    ) -> Result<
        std::pin::Pin<Box<dyn futures_util::Stream<Item = StreamEvent> + Send>>,
        PipelineError,
    > {
        self.orchestrator.execute_stream(req).await
    }

    /// Release the pipeline's connection pool.
    pub async fn close(&self) {
        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

/// Owns every pipeline. Lookups take a shared lock; construction and
/// teardown take the exclusive one.
pub struct Manager {
    pipelines: RwLock<HashMap<String, Arc<Pipeline>>>,
}

impl Manager {
    /// Build all pipelines from a validated configuration. If any pipeline
    /// fails, previously constructed pipelines are torn down before the
    /// error is returned.
    pub async fn new(cfg: &Config) -> Result<Self, ManagerError> {
        let mut pipelines: HashMap<String, Arc<Pipeline>> = HashMap::new();

        for p_cfg in &cfg.pipelines {
            match create_pipeline(p_cfg).await {
                Ok(p) => {
                    tracing::info!(
                        name = %p_cfg.name,
                        embedding_provider = %p_cfg.embedding_llm.provider,
                        completion_provider = %p_cfg.rag_llm.provider,
                        "pipeline created"
                    );
                    pipelines.insert(p_cfg.name.clone(), Arc::new(p));
                }
                Err(e) => {
                    for existing in pipelines.values() {
                        existing.close().await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(Self {
            pipelines: RwLock::new(pipelines),
        })
    }

    /// Build a manager over pre-assembled pipelines (tests, embedding the
    /// server in another binary).
    pub fn from_pipelines(pipelines: Vec<Pipeline>) -> Self {
        let map = pipelines
            .into_iter()
            .map(|p| (p.name.clone(), Arc::new(p)))
            .collect();
        Self {
            pipelines: RwLock::new(map),
        }
    }

    /// Information about all available pipelines, sorted by name.
    pub fn list(&self) -> Vec<Info> {
        let mut infos: Vec<Info> = self
            .pipelines
            .read()
            .values()
            .map(|p| Info {
                name: p.name.clone(),
                description: p.description.clone(),
            })
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    /// Look up a pipeline by name.
    pub fn get(&self, name: &str) -> Option<Arc<Pipeline>> {
        self.pipelines.read().get(name).cloned()
    }

    /// Tear down every pipeline. Idempotent.
    pub async fn close(&self) {
        let drained: Vec<Arc<Pipeline>> = {
            let mut map = self.pipelines.write();
            map.drain().map(|(_, p)| p).collect()
        };
        for p in drained {
            p.close().await;
        }
    }
}

async fn create_pipeline(p_cfg: &PipelineConfig) -> Result<Pipeline, ManagerError> {
    // Key paths were already cascaded at config load
    let keys = ApiKeyLoader::new(p_cfg.api_keys.clone())
        .load_for_pipeline(p_cfg)
        .map_err(|source| ManagerError::ApiKeys {
            name: p_cfg.name.clone(),
            source,
        })?;

    let pool = Pool::connect(&p_cfg.database)
        .await
        .map_err(|source| ManagerError::Database {
            name: p_cfg.name.clone(),
            source,
        })?;

    let embedder = factory::new_embedding_provider(&p_cfg.embedding_llm, &keys).map_err(
        |source| ManagerError::Provider {
            name: p_cfg.name.clone(),
            source,
        },
    )?;

    let completer = factory::new_completion_provider(&p_cfg.rag_llm, &keys).map_err(|source| {
        ManagerError::Provider {
            name: p_cfg.name.clone(),
            source,
        }
    })?;

    let store: Arc<dyn DocumentStore> = Arc::new(pool.clone());

    let orchestrator = Orchestrator::new(OrchestratorConfig {
        tables: p_cfg.tables.clone(),
        store,
        embedder,
        completer,
        token_budget: p_cfg.token_budget.unwrap_or(DEFAULT_TOKEN_BUDGET),
        top_n: p_cfg.top_n.unwrap_or(DEFAULT_TOP_N),
        hybrid_enabled: p_cfg.search.hybrid_enabled(),
        vector_weight: p_cfg.search.vector_weight,
        system_prompt: p_cfg.system_prompt.clone(),
    });

    Ok(Pipeline {
        name: p_cfg.name.clone(),
        description: p_cfg.description.clone(),
        pool: Some(pool),
        orchestrator,
    })
}
