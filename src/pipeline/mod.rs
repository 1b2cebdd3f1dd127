//! RAG pipeline execution and lifecycle management.

pub mod manager;
pub mod orchestrator;

pub use manager::{Manager, ManagerError, Pipeline};
pub use orchestrator::{Orchestrator, OrchestratorConfig, PipelineError};

use serde::{Deserialize, Serialize};

use crate::config::Filter;

/// Default context token budget when neither the pipeline nor the global
/// defaults set one.
pub const DEFAULT_TOKEN_BUDGET: usize = 4000;

/// Default result count when neither the pipeline nor the global defaults
/// set one.
pub const DEFAULT_TOP_N: usize = 5;

/// Basic pipeline information for listing.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Info {
    pub name: String,
    pub description: String,
}

/// A message in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// A RAG query request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub stream: bool,
    /// Override the pipeline's default top-N result count.
    #[serde(default)]
    pub top_n: Option<usize>,
    /// Include source documents in the response (default: false).
    #[serde(default)]
    pub include_sources: bool,
    /// Additional structured WHERE conditions for this query.
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Previous conversation turns.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// A non-streaming RAG query response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    pub tokens_used: usize,
}

/// A source document used in the RAG response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub score: f64,
}

/// A streaming response event as it appears on the wire.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    Chunk {
        #[serde(skip_serializing_if = "String::is_empty")]
        content: String,
    },
    Done,
    Error {
        error: String,
    },
}
