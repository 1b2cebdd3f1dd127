//! PostgreSQL connectivity, vector similarity search, and the
//! parameterized filter compiler.
//!
//! The [`DocumentStore`] trait abstracts the retrieval operations the
//! orchestrator needs, so pipelines can run against the real
//! [`Pool`] or the in-memory [`mock::MockDocumentStore`] in tests.

pub mod filter;
pub mod mock;
mod pool;

pub use filter::{build_filter_clause, validate_filter, FilterError};
pub use pool::{format_vector, Pool};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{Filter, TableSource};

/// Errors produced by the database gateway.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),
    #[error("database query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("{0}")]
    Other(String),
}

/// A single search result. The score is opaque: comparable within one pass
/// from one source, replaced by an RRF score after fusion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub content: String,
    pub score: f64,
}

/// Retrieval operations required by the RAG orchestrator.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Vector similarity search over a table source, ordered by cosine
    /// similarity descending.
    async fn vector_search(
        &self,
        embedding: &[f32],
        table: &TableSource,
        top_n: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchResult>, DbError>;

    /// Fetch `(id, content)` pairs for BM25 indexing, in row order.
    async fn fetch_documents(
        &self,
        table: &TableSource,
        filter: Option<&Filter>,
    ) -> Result<Vec<(String, String)>, DbError>;
}

/// Quote a single identifier for safe interpolation. Dots are part of the
/// name, not schema separators.
pub(crate) fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a table reference, splitting `schema.table` on dots.
pub(crate) fn quote_table(table: &str) -> String {
    table
        .split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}
