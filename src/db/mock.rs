//! In-memory [`DocumentStore`] used by tests and local development.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::{Filter, TableSource};

use super::{DbError, DocumentStore, SearchResult};

/// A canned document store. Returns configured vector hits and a fixed
/// corpus regardless of the table source; can be told to fail either
/// operation to exercise the orchestrator's degradation paths.
#[derive(Default)]
pub struct MockDocumentStore {
    vector_results: Vec<SearchResult>,
    documents: Vec<(String, String)>,
    fail_vector_search: bool,
    fail_fetch: bool,
    /// Filters seen by `vector_search`, for assertions.
    pub seen_filters: Mutex<Vec<Option<Filter>>>,
}

impl MockDocumentStore {
    pub fn new(vector_results: Vec<SearchResult>, documents: Vec<(String, String)>) -> Self {
        Self {
            vector_results,
            documents,
            ..Default::default()
        }
    }

    /// A store with no vector hits and no documents.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn failing_vector_search(mut self) -> Self {
        self.fail_vector_search = true;
        self
    }

    pub fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }
}

#[async_trait]
impl DocumentStore for MockDocumentStore {
    async fn vector_search(
        &self,
        _embedding: &[f32],
        _table: &TableSource,
        top_n: usize,
        filter: Option<&Filter>,
    ) -> Result<Vec<SearchResult>, DbError> {
        self.seen_filters.lock().push(filter.cloned());
        if self.fail_vector_search {
            return Err(DbError::Other("mock vector search failure".to_string()));
        }
        Ok(self.vector_results.iter().take(top_n).cloned().collect())
    }

    async fn fetch_documents(
        &self,
        _table: &TableSource,
        _filter: Option<&Filter>,
    ) -> Result<Vec<(String, String)>, DbError> {
        if self.fail_fetch {
            return Err(DbError::Other("mock fetch failure".to_string()));
        }
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TableSource;

    fn table() -> TableSource {
        TableSource {
            table: "documents".into(),
            text_column: "content".into(),
            vector_column: "embedding".into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_mock_returns_configured_results() {
        let store = MockDocumentStore::new(
            vec![SearchResult {
                id: None,
                content: "alpha".into(),
                score: 0.9,
            }],
            vec![("doc1".into(), "alpha".into())],
        );

        let hits = store.vector_search(&[0.0], &table(), 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);

        let docs = store.fetch_documents(&table(), None).await.unwrap();
        assert_eq!(docs[0].0, "doc1");
    }

    #[tokio::test]
    async fn test_mock_failure_modes() {
        let store = MockDocumentStore::empty().failing_vector_search();
        assert!(store.vector_search(&[0.0], &table(), 10, None).await.is_err());

        let store = MockDocumentStore::empty().failing_fetch();
        assert!(store.fetch_documents(&table(), None).await.is_err());
    }

    #[tokio::test]
    async fn test_mock_records_filters() {
        let store = MockDocumentStore::empty();
        let _ = store.vector_search(&[0.0], &table(), 10, None).await;
        assert_eq!(store.seen_filters.lock().len(), 1);
    }
}
