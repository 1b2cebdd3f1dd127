//! Okapi BM25 scoring over an in-memory, per-request index.
//!
//! The index is built fresh for every query from the documents fetched out
//! of the pipeline's table source and discarded afterwards; it is never
//! shared across requests.

use std::collections::HashMap;

use super::tokenizer::Tokenizer;

/// Default term frequency saturation parameter.
pub const DEFAULT_K1: f64 = 1.2;

/// Default document length normalization parameter. 0 disables
/// normalization, 1 applies it fully.
pub const DEFAULT_B: f64 = 0.75;

/// The BM25 ranking function.
#[derive(Debug, Clone)]
pub struct Bm25 {
    pub k1: f64,
    pub b: f64,
    avg_doc_len: f64,
    doc_count: usize,
}

impl Default for Bm25 {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25 {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            avg_doc_len: 0.0,
            doc_count: 0,
        }
    }

    /// Set the corpus statistics needed for scoring.
    pub fn set_corpus_stats(&mut self, doc_count: usize, avg_doc_len: f64) {
        self.doc_count = doc_count;
        self.avg_doc_len = avg_doc_len;
    }

    /// Inverse document frequency, Lucene/Elasticsearch variant:
    ///
    /// ```text
    /// idf(t) = ln(1 + (N - df(t) + 0.5) / (df(t) + 0.5))
    /// ```
    ///
    /// Always non-negative, unlike the classic formula which goes negative
    /// for terms present in more than half the corpus.
    pub fn idf(&self, doc_freq: usize) -> f64 {
        if self.doc_count == 0 || doc_freq == 0 {
            return 0.0;
        }

        let n = self.doc_count as f64;
        let df = doc_freq as f64;

        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }

    /// BM25 score component for one term in one document.
    pub fn score(&self, tf: usize, doc_freq: usize, doc_len: usize) -> f64 {
        if tf == 0 || doc_freq == 0 || self.doc_count == 0 {
            return 0.0;
        }

        let idf = self.idf(doc_freq);
        let tf = tf as f64;

        let length_norm = 1.0 - self.b + self.b * (doc_len as f64 / self.avg_doc_len);
        let tf_score = (tf * (self.k1 + 1.0)) / (tf + self.k1 * length_norm);

        idf * tf_score
    }

    /// Total BM25 score for a document against a query term multiset.
    pub fn score_document(
        &self,
        query_terms: &HashMap<String, usize>,
        doc_term_freqs: &HashMap<String, usize>,
        doc_freqs: &HashMap<String, usize>,
        doc_len: usize,
    ) -> f64 {
        query_terms
            .keys()
            .map(|term| {
                let tf = doc_term_freqs.get(term).copied().unwrap_or(0);
                let df = doc_freqs.get(term).copied().unwrap_or(0);
                self.score(tf, df, doc_len)
            })
            .sum()
    }
}

/// An indexed document.
#[derive(Debug, Clone)]
pub struct Document {
    pub id: String,
    pub content: String,
    /// Number of tokens after normalization.
    pub length: usize,
    pub term_freqs: HashMap<String, usize>,
}

/// A BM25 search result.
#[derive(Debug, Clone, PartialEq)]
pub struct Bm25Result {
    pub id: String,
    pub content: String,
    pub score: f64,
}

/// An in-memory BM25 index. Documents are kept in insertion order so equal
/// scores rank deterministically.
#[derive(Debug)]
pub struct Index {
    tokenizer: Tokenizer,
    scorer: Bm25,
    docs: Vec<Document>,
    ids: HashMap<String, usize>,
    doc_freqs: HashMap<String, usize>,
    total_len: usize,
}

impl Default for Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Index {
    pub fn new() -> Self {
        Self::with_params(DEFAULT_K1, DEFAULT_B)
    }

    pub fn with_params(k1: f64, b: f64) -> Self {
        Self {
            tokenizer: Tokenizer::new(),
            scorer: Bm25::with_params(k1, b),
            docs: Vec::new(),
            ids: HashMap::new(),
            doc_freqs: HashMap::new(),
            total_len: 0,
        }
    }

    /// Add a document to the index.
    pub fn add_document(&mut self, id: impl Into<String>, content: impl Into<String>) {
        let id = id.into();
        let content = content.into();

        let term_freqs = self.tokenizer.token_frequencies(&content);
        let doc_len: usize = term_freqs.values().sum();

        for term in term_freqs.keys() {
            *self.doc_freqs.entry(term.clone()).or_insert(0) += 1;
        }

        self.total_len += doc_len;
        self.ids.insert(id.clone(), self.docs.len());
        self.docs.push(Document {
            id,
            content,
            length: doc_len,
            term_freqs,
        });

        self.update_scorer_stats();
    }

    /// Add multiple documents, preserving iteration order.
    pub fn add_documents<I, S, T>(&mut self, docs: I)
    where
        I: IntoIterator<Item = (S, T)>,
        S: Into<String>,
        T: Into<String>,
    {
        for (id, content) in docs {
            self.add_document(id, content);
        }
    }

    fn update_scorer_stats(&mut self) {
        let avg = if self.docs.is_empty() {
            0.0
        } else {
            self.total_len as f64 / self.docs.len() as f64
        };
        self.scorer.set_corpus_stats(self.docs.len(), avg);
    }

    /// Score every document against the query and return the top `top_n`.
    /// Documents scoring zero are omitted; ties keep insertion order.
    pub fn search(&self, query: &str, top_n: usize) -> Vec<Bm25Result> {
        if self.docs.is_empty() {
            return Vec::new();
        }

        let query_terms = self.tokenizer.token_frequencies(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = self
            .docs
            .iter()
            .enumerate()
            .filter_map(|(i, doc)| {
                let score = self.scorer.score_document(
                    &query_terms,
                    &doc.term_freqs,
                    &self.doc_freqs,
                    doc.length,
                );
                (score > 0.0).then_some((i, score))
            })
            .collect();

        // Stable sort: equal scores fall back to insertion order
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        scored
            .into_iter()
            .take(top_n)
            .map(|(i, score)| Bm25Result {
                id: self.docs[i].id.clone(),
                content: self.docs[i].content.clone(),
                score,
            })
            .collect()
    }

    /// Remove all documents from the index.
    pub fn clear(&mut self) {
        self.docs.clear();
        self.ids.clear();
        self.doc_freqs.clear();
        self.total_len = 0;
        self.scorer.set_corpus_stats(0, 0.0);
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Look up a document by id.
    pub fn get(&self, id: &str) -> Option<&Document> {
        self.ids.get(id).map(|&i| &self.docs[i])
    }
}
