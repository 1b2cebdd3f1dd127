//! Reciprocal Rank Fusion of vector and BM25 rankings.

use std::collections::HashMap;

use crate::db::SearchResult;

/// Default `k` constant for RRF. 60 is the value commonly used in practice.
pub const DEFAULT_RRF_K: f64 = 60.0;

/// A result after RRF fusion, with the contributing ranks retained.
#[derive(Debug, Clone)]
pub struct RrfResult {
    pub id: Option<String>,
    pub content: String,
    pub score: f64,
    /// 1-indexed rank in the vector results, 0 if absent.
    pub vec_rank: usize,
    /// 1-indexed rank in the BM25 results, 0 if absent.
    pub bm25_rank: usize,
}

fn fusion_key(result: &SearchResult) -> String {
    match &result.id {
        Some(id) if !id.is_empty() => id.clone(),
        _ => result.content.clone(),
    }
}

/// Combine vector and BM25 rankings with Reciprocal Rank Fusion:
///
/// ```text
/// score(d) = Σ 1 / (k + rank_i(d))     rank 1-indexed
/// ```
///
/// Documents are keyed by id when present, otherwise by content. Output is
/// sorted by combined score descending; equal scores keep first-seen order.
pub fn reciprocal_rank_fusion(
    vector_results: &[SearchResult],
    bm25_results: &[SearchResult],
    k: f64,
) -> Vec<RrfResult> {
    let k = if k <= 0.0 { DEFAULT_RRF_K } else { k };

    // First-seen order is preserved so ties stay deterministic.
    let mut order: Vec<RrfResult> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (i, r) in vector_results.iter().enumerate() {
        let rank = i + 1;
        let key = fusion_key(r);
        match index.get(&key) {
            Some(&pos) => {
                order[pos].score += 1.0 / (k + rank as f64);
                order[pos].vec_rank = rank;
            }
            None => {
                index.insert(key, order.len());
                order.push(RrfResult {
                    id: r.id.clone(),
                    content: r.content.clone(),
                    score: 1.0 / (k + rank as f64),
                    vec_rank: rank,
                    bm25_rank: 0,
                });
            }
        }
    }

    for (i, r) in bm25_results.iter().enumerate() {
        let rank = i + 1;
        let key = fusion_key(r);
        match index.get(&key) {
            Some(&pos) => {
                order[pos].score += 1.0 / (k + rank as f64);
                order[pos].bm25_rank = rank;
            }
            None => {
                index.insert(key, order.len());
                order.push(RrfResult {
                    id: r.id.clone(),
                    content: r.content.clone(),
                    score: 1.0 / (k + rank as f64),
                    vec_rank: 0,
                    bm25_rank: rank,
                });
            }
        }
    }

    order.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    order
}

/// Fuse two rankings with the default constant and keep the top `top_n`.
pub fn hybrid_search(
    vector_results: &[SearchResult],
    bm25_results: &[SearchResult],
    top_n: usize,
) -> Vec<SearchResult> {
    reciprocal_rank_fusion(vector_results, bm25_results, DEFAULT_RRF_K)
        .into_iter()
        .take(top_n)
        .map(|r| SearchResult {
            id: r.id,
            content: r.content,
            score: r.score,
        })
        .collect()
}
