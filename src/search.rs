//! Hybrid retrieval engine.
//!
//! A query fans out into several independently-ranked candidate requests
//! ("prefetches"), each against a single vector field, and the ranked lists
//! are merged with Reciprocal Rank Fusion. Rank-based fusion sidesteps the
//! fact that cosine similarities and BM25 scores live on incomparable
//! scales, while still rewarding candidates that several retrieval modes
//! agree on.
//!
//! The request set adapts to query length (whitespace-split token count):
//!
//! | Query | Candidate requests |
//! |-------|--------------------|
//! | ≤ 3 tokens | plain BM25 + keyword-filtered BM25 |
//! | > 3 tokens | dense + plain BM25 + keyword-filtered BM25 |
//!
//! Short keyword queries are dominated by exact term matches; a dense
//! embedding of one to three tokens is too noisy to help, so the dense
//! provider is not invoked at all for them.

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::config::RetrievalConfig;
use crate::document::title_from_document;
use crate::embedding::sparse::{tokenize, Bm25Embedder};
use crate::embedding::DenseEmbedder;
use crate::index::{CandidateRequest, QueryVector, ScoredHit, VectorIndex};
use crate::models::{HybridSearchResult, PointPayload};
use crate::text::normalize_arabic;

pub struct HybridSearchEngine {
    index: Arc<dyn VectorIndex>,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Bm25Embedder,
    collection: String,
    retrieval: RetrievalConfig,
}

impl HybridSearchEngine {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        dense: Arc<dyn DenseEmbedder>,
        collection: &str,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            index,
            dense,
            sparse: Bm25Embedder::default(),
            collection: collection.to_string(),
            retrieval,
        }
    }

    /// Run a hybrid search and return the fused top results.
    ///
    /// A blank query or a missing collection yields an empty result set,
    /// never an error: the read path stays usable against an unpopulated
    /// corpus. Embedding provider failures propagate to the caller.
    pub async fn search(&self, query: &str) -> Result<Vec<HybridSearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }

        if !self.index.collection_exists(&self.collection).await? {
            debug!(collection = %self.collection, "collection missing, returning empty result set");
            return Ok(Vec::new());
        }

        let normalized = normalize_arabic(query);
        let requests = self.build_requests(&normalized).await?;
        if requests.is_empty() {
            return Ok(Vec::new());
        }

        let lists = self
            .index
            .retrieve_candidates(&self.collection, &requests)
            .await?;

        let fused = fuse_rrf(&lists, self.retrieval.rrf_k);
        debug!(
            requests = requests.len(),
            candidates = fused.len(),
            "fused candidate lists"
        );

        Ok(fused
            .into_iter()
            .take(self.retrieval.final_limit)
            .map(hydrate)
            .collect())
    }

    /// Build the query-length-adaptive candidate request set.
    async fn build_requests(&self, normalized: &str) -> Result<Vec<CandidateRequest>> {
        let token_count = normalized.split_whitespace().count();
        let sparse_query = self.sparse.embed_query(normalized);
        let filter_tokens = tokenize(normalized);

        let mut requests = Vec::with_capacity(3);

        if token_count > self.retrieval.keyword_query_max_tokens {
            let dense_query = self.dense.embed_query(normalized).await?;
            requests.push(CandidateRequest {
                query: QueryVector::Dense {
                    vector_name: self.dense.vector_name().to_string(),
                    vector: dense_query,
                },
                limit: self.retrieval.dense_limit,
                keyword_filter: None,
            });
        }

        if !sparse_query.is_empty() {
            requests.push(CandidateRequest {
                query: QueryVector::Sparse {
                    vector: sparse_query.clone(),
                },
                limit: self.retrieval.sparse_limit,
                keyword_filter: None,
            });
            requests.push(CandidateRequest {
                query: QueryVector::Sparse {
                    vector: sparse_query,
                },
                limit: self.retrieval.sparse_limit,
                keyword_filter: Some(filter_tokens),
            });
        }

        Ok(requests)
    }
}

/// A candidate after fusion, before hydration.
#[derive(Debug, Clone)]
struct FusedCandidate {
    id: u64,
    score: f64,
    best_rank: usize,
    payload: PointPayload,
}

/// Merge ranked candidate lists with Reciprocal Rank Fusion.
///
/// Each candidate scores `Σ 1/(k + rank)` over the lists it appears in
/// (1-based rank). Sorted by fused score descending; ties broken by the
/// candidate's best single-list rank, then by id for determinism.
fn fuse_rrf(lists: &[Vec<ScoredHit>], k: f32) -> Vec<FusedCandidate> {
    let mut fused: HashMap<u64, FusedCandidate> = HashMap::new();

    for list in lists {
        for (idx, hit) in list.iter().enumerate() {
            let rank = idx + 1;
            let contribution = 1.0 / (k as f64 + rank as f64);

            let entry = fused.entry(hit.id).or_insert_with(|| FusedCandidate {
                id: hit.id,
                score: 0.0,
                best_rank: rank,
                payload: hit.payload.clone(),
            });
            entry.score += contribution;
            entry.best_rank = entry.best_rank.min(rank);
        }
    }

    let mut out: Vec<FusedCandidate> = fused.into_values().collect();
    out.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.best_rank.cmp(&b.best_rank))
            .then(a.id.cmp(&b.id))
    });
    out
}

/// Hydrate a fused candidate into a caller-facing result.
///
/// The episode title comes from the fixed line of the stored canonical
/// document; the explicit payload title is the fallback if the document is
/// somehow truncated.
fn hydrate(candidate: FusedCandidate) -> HybridSearchResult {
    let payload = candidate.payload;
    let mut episode_title = title_from_document(&payload.document).to_string();
    if episode_title.is_empty() {
        episode_title = payload.title;
    }

    HybridSearchResult {
        podcast_id: payload.podcast_id,
        episode_id: payload.episode_id,
        episode_title,
        podcast_title: payload.podcast_name,
        podcast_author: payload.podcast_author,
        podcast_categories: payload.podcast_categories,
        similarity_score: candidate.score as f32,
    }
}
