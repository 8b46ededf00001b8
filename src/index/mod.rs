//! Vector index abstraction.
//!
//! The [`VectorIndex`] trait is the narrow boundary the engine and the
//! ingestion pipeline depend on: existence checks, collection lifecycle,
//! durability-acknowledged upsert, and batched candidate retrieval. The
//! persistence format and on-disk layout are the index's concern.
//!
//! Two implementations ship:
//!
//! | Implementation | Purpose |
//! |----------------|---------|
//! | [`qdrant::QdrantIndex`] | Production backend over the Qdrant query API |
//! | [`memory::MemoryIndex`] | Exact in-memory backend for tests and offline development |

pub mod memory;
pub mod qdrant;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexPoint, PointPayload, SparseVector};

/// The query side of one candidate retrieval request.
#[derive(Debug, Clone)]
pub enum QueryVector {
    /// Ranked against the named dense vector field.
    Dense {
        vector_name: String,
        vector: Vec<f32>,
    },
    /// Ranked against the sparse lexical field.
    Sparse { vector: SparseVector },
}

/// One independently-ranked retrieval pass against a single vector field.
///
/// Several of these run per search; their ranked lists are fused afterwards.
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    pub query: QueryVector,
    /// Size of this request's candidate pool.
    pub limit: usize,
    /// Any-of full-text condition on the stored canonical document: only
    /// points whose indexed terms intersect these tokens are ranked.
    pub keyword_filter: Option<Vec<String>>,
}

/// A scored candidate from one retrieval pass.
#[derive(Debug, Clone)]
pub struct ScoredHit {
    pub id: u64,
    pub score: f32,
    pub payload: PointPayload,
}

/// Abstract vector index backend.
///
/// Implementations must be `Send + Sync`; all operations are async.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Whether the named collection exists.
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Create a collection with a cosine-distance dense vector field of the
    /// given dimensionality plus the sparse lexical field. Dimensionality
    /// and distance are fixed at creation; recreating with different
    /// settings requires an explicit delete first.
    async fn create_collection(&self, name: &str, dense_dim: usize) -> Result<()>;

    /// Drop a collection and all its points.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Upsert points, waiting for the write to be acknowledged. Points with
    /// an existing id are overwritten, not duplicated.
    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()>;

    /// Execute all candidate requests as one batch using exact
    /// (non-approximate) search.
    ///
    /// Returns exactly one ranked list per request, in request order. A
    /// response missing a list is an error — never an empty list standing
    /// in for a failed retrieval pass.
    async fn retrieve_candidates(
        &self,
        name: &str,
        requests: &[CandidateRequest],
    ) -> Result<Vec<Vec<ScoredHit>>>;
}
