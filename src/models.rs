//! Core data types used throughout Podsearch.
//!
//! These types represent the episodes, vectors, and search results that flow
//! through the ingestion and retrieval pipeline.

use serde::Serialize;

/// A podcast episode row joined with its parent podcast, as read from the
/// relational store. Text fields are never NULL here: missing values are
/// defaulted to empty strings at query time.
#[derive(Debug, Clone)]
pub struct EpisodeRecord {
    pub episode_id: i64,
    pub podcast_id: i64,
    pub podcast_name: String,
    pub podcast_author: String,
    pub podcast_categories: Vec<String>,
    pub title: String,
    pub description: String,
}

/// Selects which podcasts to ingest episodes for.
///
/// The upstream catalog identifies a podcast by one of three identifiers;
/// the caller states which one it has instead of the store probing for it.
#[derive(Debug, Clone)]
pub enum PodcastSelector {
    ByFeedIds(Vec<i64>),
    ByGuid(String),
    ByItunesId(i64),
}

/// A sparse lexical vector: parallel arrays of term indices and weights.
///
/// Indices are strictly increasing and unique; weights are non-zero only for
/// terms present in the source text.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// The payload stored alongside each point in the vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct PointPayload {
    pub podcast_id: i64,
    pub episode_id: i64,
    pub title: String,
    pub podcast_name: String,
    pub podcast_author: String,
    pub podcast_categories: Vec<String>,
    /// The canonical multi-line document the vectors were computed from.
    pub document: String,
}

/// A vector index record: stable id, both vector representations, payload.
///
/// The id derives from the episode id so that re-ingesting an episode
/// overwrites its point instead of duplicating it.
#[derive(Debug, Clone)]
pub struct IndexPoint {
    pub id: u64,
    pub dense: Vec<f32>,
    pub sparse: SparseVector,
    pub payload: PointPayload,
}

/// A single hybrid search result, hydrated from the stored payload.
#[derive(Debug, Clone, Serialize)]
pub struct HybridSearchResult {
    pub podcast_id: i64,
    pub episode_id: i64,
    pub episode_title: String,
    pub podcast_title: String,
    pub podcast_author: String,
    pub podcast_categories: Vec<String>,
    pub similarity_score: f32,
}
