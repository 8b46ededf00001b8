//! Ingestion pipeline orchestration.
//!
//! Coordinates the flow from relational episode rows to indexed vector
//! points: load → canonical document → dense + sparse embedding → batched
//! upsert. Point ids derive from episode ids, so re-running an ingest
//! overwrites points instead of duplicating them, and a partially failed
//! run can simply be retried.

use anyhow::{bail, Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::db::EpisodeStore;
use crate::document::build_document;
use crate::embedding::sparse::Bm25Embedder;
use crate::embedding::DenseEmbedder;
use crate::index::VectorIndex;
use crate::models::{IndexPoint, PodcastSelector, PointPayload};

pub struct IngestPipeline {
    store: EpisodeStore,
    index: Arc<dyn VectorIndex>,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Bm25Embedder,
    collection: String,
    batch_size: usize,
}

impl IngestPipeline {
    pub fn new(
        store: EpisodeStore,
        index: Arc<dyn VectorIndex>,
        dense: Arc<dyn DenseEmbedder>,
        collection: &str,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            index,
            dense,
            sparse: Bm25Embedder::default(),
            collection: collection.to_string(),
            batch_size: batch_size.max(1),
        }
    }

    /// Ingest the given episodes into the vector index.
    ///
    /// Returns the number of points written. The collection is created on
    /// first use with the active provider's dimensionality; batches are
    /// upserted sequentially, each waiting for the index's acknowledgment,
    /// so a failure leaves a clean prefix of fully written batches behind.
    pub async fn ingest(&self, episode_ids: &[i64]) -> Result<u64> {
        let records = self.store.episodes_by_ids(episode_ids).await?;
        if records.is_empty() {
            info!("no matching episodes to ingest");
            return Ok(0);
        }
        info!(episodes = records.len(), "loaded episodes from relational store");

        if !self.index.collection_exists(&self.collection).await? {
            self.index
                .create_collection(&self.collection, self.dense.dims())
                .await?;
            info!(
                collection = %self.collection,
                dims = self.dense.dims(),
                vector = self.dense.vector_name(),
                "created collection"
            );
        }

        let mut written: u64 = 0;
        for (batch_idx, batch) in records.chunks(self.batch_size).enumerate() {
            let documents: Vec<String> = batch.iter().map(build_document).collect();

            let sparse_vectors = self.sparse.embed_batch(&documents);
            let dense_vectors = self.dense.embed_batch(&documents).await.with_context(|| {
                format!(
                    "Embedding batch {} failed ({} points written so far)",
                    batch_idx, written
                )
            })?;

            if dense_vectors.len() != batch.len() {
                bail!(
                    "Dense provider returned {} vectors for {} documents in batch {}",
                    dense_vectors.len(),
                    batch.len(),
                    batch_idx
                );
            }

            let points: Vec<IndexPoint> = batch
                .iter()
                .zip(documents)
                .zip(dense_vectors.into_iter().zip(sparse_vectors))
                .map(|((record, document), (dense, sparse))| IndexPoint {
                    id: record.episode_id as u64,
                    dense,
                    sparse,
                    payload: PointPayload {
                        podcast_id: record.podcast_id,
                        episode_id: record.episode_id,
                        title: record.title.clone(),
                        podcast_name: record.podcast_name.clone(),
                        podcast_author: record.podcast_author.clone(),
                        podcast_categories: record.podcast_categories.clone(),
                        document,
                    },
                })
                .collect();

            self.index
                .upsert(&self.collection, points)
                .await
                .with_context(|| {
                    format!(
                        "Upsert of batch {} failed ({} points written so far)",
                        batch_idx, written
                    )
                })?;

            written += batch.len() as u64;
            info!(batch = batch_idx, written, "indexed batch");
        }

        Ok(written)
    }

    /// Resolve a podcast selector and ingest all of its episodes.
    pub async fn ingest_podcasts(&self, selector: &PodcastSelector) -> Result<u64> {
        let episode_ids = self.store.episode_ids_for_podcasts(selector).await?;
        self.ingest(&episode_ids).await
    }
}
