//! Qdrant-backed vector index.
//!
//! Collections carry one named dense vector field (cosine distance, name
//! derived from the embedding mode and model) and one sparse `bm25` field
//! with the IDF modifier, so term rarity is weighted by the index at query
//! time. The canonical document payload field gets a full-text index to
//! serve the any-of keyword filter.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    point_id::PointIdOptions, value::Kind, Condition, CreateCollectionBuilder,
    CreateFieldIndexCollectionBuilder, Distance, FieldType, Filter, Modifier, NamedVectors,
    PointStruct, Query, QueryBatchPointsBuilder, QueryPointsBuilder, SearchParamsBuilder,
    SparseVectorParamsBuilder, SparseVectorsConfigBuilder, UpsertPointsBuilder, Value, Vector,
    VectorInput, VectorParamsBuilder, VectorsConfigBuilder,
};
use qdrant_client::{Payload, Qdrant};
use std::collections::HashMap;

use super::{CandidateRequest, QueryVector, ScoredHit, VectorIndex};
use crate::config::QdrantConfig;
use crate::embedding::sparse::SPARSE_VECTOR_NAME;
use crate::models::{IndexPoint, PointPayload};

pub struct QdrantIndex {
    client: Qdrant,
    dense_vector_name: String,
}

impl QdrantIndex {
    /// Connect to a Qdrant instance.
    ///
    /// `dense_vector_name` is the named dense field this deployment writes
    /// and reads; it comes from the active dense embedding provider so that
    /// ingestion and query stay on the same field.
    pub fn new(config: &QdrantConfig, dense_vector_name: &str) -> Result<Self> {
        let mut builder = Qdrant::from_url(&config.url);
        if let Some(key) = &config.api_key {
            builder = builder.api_key(key.clone());
        }
        let client = builder
            .build()
            .with_context(|| format!("Failed to connect to Qdrant at {}", config.url))?;

        Ok(Self {
            client,
            dense_vector_name: dense_vector_name.to_string(),
        })
    }
}

#[async_trait]
impl VectorIndex for QdrantIndex {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        self.client
            .collection_exists(name)
            .await
            .context("Failed to check collection existence")
    }

    async fn create_collection(&self, name: &str, dense_dim: usize) -> Result<()> {
        let mut vectors = VectorsConfigBuilder::default();
        vectors.add_named_vector_params(
            &self.dense_vector_name,
            VectorParamsBuilder::new(dense_dim as u64, Distance::Cosine),
        );

        let mut sparse = SparseVectorsConfigBuilder::default();
        sparse.add_named_vector_params(
            SPARSE_VECTOR_NAME,
            SparseVectorParamsBuilder::default().modifier(Modifier::Idf),
        );

        self.client
            .create_collection(
                CreateCollectionBuilder::new(name)
                    .vectors_config(vectors)
                    .sparse_vectors_config(sparse),
            )
            .await
            .with_context(|| format!("Failed to create collection '{}'", name))?;

        // Full-text index over the canonical document, used by the any-of
        // keyword filter at query time.
        self.client
            .create_field_index(CreateFieldIndexCollectionBuilder::new(
                name,
                "document",
                FieldType::Text,
            ))
            .await
            .with_context(|| format!("Failed to index 'document' field on '{}'", name))?;

        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.client
            .delete_collection(name)
            .await
            .with_context(|| format!("Failed to delete collection '{}'", name))?;
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()> {
        let mut structs = Vec::with_capacity(points.len());
        for point in points {
            let payload = to_payload(&point.payload)?;
            let vectors = NamedVectors::default()
                .add_vector(
                    self.dense_vector_name.clone(),
                    Vector::new_dense(point.dense),
                )
                .add_vector(
                    SPARSE_VECTOR_NAME,
                    Vector::new_sparse(point.sparse.indices, point.sparse.values),
                );
            structs.push(PointStruct::new(point.id, vectors, payload));
        }

        self.client
            .upsert_points(UpsertPointsBuilder::new(name, structs).wait(true))
            .await
            .with_context(|| format!("Failed to upsert points into '{}'", name))?;
        Ok(())
    }

    async fn retrieve_candidates(
        &self,
        name: &str,
        requests: &[CandidateRequest],
    ) -> Result<Vec<Vec<ScoredHit>>> {
        let mut queries = Vec::with_capacity(requests.len());
        for request in requests {
            let mut builder = QueryPointsBuilder::new(name)
                .limit(request.limit as u64)
                .params(SearchParamsBuilder::default().exact(true))
                .with_payload(true);

            builder = match &request.query {
                QueryVector::Dense {
                    vector_name,
                    vector,
                } => builder
                    .query(Query::new_nearest(vector.clone()))
                    .using(vector_name.clone()),
                QueryVector::Sparse { vector } => builder
                    .query(Query::new_nearest(VectorInput::new_sparse(
                        vector.indices.clone(),
                        vector.values.clone(),
                    )))
                    .using(SPARSE_VECTOR_NAME),
            };

            if let Some(tokens) = &request.keyword_filter {
                let conditions: Vec<Condition> = tokens
                    .iter()
                    .map(|t| Condition::matches_text("document", t))
                    .collect();
                builder = builder.filter(Filter::should(conditions));
            }

            queries.push(builder.build());
        }

        let response = self
            .client
            .query_batch(QueryBatchPointsBuilder::new(name, queries))
            .await
            .context("Vector index batch query failed")?;

        if response.result.len() != requests.len() {
            bail!(
                "Index returned {} candidate lists for {} requests",
                response.result.len(),
                requests.len()
            );
        }

        Ok(response
            .result
            .into_iter()
            .map(|batch| {
                batch
                    .result
                    .into_iter()
                    .filter_map(scored_point_to_hit)
                    .collect()
            })
            .collect())
    }
}

fn to_payload(payload: &PointPayload) -> Result<Payload> {
    Payload::try_from(serde_json::json!({
        "podcast_id": payload.podcast_id,
        "episode_id": payload.episode_id,
        "title": payload.title,
        "podcast_name": payload.podcast_name,
        "podcast_author": payload.podcast_author,
        "podcast_categories": payload.podcast_categories,
        "document": payload.document,
    }))
    .map_err(|e| anyhow::anyhow!("Failed to encode point payload: {}", e))
}

fn scored_point_to_hit(point: qdrant_client::qdrant::ScoredPoint) -> Option<ScoredHit> {
    let id = match point.id.and_then(|id| id.point_id_options) {
        Some(PointIdOptions::Num(n)) => n,
        _ => return None,
    };
    Some(ScoredHit {
        id,
        score: point.score,
        payload: payload_from_map(&point.payload),
    })
}

fn payload_from_map(map: &HashMap<String, Value>) -> PointPayload {
    PointPayload {
        podcast_id: get_i64(map, "podcast_id"),
        episode_id: get_i64(map, "episode_id"),
        title: get_str(map, "title"),
        podcast_name: get_str(map, "podcast_name"),
        podcast_author: get_str(map, "podcast_author"),
        podcast_categories: get_str_list(map, "podcast_categories"),
        document: get_str(map, "document"),
    }
}

fn get_str(map: &HashMap<String, Value>, key: &str) -> String {
    match map.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::StringValue(s)) => s.clone(),
        _ => String::new(),
    }
}

fn get_i64(map: &HashMap<String, Value>, key: &str) -> i64 {
    match map.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::IntegerValue(i)) => *i,
        _ => 0,
    }
}

fn get_str_list(map: &HashMap<String, Value>, key: &str) -> Vec<String> {
    match map.get(key).and_then(|v| v.kind.as_ref()) {
        Some(Kind::ListValue(list)) => list
            .values
            .iter()
            .filter_map(|v| match v.kind.as_ref() {
                Some(Kind::StringValue(s)) => Some(s.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}
