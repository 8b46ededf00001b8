//! Exact in-memory vector index.
//!
//! Implements the full [`VectorIndex`] contract with brute-force scoring:
//! cosine similarity for the dense field, dot product for the sparse field,
//! token intersection for the keyword filter. No IDF weighting is applied
//! to sparse scores here; ranking agreement with the production backend is
//! approximate, which is fine for tests and offline development.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use super::{CandidateRequest, QueryVector, ScoredHit, VectorIndex};
use crate::embedding::cosine_similarity;
use crate::embedding::sparse::tokenize;
use crate::models::{IndexPoint, SparseVector};

pub struct MemoryIndex {
    dense_vector_name: String,
    collections: RwLock<HashMap<String, MemoryCollection>>,
}

struct MemoryCollection {
    dense_dim: usize,
    points: BTreeMap<u64, IndexPoint>,
}

impl MemoryIndex {
    pub fn new(dense_vector_name: &str) -> Self {
        Self {
            dense_vector_name: dense_vector_name.to_string(),
            collections: RwLock::new(HashMap::new()),
        }
    }

    /// Number of points in a collection. Test helper.
    pub fn point_count(&self, name: &str) -> usize {
        self.collections
            .read()
            .expect("collections lock poisoned")
            .get(name)
            .map(|c| c.points.len())
            .unwrap_or(0)
    }

    /// Fetch a stored point by id. Test helper.
    pub fn get_point(&self, name: &str, id: u64) -> Option<IndexPoint> {
        self.collections
            .read()
            .expect("collections lock poisoned")
            .get(name)
            .and_then(|c| c.points.get(&id).cloned())
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self
            .collections
            .read()
            .expect("collections lock poisoned")
            .contains_key(name))
    }

    async fn create_collection(&self, name: &str, dense_dim: usize) -> Result<()> {
        let mut collections = self.collections.write().expect("collections lock poisoned");
        if collections.contains_key(name) {
            bail!("Collection '{}' already exists", name);
        }
        collections.insert(
            name.to_string(),
            MemoryCollection {
                dense_dim,
                points: BTreeMap::new(),
            },
        );
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections
            .write()
            .expect("collections lock poisoned")
            .remove(name);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<()> {
        let mut collections = self.collections.write().expect("collections lock poisoned");
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' does not exist", name))?;

        for point in points {
            if point.dense.len() != collection.dense_dim {
                bail!(
                    "Dense vector has {} dims, collection '{}' expects {}",
                    point.dense.len(),
                    name,
                    collection.dense_dim
                );
            }
            collection.points.insert(point.id, point);
        }
        Ok(())
    }

    async fn retrieve_candidates(
        &self,
        name: &str,
        requests: &[CandidateRequest],
    ) -> Result<Vec<Vec<ScoredHit>>> {
        let collections = self.collections.read().expect("collections lock poisoned");
        let collection = collections
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Collection '{}' does not exist", name))?;

        let mut lists = Vec::with_capacity(requests.len());
        for request in requests {
            let mut scored: Vec<ScoredHit> = Vec::new();

            for point in collection.points.values() {
                if let Some(tokens) = &request.keyword_filter {
                    if !matches_any_token(&point.payload.document, tokens) {
                        continue;
                    }
                }

                let score = match &request.query {
                    QueryVector::Dense {
                        vector_name,
                        vector,
                    } => {
                        if vector_name != &self.dense_vector_name {
                            bail!(
                                "Unknown dense vector field '{}' (collection was created with '{}')",
                                vector_name,
                                self.dense_vector_name
                            );
                        }
                        cosine_similarity(vector, &point.dense)
                    }
                    QueryVector::Sparse { vector } => sparse_dot(vector, &point.sparse),
                };

                if score > 0.0 {
                    scored.push(ScoredHit {
                        id: point.id,
                        score,
                        payload: point.payload.clone(),
                    });
                }
            }

            scored.sort_by(|a, b| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            });
            scored.truncate(request.limit);
            lists.push(scored);
        }

        Ok(lists)
    }
}

fn matches_any_token(document: &str, tokens: &[String]) -> bool {
    let doc_tokens: HashSet<String> = tokenize(document).into_iter().collect();
    tokens.iter().any(|t| doc_tokens.contains(t))
}

/// Dot product of two sparse vectors with sorted indices.
fn sparse_dot(a: &SparseVector, b: &SparseVector) -> f32 {
    let mut sum = 0.0;
    let (mut i, mut j) = (0, 0);
    while i < a.indices.len() && j < b.indices.len() {
        match a.indices[i].cmp(&b.indices[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                sum += a.values[i] * b.values[j];
                i += 1;
                j += 1;
            }
        }
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PointPayload;

    const DENSE_NAME: &str = "dense-test";

    fn payload(episode_id: i64, document: &str) -> PointPayload {
        PointPayload {
            podcast_id: 1,
            episode_id,
            title: format!("episode {}", episode_id),
            podcast_name: "show".to_string(),
            podcast_author: "host".to_string(),
            podcast_categories: vec!["Technology".to_string()],
            document: document.to_string(),
        }
    }

    fn point(id: u64, dense: Vec<f32>, document: &str) -> IndexPoint {
        IndexPoint {
            id,
            dense,
            sparse: crate::embedding::sparse::Bm25Embedder::default().embed_document(document),
            payload: payload(id as i64, document),
        }
    }

    #[tokio::test]
    async fn test_upsert_overwrites_same_id() {
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 2).await.unwrap();

        index
            .upsert("c", vec![point(1, vec![1.0, 0.0], "old words")])
            .await
            .unwrap();
        index
            .upsert("c", vec![point(1, vec![0.0, 1.0], "new words")])
            .await
            .unwrap();

        assert_eq!(index.point_count("c"), 1);
        let stored = index.get_point("c", 1).unwrap();
        assert!(stored.payload.document.contains("new"));
        assert_eq!(stored.dense, vec![0.0, 1.0]);
    }

    #[tokio::test]
    async fn test_upsert_rejects_wrong_dims() {
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 3).await.unwrap();
        let result = index.upsert("c", vec![point(1, vec![1.0, 0.0], "x")]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_create_existing_collection_fails() {
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 2).await.unwrap();
        assert!(index.create_collection("c", 2).await.is_err());
    }

    #[tokio::test]
    async fn test_dense_retrieval_ranks_by_cosine() {
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 2).await.unwrap();
        index
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0], "a"),
                    point(2, vec![0.7, 0.7], "b"),
                    point(3, vec![0.0, 1.0], "c"),
                ],
            )
            .await
            .unwrap();

        let lists = index
            .retrieve_candidates(
                "c",
                &[CandidateRequest {
                    query: QueryVector::Dense {
                        vector_name: DENSE_NAME.to_string(),
                        vector: vec![1.0, 0.0],
                    },
                    limit: 2,
                    keyword_filter: None,
                }],
            )
            .await
            .unwrap();

        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].len(), 2);
        assert_eq!(lists[0][0].id, 1);
        assert_eq!(lists[0][1].id, 2);
    }

    #[tokio::test]
    async fn test_unknown_dense_field_is_an_error() {
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 2).await.unwrap();
        index
            .upsert("c", vec![point(1, vec![1.0, 0.0], "a")])
            .await
            .unwrap();

        let result = index
            .retrieve_candidates(
                "c",
                &[CandidateRequest {
                    query: QueryVector::Dense {
                        vector_name: "dense-other-model".to_string(),
                        vector: vec![1.0, 0.0],
                    },
                    limit: 5,
                    keyword_filter: None,
                }],
            )
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_keyword_filter_restricts_candidates() {
        let embedder = crate::embedding::sparse::Bm25Embedder::default();
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 2).await.unwrap();
        index
            .upsert(
                "c",
                vec![
                    point(1, vec![1.0, 0.0], "rust concurrency patterns"),
                    point(2, vec![1.0, 0.0], "gardening for beginners"),
                ],
            )
            .await
            .unwrap();

        let lists = index
            .retrieve_candidates(
                "c",
                &[CandidateRequest {
                    query: QueryVector::Sparse {
                        vector: embedder.embed_query("rust concurrency"),
                    },
                    limit: 10,
                    keyword_filter: Some(vec!["rust".to_string()]),
                }],
            )
            .await
            .unwrap();

        assert_eq!(lists[0].len(), 1);
        assert_eq!(lists[0][0].id, 1);
    }

    #[tokio::test]
    async fn test_one_list_per_request() {
        let embedder = crate::embedding::sparse::Bm25Embedder::default();
        let index = MemoryIndex::new(DENSE_NAME);
        index.create_collection("c", 2).await.unwrap();
        index
            .upsert("c", vec![point(1, vec![1.0, 0.0], "alpha beta")])
            .await
            .unwrap();

        let requests = vec![
            CandidateRequest {
                query: QueryVector::Sparse {
                    vector: embedder.embed_query("alpha"),
                },
                limit: 5,
                keyword_filter: None,
            },
            CandidateRequest {
                query: QueryVector::Sparse {
                    vector: embedder.embed_query("nothing matches this"),
                },
                limit: 5,
                keyword_filter: None,
            },
        ];
        let lists = index.retrieve_candidates("c", &requests).await.unwrap();
        assert_eq!(lists.len(), 2);
        assert_eq!(lists[0].len(), 1);
        assert!(lists[1].is_empty());
    }

    #[tokio::test]
    async fn test_missing_collection_errors() {
        let index = MemoryIndex::new(DENSE_NAME);
        let result = index.retrieve_candidates("absent", &[]).await;
        assert!(result.is_err());
    }
}
