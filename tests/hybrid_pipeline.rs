//! End-to-end pipeline tests: relational rows → ingestion → hybrid search.
//!
//! Runs against the in-memory vector index and a deterministic stub dense
//! embedder, so no external services or model downloads are needed.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use podsearch::config::{Config, DatabaseConfig, QdrantConfig, RetrievalConfig, ServerConfig};
use podsearch::db::{self, EpisodeStore};
use podsearch::embedding::DenseEmbedder;
use podsearch::index::memory::MemoryIndex;
use podsearch::ingest::IngestPipeline;
use podsearch::migrate;
use podsearch::models::PodcastSelector;
use podsearch::search::HybridSearchEngine;

const DENSE_NAME: &str = "dense-test";
const DIMS: usize = 16;

struct StubDenseEmbedder;

fn stub_vector(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for b in text.to_lowercase().bytes() {
        v[b as usize % DIMS] += 1.0;
    }
    v
}

#[async_trait]
impl DenseEmbedder for StubDenseEmbedder {
    fn model_name(&self) -> &str {
        "stub"
    }
    fn dims(&self) -> usize {
        DIMS
    }
    fn vector_name(&self) -> &str {
        DENSE_NAME
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| stub_vector(t)).collect())
    }
}

struct TestEnv {
    _tmp: tempfile::TempDir,
    index: Arc<MemoryIndex>,
    pipeline: IngestPipeline,
    engine: HybridSearchEngine,
}

async fn setup() -> TestEnv {
    let tmp = tempfile::TempDir::new().unwrap();
    let config = Config {
        database: DatabaseConfig {
            path: tmp.path().join("episodes.sqlite"),
        },
        qdrant: QdrantConfig {
            url: "http://localhost:6334".to_string(),
            collection: "episodes".to_string(),
            api_key: None,
        },
        embedding: Default::default(),
        retrieval: RetrievalConfig::default(),
        server: ServerConfig {
            bind: "127.0.0.1:0".to_string(),
        },
    };

    let pool = db::connect(&config).await.unwrap();
    migrate::run_migrations(&pool).await.unwrap();

    sqlx::query(
        "INSERT INTO podcasts (id, url, title, author, podcast_guid, categories) VALUES \
         (1, 'https://feeds.example/athar', 'برنامج', 'ليلى', 'guid-athar', '[\"Society\"]'), \
         (2, 'https://feeds.example/tech', 'Tech Weekly', 'Sam', 'guid-tech', '[\"Technology\"]')",
    )
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query(
        "INSERT INTO episodes (id, title, description, guid, podcast_id) VALUES \
         (10, 'حلقة تجريبية', '<p>مرحبا <a href=''http://x.com''>هنا</a></p>', 'ep-10', 1), \
         (11, 'تطوير المنتجعات في الشرقية', 'حديث عن السياحة والاستثمار العقاري', 'ep-11', 1), \
         (20, 'Async Rust in production', 'Executors, tasks, and the tokio runtime in practice', 'ep-20', 2), \
         (21, 'Databases on bare metal', 'Postgres replication and backup strategies', 'ep-21', 2)",
    )
    .execute(&pool)
    .await
    .unwrap();

    let store = EpisodeStore::new(pool);
    let dense = Arc::new(StubDenseEmbedder);
    let index = Arc::new(MemoryIndex::new(DENSE_NAME));
    let pipeline = IngestPipeline::new(
        store,
        index.clone(),
        dense.clone(),
        "episodes",
        100,
    );
    let engine = HybridSearchEngine::new(
        index.clone(),
        dense,
        "episodes",
        RetrievalConfig::default(),
    );

    TestEnv {
        _tmp: tmp,
        index,
        pipeline,
        engine,
    }
}

#[tokio::test]
async fn test_search_before_ingest_is_empty() {
    let env = setup().await;
    let results = env.engine.search("anything at all").await.unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_ingest_then_arabic_search() {
    let env = setup().await;
    let written = env
        .pipeline
        .ingest_podcasts(&PodcastSelector::ByFeedIds(vec![1, 2]))
        .await
        .unwrap();
    assert_eq!(written, 4);

    // Keyword query with orthographic variance: taa-marbuta in the stored
    // title, plain haa in none — normalization must line the two up.
    let results = env.engine.search("حلقة تجريبية").await.unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].episode_id, 10);
    assert_eq!(results[0].episode_title, "حلقه تجريبيه");
    assert_eq!(results[0].podcast_title, "برنامج");
}

#[tokio::test]
async fn test_stored_document_is_scrubbed() {
    let env = setup().await;
    env.pipeline.ingest(&[10]).await.unwrap();

    let point = env.index.get_point("episodes", 10).unwrap();
    let lines: Vec<&str> = point.payload.document.lines().collect();
    assert_eq!(lines[2], "حلقه تجريبيه");
    assert!(!point.payload.document.contains("http://x.com"));
    assert!(!point.payload.document.contains('<'));
}

#[tokio::test]
async fn test_long_english_query_ranks_relevant_episode_first() {
    let env = setup().await;
    env.pipeline
        .ingest_podcasts(&PodcastSelector::ByFeedIds(vec![1, 2]))
        .await
        .unwrap();

    let results = env
        .engine
        .search("running the tokio runtime in production")
        .await
        .unwrap();
    assert!(!results.is_empty());
    assert_eq!(results[0].episode_id, 20);
    assert!(results.len() <= 10);
}

#[tokio::test]
async fn test_empty_query_is_not_an_error() {
    let env = setup().await;
    env.pipeline.ingest(&[10, 11]).await.unwrap();
    assert!(env.engine.search("").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_reingest_keeps_point_count_stable() {
    let env = setup().await;
    env.pipeline.ingest(&[10, 11, 20, 21]).await.unwrap();
    assert_eq!(env.index.point_count("episodes"), 4);

    env.pipeline.ingest(&[10, 11, 20, 21]).await.unwrap();
    assert_eq!(env.index.point_count("episodes"), 4);
}
