use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub qdrant: QdrantConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QdrantConfig {
    #[serde(default = "default_qdrant_url")]
    pub url: String,
    #[serde(default = "default_collection")]
    pub collection: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key: None,
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection() -> String {
    "podcast_episodes".to_string()
}

/// Embedding provider settings.
///
/// The `mode` field selects the dense backend (`"local"` or `"openai"`) and
/// must stay consistent between ingestion and query time: the named dense
/// vector field in the index is derived from the mode and model, so querying
/// an index built with a different mode fails instead of silently returning
/// nonsense.
#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            mode: default_mode(),
            model: None,
            dims: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_mode() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    100
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

/// Retrieval tuning knobs for the hybrid search engine.
#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Candidate pool size for each sparse (BM25) retrieval pass.
    #[serde(default = "default_sparse_limit")]
    pub sparse_limit: usize,
    /// Candidate pool size for the dense retrieval pass.
    #[serde(default = "default_dense_limit")]
    pub dense_limit: usize,
    /// Maximum number of fused results returned to the caller.
    #[serde(default = "default_final_limit")]
    pub final_limit: usize,
    /// Reciprocal Rank Fusion constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f32,
    /// Queries with at most this many whitespace-separated tokens are treated
    /// as keyword queries and skip dense retrieval entirely.
    #[serde(default = "default_keyword_query_max_tokens")]
    pub keyword_query_max_tokens: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            sparse_limit: default_sparse_limit(),
            dense_limit: default_dense_limit(),
            final_limit: default_final_limit(),
            rrf_k: default_rrf_k(),
            keyword_query_max_tokens: default_keyword_query_max_tokens(),
        }
    }
}

fn default_sparse_limit() -> usize {
    40
}
fn default_dense_limit() -> usize {
    15
}
fn default_final_limit() -> usize {
    10
}
fn default_rrf_k() -> f32 {
    60.0
}
fn default_keyword_query_max_tokens() -> usize {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate retrieval
    if config.retrieval.final_limit < 1 {
        anyhow::bail!("retrieval.final_limit must be >= 1");
    }
    if config.retrieval.sparse_limit < 1 || config.retrieval.dense_limit < 1 {
        anyhow::bail!("retrieval.sparse_limit and retrieval.dense_limit must be >= 1");
    }
    if config.retrieval.rrf_k <= 0.0 {
        anyhow::bail!("retrieval.rrf_k must be > 0");
    }

    // Validate embedding
    match config.embedding.mode.as_str() {
        "local" | "openai" => {}
        other => anyhow::bail!(
            "Unknown embedding mode: '{}'. Must be local or openai.",
            other
        ),
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    Ok(config)
}
