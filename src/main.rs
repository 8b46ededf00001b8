//! # Podsearch CLI
//!
//! The `podsearch` binary drives the whole system: schema setup, ingestion
//! from the episode database into the vector index, ad-hoc searches, and
//! the HTTP search endpoint.
//!
//! ## Usage
//!
//! ```bash
//! podsearch --config ./config/podsearch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `podsearch init` | Create the SQLite episode database schema |
//! | `podsearch ingest` | Embed and upsert episodes into the vector index |
//! | `podsearch search "<query>"` | Run a hybrid search and print results |
//! | `podsearch serve` | Start the HTTP search endpoint |
//! | `podsearch reset` | Delete the vector collection |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the episode database
//! podsearch init
//!
//! # Index every episode of two podcasts
//! podsearch ingest --podcast-ids 50,51
//!
//! # Index specific episodes
//! podsearch ingest --episode-ids 1200,1201,1202
//!
//! # Arabic keyword search
//! podsearch search "تطوير المنتجعات"
//!
//! # Serve GET /search for the frontend
//! podsearch serve
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use podsearch::config::{self, Config};
use podsearch::db::{self, EpisodeStore};
use podsearch::embedding::create_dense_embedder;
use podsearch::index::qdrant::QdrantIndex;
use podsearch::index::VectorIndex;
use podsearch::ingest::IngestPipeline;
use podsearch::migrate;
use podsearch::models::PodcastSelector;
use podsearch::search::HybridSearchEngine;
use podsearch::server;

/// Podsearch — hybrid dense + lexical search over podcast episodes.
#[derive(Parser)]
#[command(
    name = "podsearch",
    about = "Hybrid dense + lexical (BM25) search engine for podcast episodes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/podsearch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the episode database schema.
    ///
    /// Creates the SQLite file and the `podcasts`/`episodes` tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Embed episodes and upsert them into the vector index.
    ///
    /// Episodes can be addressed directly (`--episode-ids`) or through
    /// their podcast (`--podcast-ids`, `--podcast-guid`, `--itunes-id`).
    /// Re-ingesting the same episodes overwrites their points.
    Ingest {
        /// Episode ids, comma separated.
        #[arg(long, value_delimiter = ',')]
        episode_ids: Vec<i64>,

        /// Podcast feed ids, comma separated; all of their episodes are ingested.
        #[arg(long, value_delimiter = ',')]
        podcast_ids: Vec<i64>,

        /// Podcast GUID; all of its episodes are ingested.
        #[arg(long)]
        podcast_guid: Option<String>,

        /// Podcast iTunes id; all of its episodes are ingested.
        #[arg(long)]
        itunes_id: Option<i64>,
    },

    /// Run a hybrid search and print the ranked results.
    Search {
        /// The search query (Arabic or any other language).
        query: String,

        /// Maximum number of results to print.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Start the HTTP search endpoint.
    Serve,

    /// Delete the vector collection.
    ///
    /// Required before re-ingesting with a different embedding model or
    /// dimensionality, since those are fixed at collection creation.
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Ingest {
            episode_ids,
            podcast_ids,
            podcast_guid,
            itunes_id,
        } => {
            let (store, pipeline) = build_pipeline(&cfg).await?;

            let mut ids = episode_ids;
            let mut selectors: Vec<PodcastSelector> = Vec::new();
            if !podcast_ids.is_empty() {
                selectors.push(PodcastSelector::ByFeedIds(podcast_ids));
            }
            if let Some(guid) = podcast_guid {
                selectors.push(PodcastSelector::ByGuid(guid));
            }
            if let Some(itunes) = itunes_id {
                selectors.push(PodcastSelector::ByItunesId(itunes));
            }
            for selector in &selectors {
                ids.extend(store.episode_ids_for_podcasts(selector).await?);
            }
            ids.sort_unstable();
            ids.dedup();

            if ids.is_empty() {
                anyhow::bail!(
                    "Nothing to ingest. Pass --episode-ids, --podcast-ids, --podcast-guid, or --itunes-id."
                );
            }

            let written = pipeline.ingest(&ids).await?;
            println!("indexed {} episodes", written);
        }
        Commands::Search { query, limit } => {
            let engine = build_engine(&cfg)?;
            let mut results = engine.search(&query).await?;
            if let Some(limit) = limit {
                results.truncate(limit);
            }

            if results.is_empty() {
                println!("No results.");
            } else {
                for (i, result) in results.iter().enumerate() {
                    println!(
                        "{}. [{:.4}] {} / {}",
                        i + 1,
                        result.similarity_score,
                        result.podcast_title,
                        result.episode_title
                    );
                    println!("    author: {}", result.podcast_author);
                    if !result.podcast_categories.is_empty() {
                        println!("    categories: {}", result.podcast_categories.join(", "));
                    }
                    println!("    episode id: {}", result.episode_id);
                    println!();
                }
            }
        }
        Commands::Serve => {
            let engine = Arc::new(build_engine(&cfg)?);
            server::run_server(&cfg.server.bind, engine).await?;
        }
        Commands::Reset => {
            let vector_name = podsearch::embedding::dense_vector_name(&cfg.embedding);
            let index = QdrantIndex::new(&cfg.qdrant, &vector_name)?;
            index.delete_collection(&cfg.qdrant.collection).await?;
            println!("Collection '{}' deleted.", cfg.qdrant.collection);
        }
    }

    Ok(())
}

async fn build_pipeline(cfg: &Config) -> Result<(EpisodeStore, IngestPipeline)> {
    let pool = db::connect(cfg).await?;
    let store = EpisodeStore::new(pool);
    let dense = create_dense_embedder(&cfg.embedding)?;
    let index = Arc::new(QdrantIndex::new(&cfg.qdrant, dense.vector_name())?);
    let pipeline = IngestPipeline::new(
        store.clone(),
        index,
        dense,
        &cfg.qdrant.collection,
        cfg.embedding.batch_size,
    );
    Ok((store, pipeline))
}

fn build_engine(cfg: &Config) -> Result<HybridSearchEngine> {
    let dense = create_dense_embedder(&cfg.embedding)?;
    let index = Arc::new(QdrantIndex::new(&cfg.qdrant, dense.vector_name())?);
    Ok(HybridSearchEngine::new(
        index,
        dense,
        &cfg.qdrant.collection,
        cfg.retrieval.clone(),
    ))
}
