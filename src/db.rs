//! Episode store (SQLite).
//!
//! The relational database is the source of truth for podcast and episode
//! metadata and is read-only to the search core: the only queries here are
//! the join the ingestion pipeline needs and the podcast-to-episode id
//! resolution for the CLI.

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

use crate::config::Config;
use crate::models::{EpisodeRecord, PodcastSelector};

pub async fn connect(config: &Config) -> Result<SqlitePool> {
    let db_path = &config.database.path;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Read access to the `podcasts`/`episodes` tables.
#[derive(Clone)]
pub struct EpisodeStore {
    pool: SqlitePool,
}

impl EpisodeStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Load episode rows joined with their parent podcast, by episode id.
    ///
    /// Missing text fields come back as empty strings; a NULL or unparsable
    /// categories column becomes an empty list. Unknown ids are skipped.
    pub async fn episodes_by_ids(&self, episode_ids: &[i64]) -> Result<Vec<EpisodeRecord>> {
        if episode_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = sqlx::QueryBuilder::new(
            "SELECT e.id AS episode_id, e.title AS title, e.description AS description, \
             p.id AS podcast_id, p.title AS podcast_name, p.author AS podcast_author, \
             p.categories AS podcast_categories \
             FROM episodes e \
             JOIN podcasts p ON e.podcast_id = p.id \
             WHERE e.id IN (",
        );
        let mut sep = qb.separated(", ");
        for id in episode_ids {
            sep.push_bind(*id);
        }
        qb.push(") ORDER BY e.id");

        let rows = qb.build().fetch_all(&self.pool).await?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    /// Resolve a podcast selector into the episode ids it covers.
    pub async fn episode_ids_for_podcasts(&self, selector: &PodcastSelector) -> Result<Vec<i64>> {
        let ids = match selector {
            PodcastSelector::ByFeedIds(podcast_ids) => {
                if podcast_ids.is_empty() {
                    return Ok(Vec::new());
                }
                let mut qb = sqlx::QueryBuilder::new(
                    "SELECT e.id FROM episodes e WHERE e.podcast_id IN (",
                );
                let mut sep = qb.separated(", ");
                for id in podcast_ids {
                    sep.push_bind(*id);
                }
                qb.push(") ORDER BY e.id");
                qb.build_query_scalar().fetch_all(&self.pool).await?
            }
            PodcastSelector::ByGuid(guid) => {
                sqlx::query_scalar(
                    "SELECT e.id FROM episodes e \
                     JOIN podcasts p ON e.podcast_id = p.id \
                     WHERE p.podcast_guid = ? ORDER BY e.id",
                )
                .bind(guid)
                .fetch_all(&self.pool)
                .await?
            }
            PodcastSelector::ByItunesId(itunes_id) => {
                sqlx::query_scalar(
                    "SELECT e.id FROM episodes e \
                     JOIN podcasts p ON e.podcast_id = p.id \
                     WHERE p.itunes_id = ? ORDER BY e.id",
                )
                .bind(itunes_id)
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(ids)
    }
}

fn row_to_record(row: &sqlx::sqlite::SqliteRow) -> EpisodeRecord {
    let categories_json: Option<String> = row.get("podcast_categories");
    let podcast_categories = categories_json
        .as_deref()
        .and_then(|json| serde_json::from_str(json).ok())
        .unwrap_or_default();

    EpisodeRecord {
        episode_id: row.get("episode_id"),
        podcast_id: row.get("podcast_id"),
        podcast_name: row.get::<Option<String>, _>("podcast_name").unwrap_or_default(),
        podcast_author: row
            .get::<Option<String>, _>("podcast_author")
            .unwrap_or_default(),
        podcast_categories,
        title: row.get::<Option<String>, _>("title").unwrap_or_default(),
        description: row
            .get::<Option<String>, _>("description")
            .unwrap_or_default(),
    }
}
