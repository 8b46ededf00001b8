use anyhow::Result;
use sqlx::SqlitePool;

/// Create the relational schema. Idempotent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS podcasts (
            id INTEGER PRIMARY KEY,
            url TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            description TEXT,
            author TEXT,
            image_url TEXT,
            itunes_id INTEGER,
            podcast_guid TEXT,
            podcastindex_id INTEGER,
            categories TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS episodes (
            id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            guid TEXT NOT NULL UNIQUE,
            date_published INTEGER,
            duration INTEGER,
            image TEXT,
            podcastindex_id INTEGER,
            podcast_id INTEGER NOT NULL,
            FOREIGN KEY (podcast_id) REFERENCES podcasts(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_episodes_podcast_id ON episodes(podcast_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_podcasts_podcastindex_id ON podcasts(podcastindex_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
