use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    if current_version < 2 {
        debug!("Running migration v2");
        run_migration_v2(pool).await?;
        set_schema_version(pool, 2).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

/// v1: the scraped-post table as first deployed — identity, content,
/// provenance, notification flag.
async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id TEXT NOT NULL UNIQUE,
            title TEXT NOT NULL,
            text TEXT NOT NULL,
            url TEXT NOT NULL,
            group_name TEXT NOT NULL,
            group_url TEXT NOT NULL,
            raw_timestamp TEXT NOT NULL,
            scraped_at TEXT NOT NULL,
            notified INTEGER NOT NULL DEFAULT 0
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_group_url ON posts(group_url)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_notified ON posts(notified)")
        .execute(pool)
        .await?;

    Ok(())
}

/// v2: classification output and the persisted normalized instant.
async fn run_migration_v2(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "ALTER TABLE posts ADD COLUMN normalized_posted_at TEXT",
        "ALTER TABLE posts ADD COLUMN category TEXT",
        "ALTER TABLE posts ADD COLUMN secondary_categories TEXT NOT NULL DEFAULT '[]'",
        "ALTER TABLE posts ADD COLUMN location TEXT",
        "ALTER TABLE posts ADD COLUMN classification_features TEXT NOT NULL DEFAULT '{}'",
        "ALTER TABLE posts ADD COLUMN ai_processed INTEGER NOT NULL DEFAULT 0",
    ];

    for statement in statements {
        sqlx::query(statement)
            .execute(pool)
            .await
            .with_context(|| format!("Migration v2 failed at: {statement}"))?;
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_posts_normalized_posted_at ON posts(normalized_posted_at)",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_posts_category ON posts(category)")
        .execute(pool)
        .await?;

    Ok(())
}
