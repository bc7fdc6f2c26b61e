use anyhow::{Context, Result};
use log::debug;
use sqlx::{Row, SqlitePool};

const V1_POSTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS topics (
        id          BLOB PRIMARY KEY NOT NULL,
        name        TEXT NOT NULL UNIQUE,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS posts (
        id          BLOB PRIMARY KEY NOT NULL,
        author_id   BLOB NOT NULL,
        content     TEXT NOT NULL,
        image_path  TEXT,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_posts_created_at ON posts (created_at DESC, id DESC)",
    "CREATE TABLE IF NOT EXISTS post_topics (
        post_id     BLOB NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
        topic_id    BLOB NOT NULL REFERENCES topics (id) ON DELETE CASCADE,
        PRIMARY KEY (post_id, topic_id)
    )",
];

const V2_COMMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS comments (
        id          BLOB PRIMARY KEY NOT NULL,
        post_id     BLOB NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
        author_id   BLOB NOT NULL,
        content     TEXT NOT NULL,
        image_path  TEXT,
        created_at  TEXT NOT NULL,
        updated_at  TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_comments_post ON comments (post_id, created_at DESC)",
];

// One row per (post, user, relation). The partial unique index keeps a user
// to a single vote row per post regardless of what the caller does.
const V3_INTERACTIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS post_interactions (
        post_id     BLOB NOT NULL REFERENCES posts (id) ON DELETE CASCADE,
        user_id     BLOB NOT NULL,
        kind        TEXT NOT NULL CHECK (kind IN ('upvote', 'downvote', 'save')),
        created_at  TEXT NOT NULL,
        PRIMARY KEY (post_id, user_id, kind)
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_post_interactions_single_vote
        ON post_interactions (post_id, user_id)
        WHERE kind IN ('upvote', 'downvote')",
    "CREATE INDEX IF NOT EXISTS idx_post_interactions_user ON post_interactions (user_id, kind)",
];

const MIGRATIONS: &[(i64, &[&str])] = &[(1, V1_POSTS), (2, V2_COMMENTS), (3, V3_INTERACTIONS)];

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    for (version, statements) in MIGRATIONS {
        if current_version < *version {
            debug!("Running migration v{}", version);
            apply(pool, *version, statements).await?;
        }
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create schema_version table")?;
    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let row = sqlx::query("SELECT COALESCE(MAX(version), 0) AS version FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to read schema version")?;
    Ok(row.get("version"))
}

async fn apply(pool: &SqlitePool, version: i64, statements: &[&str]) -> Result<()> {
    let mut tx = pool.begin().await?;

    for statement in statements {
        sqlx::query(*statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Migration v{version} failed"))?;
    }

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}
