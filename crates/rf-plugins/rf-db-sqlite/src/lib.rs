//! # rf-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational model
//! and the `rf-core` domain models.
//!
//! Interaction rows live in a single `post_interactions` table keyed by
//! (post, user, kind). Mutations of that table go through an
//! `BEGIN IMMEDIATE` transaction so the membership read, the guard check
//! and the writes happen under one write lock.

mod migrations;

use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use rf_core::error::{AppError, Result};
use rf_core::interaction::{self, Action};
use rf_core::models::{
    Comment, InteractionKind, Membership, Post, Prefetch, Tally, Topic, ViewerInteractions,
};
use rf_core::traits::PostRepo;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{QueryBuilder, Row, Sqlite};
use uuid::Uuid;

/// Attempts per interaction before a busy database is reported as an error.
const MAX_TX_ATTEMPTS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct SqlitePostRepo {
    pool: SqlitePool,
}

// Helper for UUID conversion
fn uuid_to_blob(id: Uuid) -> Vec<u8> {
    id.as_bytes().to_vec()
}

/// Reads a 16-byte id column. A malformed value is an Internal error.
fn uuid_column(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let blob: Vec<u8> = row.get(column);
    Uuid::from_slice(&blob).map_err(|err| {
        AppError::Internal(format!("corrupt uuid in column {column}: {err}"))
    })
}

fn post_from_row(row: &SqliteRow) -> Result<Post> {
    Ok(Post {
        id: uuid_column(row, "id")?,
        author_id: uuid_column(row, "author_id")?,
        content: row.get("content"),
        image_path: row.get("image_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn topic_from_row(row: &SqliteRow) -> Result<Topic> {
    Ok(Topic {
        id: uuid_column(row, "id")?,
        name: row.get("name"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    Ok(Comment {
        id: uuid_column(row, "id")?,
        post_id: uuid_column(row, "post_id")?,
        author_id: uuid_column(row, "author_id")?,
        content: row.get("content"),
        image_path: row.get("image_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Appends `(?, ?, ...)` binding every id.
fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[Uuid]) {
    qb.push("(");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(uuid_to_blob(*id));
    }
    separated.push_unseparated(")");
}

/// Failure inside an interaction transaction.
enum TxError {
    Db(sqlx::Error),
    App(AppError),
}

impl From<sqlx::Error> for TxError {
    fn from(err: sqlx::Error) -> Self {
        TxError::Db(err)
    }
}

impl From<AppError> for TxError {
    fn from(err: AppError) -> Self {
        TxError::App(err)
    }
}

impl TxError {
    /// SQLITE_BUSY / SQLITE_LOCKED and their extended codes.
    fn is_busy(&self) -> bool {
        match self {
            TxError::Db(sqlx::Error::Database(db)) => {
                matches!(db.code().as_deref(), Some("5" | "6" | "261" | "517"))
            }
            _ => false,
        }
    }

    fn into_app(self) -> AppError {
        match self {
            TxError::App(err) => err,
            TxError::Db(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                AppError::validation("a user may hold only one vote on a post")
            }
            TxError::Db(err) => AppError::Internal(format!("database error: {err}")),
        }
    }
}

impl SqlitePostRepo {
    /// Connects and brings the schema up to date.
    ///
    /// In-memory databases get a single pinned connection, since every
    /// SQLite connection to `:memory:` opens a separate database.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        let in_memory = url.contains(":memory:") || url.contains("mode=memory");

        let mut options = SqliteConnectOptions::from_str(url)
            .with_context(|| format!("Invalid database URL: {url}"))?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(8)
        };

        let pool = pool_options
            .connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        migrations::run(&pool).await?;
        log::info!("SQLite database ready at {}", url);

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Reads the viewer's rows on one post outside any transaction.
    pub async fn membership(&self, post_id: Uuid, user_id: Uuid) -> Result<Membership> {
        let mut conn = self.pool.acquire().await.context("Failed to acquire connection")?;
        let membership = load_membership(&mut conn, post_id, user_id)
            .await
            .context("Failed to load membership")?;
        Ok(membership)
    }

    /// One attempt at an interaction: lock, read, plan, write, commit.
    ///
    /// The transaction rolls back when dropped, so a cancelled request never
    /// returns a connection to the pool with the write lock still held.
    async fn try_apply_interaction(
        &self,
        post_id: Uuid,
        user_id: Uuid,
        action: Action,
    ) -> std::result::Result<Membership, TxError> {
        let mut tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
        let after = interaction_in_tx(&mut tx, post_id, user_id, action).await?;
        tx.commit().await?;
        Ok(after)
    }
}

async fn interaction_in_tx(
    conn: &mut SqliteConnection,
    post_id: Uuid,
    user_id: Uuid,
    action: Action,
) -> std::result::Result<Membership, TxError> {
    let exists = sqlx::query("SELECT 1 FROM posts WHERE id = ?")
        .bind(uuid_to_blob(post_id))
        .fetch_optional(&mut *conn)
        .await?;
    if exists.is_none() {
        return Err(AppError::not_found("Post", post_id).into());
    }

    let current = load_membership(&mut *conn, post_id, user_id).await?;
    let plan = interaction::plan(current, action)?;

    if let Some(kind) = plan.remove {
        sqlx::query("DELETE FROM post_interactions WHERE post_id = ? AND user_id = ? AND kind = ?")
            .bind(uuid_to_blob(post_id))
            .bind(uuid_to_blob(user_id))
            .bind(kind.as_str())
            .execute(&mut *conn)
            .await?;
    }

    if let Some(kind) = plan.add {
        sqlx::query("INSERT INTO post_interactions (post_id, user_id, kind, created_at) VALUES (?, ?, ?, ?)")
            .bind(uuid_to_blob(post_id))
            .bind(uuid_to_blob(user_id))
            .bind(kind.as_str())
            .bind(Utc::now())
            .execute(&mut *conn)
            .await?;
    }

    Ok(plan.result)
}

async fn load_membership(
    conn: &mut SqliteConnection,
    post_id: Uuid,
    user_id: Uuid,
) -> std::result::Result<Membership, sqlx::Error> {
    let rows = sqlx::query("SELECT kind FROM post_interactions WHERE post_id = ? AND user_id = ?")
        .bind(uuid_to_blob(post_id))
        .bind(uuid_to_blob(user_id))
        .fetch_all(&mut *conn)
        .await?;

    let mut membership = Membership::default();
    for row in rows {
        if let Some(kind) = InteractionKind::parse(&row.get::<String, _>("kind")) {
            membership.set(kind, true);
        }
    }
    Ok(membership)
}

/// Fails with NotFound naming the first id that has no topic row.
async fn ensure_topics_exist(conn: &mut SqliteConnection, topic_ids: &[Uuid]) -> Result<()> {
    if topic_ids.is_empty() {
        return Ok(());
    }

    let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM topics WHERE id IN ");
    push_id_list(&mut qb, topic_ids);
    let found = qb
        .build()
        .fetch_all(&mut *conn)
        .await
        .context("Failed to look up topics")?
        .iter()
        .map(|row| uuid_column(row, "id"))
        .collect::<Result<Vec<Uuid>>>()?;

    match topic_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(AppError::not_found("Topic", missing)),
        None => Ok(()),
    }
}

async fn link_topics(conn: &mut SqliteConnection, post_id: Uuid, topic_ids: &[Uuid]) -> Result<()> {
    for topic_id in topic_ids {
        sqlx::query("INSERT OR IGNORE INTO post_topics (post_id, topic_id) VALUES (?, ?)")
            .bind(uuid_to_blob(post_id))
            .bind(uuid_to_blob(*topic_id))
            .execute(&mut *conn)
            .await
            .context("Failed to link topic")?;
    }
    Ok(())
}

#[async_trait]
impl PostRepo for SqlitePostRepo {
    /// Atomic operation to create a post and its topic links.
    ///
    /// # Developer Note
    /// Using a Transaction (tx) ensures we don't end up with a post that
    /// silently lost its topics if a link insert fails.
    async fn create_post(&self, post: &Post, topic_ids: &[Uuid]) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        ensure_topics_exist(&mut tx, topic_ids).await?;

        sqlx::query("INSERT INTO posts (id, author_id, content, image_path, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(post.id))
            .bind(uuid_to_blob(post.author_id))
            .bind(&post.content)
            .bind(&post.image_path)
            .bind(post.created_at)
            .bind(post.updated_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert post")?;

        link_topics(&mut tx, post.id, topic_ids).await?;

        tx.commit().await.context("Failed to commit post")?;
        Ok(())
    }

    async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        let row = sqlx::query("SELECT * FROM posts WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load post")?;

        row.as_ref().map(post_from_row).transpose()
    }

    async fn list_posts(&self) -> Result<Vec<Post>> {
        let rows = sqlx::query("SELECT * FROM posts ORDER BY created_at DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list posts")?;

        rows.iter().map(post_from_row).collect()
    }

    async fn update_post(&self, post: &Post, topic_ids: Option<Vec<Uuid>>) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        // author_id is deliberately absent from the SET list.
        let updated = sqlx::query("UPDATE posts SET content = ?, image_path = ?, updated_at = ? WHERE id = ?")
            .bind(&post.content)
            .bind(&post.image_path)
            .bind(post.updated_at)
            .bind(uuid_to_blob(post.id))
            .execute(&mut *tx)
            .await
            .context("Failed to update post")?;
        if updated.rows_affected() == 0 {
            return Err(AppError::not_found("Post", post.id));
        }

        if let Some(topic_ids) = topic_ids {
            ensure_topics_exist(&mut tx, &topic_ids).await?;
            sqlx::query("DELETE FROM post_topics WHERE post_id = ?")
                .bind(uuid_to_blob(post.id))
                .execute(&mut *tx)
                .await
                .context("Failed to clear topics")?;
            link_topics(&mut tx, post.id, &topic_ids).await?;
        }

        tx.commit().await.context("Failed to commit post update")?;
        Ok(())
    }

    async fn delete_post(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;
        let blob = uuid_to_blob(id);

        for statement in [
            "DELETE FROM post_interactions WHERE post_id = ?",
            "DELETE FROM post_topics WHERE post_id = ?",
            "DELETE FROM comments WHERE post_id = ?",
        ] {
            sqlx::query(statement)
                .bind(&blob)
                .execute(&mut *tx)
                .await
                .context("Failed to delete post dependents")?;
        }

        let deleted = sqlx::query("DELETE FROM posts WHERE id = ?")
            .bind(&blob)
            .execute(&mut *tx)
            .await
            .context("Failed to delete post")?;
        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found("Post", id));
        }

        tx.commit().await.context("Failed to commit post deletion")?;
        Ok(())
    }

    async fn prefetch(&self, post_ids: &[Uuid], include_topics: bool) -> Result<Prefetch> {
        let mut prefetch = Prefetch::default();
        if post_ids.is_empty() {
            return Ok(prefetch);
        }

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT p.id, \
                (SELECT COUNT(*) FROM post_interactions i WHERE i.post_id = p.id AND i.kind = 'upvote') AS upvotes, \
                (SELECT COUNT(*) FROM post_interactions i WHERE i.post_id = p.id AND i.kind = 'downvote') AS downvotes, \
                (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments \
             FROM posts p WHERE p.id IN ",
        );
        push_id_list(&mut qb, post_ids);
        let rows = qb
            .build()
            .fetch_all(&self.pool)
            .await
            .context("Failed to count post interactions")?;

        for row in &rows {
            let id = uuid_column(row, "id")?;
            prefetch.tallies.insert(
                id,
                Tally {
                    upvotes: row.get("upvotes"),
                    downvotes: row.get("downvotes"),
                    comments: row.get("comments"),
                },
            );
        }

        if include_topics {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT pt.post_id, t.id, t.name, t.created_at, t.updated_at \
                 FROM post_topics pt JOIN topics t ON t.id = pt.topic_id \
                 WHERE pt.post_id IN ",
            );
            push_id_list(&mut qb, post_ids);
            qb.push(" ORDER BY t.name");
            let rows = qb
                .build()
                .fetch_all(&self.pool)
                .await
                .context("Failed to load post topics")?;

            for row in &rows {
                let post_id = uuid_column(row, "post_id")?;
                prefetch.topics.entry(post_id).or_default().push(topic_from_row(row)?);
            }
        }

        Ok(prefetch)
    }

    async fn viewer_interactions(&self, user_id: Uuid, post_ids: &[Uuid]) -> Result<ViewerInteractions> {
        let mut sets = ViewerInteractions::default();
        if post_ids.is_empty() {
            return Ok(sets);
        }

        for kind in InteractionKind::ALL {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT post_id FROM post_interactions WHERE kind = ");
            qb.push_bind(kind.as_str())
                .push(" AND user_id = ")
                .push_bind(uuid_to_blob(user_id))
                .push(" AND post_id IN ");
            push_id_list(&mut qb, post_ids);

            let rows = qb
                .build()
                .fetch_all(&self.pool)
                .await
                .with_context(|| format!("Failed to load {} flags", kind.as_str()))?;

            for row in &rows {
                sets.insert(kind, uuid_column(row, "post_id")?);
            }
        }

        Ok(sets)
    }

    /// Retries the whole transaction when SQLite reports the database busy.
    async fn apply_interaction(&self, post_id: Uuid, user_id: Uuid, action: Action) -> Result<Membership> {
        let mut attempt = 1;
        loop {
            match self.try_apply_interaction(post_id, user_id, action).await {
                Err(err) if err.is_busy() && attempt < MAX_TX_ATTEMPTS => {
                    log::debug!("{:?} on post {} hit a busy database, attempt {}", action, post_id, attempt);
                    tokio::time::sleep(Duration::from_millis(10 * 2u64.pow(attempt))).await;
                    attempt += 1;
                }
                result => return result.map_err(TxError::into_app),
            }
        }
    }

    async fn create_topic(&self, topic: &Topic) -> Result<()> {
        let inserted = sqlx::query("INSERT INTO topics (id, name, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(uuid_to_blob(topic.id))
            .bind(&topic.name)
            .bind(topic.created_at)
            .bind(topic.updated_at)
            .execute(&self.pool)
            .await;

        match inserted {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => Err(AppError::validation(
                format!("topic with name {:?} already exists", topic.name),
            )),
            Err(err) => Err(anyhow::Error::new(err).context("Failed to insert topic").into()),
        }
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query("SELECT * FROM topics ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list topics")?;

        rows.iter().map(topic_from_row).collect()
    }

    async fn delete_topic(&self, id: Uuid) -> Result<bool> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        sqlx::query("DELETE FROM post_topics WHERE topic_id = ?")
            .bind(uuid_to_blob(id))
            .execute(&mut *tx)
            .await
            .context("Failed to detach topic")?;
        let deleted = sqlx::query("DELETE FROM topics WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&mut *tx)
            .await
            .context("Failed to delete topic")?;

        tx.commit().await.context("Failed to commit topic deletion")?;
        Ok(deleted.rows_affected() > 0)
    }

    async fn create_comment(&self, comment: &Comment) -> Result<()> {
        let mut tx = self.pool.begin().await.context("Failed to begin transaction")?;

        let parent = sqlx::query("SELECT 1 FROM posts WHERE id = ?")
            .bind(uuid_to_blob(comment.post_id))
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to load parent post")?;
        if parent.is_none() {
            return Err(AppError::not_found("Post", comment.post_id));
        }

        sqlx::query("INSERT INTO comments (id, post_id, author_id, content, image_path, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)")
            .bind(uuid_to_blob(comment.id))
            .bind(uuid_to_blob(comment.post_id))
            .bind(uuid_to_blob(comment.author_id))
            .bind(&comment.content)
            .bind(&comment.image_path)
            .bind(comment.created_at)
            .bind(comment.updated_at)
            .execute(&mut *tx)
            .await
            .context("Failed to insert comment")?;

        tx.commit().await.context("Failed to commit comment")?;
        Ok(())
    }

    async fn get_comment(&self, id: Uuid) -> Result<Option<Comment>> {
        let row = sqlx::query("SELECT * FROM comments WHERE id = ?")
            .bind(uuid_to_blob(id))
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load comment")?;

        row.as_ref().map(comment_from_row).transpose()
    }

    async fn list_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
        let rows = sqlx::query("SELECT * FROM comments WHERE post_id = ? ORDER BY created_at DESC, id DESC")
            .bind(uuid_to_blob(post_id))
            .fetch_all(&self.pool)
            .await
            .context("Failed to list comments")?;

        rows.iter().map(comment_from_row).collect()
    }

    async fn delete_comment(&self, id: Uuid) -> Result<()> {
        let deleted = sqlx::query("DELETE FROM comments WHERE id = ?")
            .bind(uuid_to_blob(id))
            .execute(&self.pool)
            .await
            .context("Failed to delete comment")?;

        if deleted.rows_affected() == 0 {
            return Err(AppError::not_found("Comment", id));
        }
        Ok(())
    }
}
