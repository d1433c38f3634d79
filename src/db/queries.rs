use anyhow::{Context, Result};
use sqlx::SqliteExecutor;

use super::models::{NewPost, NewReply, Post, Reply};

// Queries take any SQLite executor so they run against both the pool and
// an open transaction; the processor commits one transaction per feed item.

// ========== Posts ==========

/// Get a post by its remote URI.
pub async fn get_post_by_uri(
    executor: impl SqliteExecutor<'_>,
    post_id: &str,
) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE post_id = ?")
        .bind(post_id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch post by uri")
}

/// Insert a new post, returning its ID.
pub async fn insert_post(executor: impl SqliteExecutor<'_>, post: &NewPost) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO posts (post_id, indexed_at, content)
        VALUES (?, ?, ?)
        ",
    )
    .bind(&post.post_id)
    .bind(&post.indexed_at)
    .bind(&post.content)
    .execute(executor)
    .await
    .context("Failed to insert post")?;

    Ok(result.last_insert_rowid())
}

/// Update an existing post in place with freshly observed values.
pub async fn update_post(executor: impl SqliteExecutor<'_>, id: i64, post: &NewPost) -> Result<()> {
    sqlx::query(
        r"
        UPDATE posts
        SET indexed_at = ?, content = ?, processed_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(&post.indexed_at)
    .bind(&post.content)
    .bind(id)
    .execute(executor)
    .await
    .context("Failed to update post")?;

    Ok(())
}

/// Count stored posts.
pub async fn count_posts(executor: impl SqliteExecutor<'_>) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM posts")
        .fetch_one(executor)
        .await
        .context("Failed to count posts")?;
    Ok(count)
}

// ========== Replies ==========

/// Get a reply by its remote URI.
pub async fn get_reply_by_uri(
    executor: impl SqliteExecutor<'_>,
    reply_id: &str,
) -> Result<Option<Reply>> {
    sqlx::query_as("SELECT * FROM replies WHERE reply_id = ?")
        .bind(reply_id)
        .fetch_optional(executor)
        .await
        .context("Failed to fetch reply by uri")
}

/// Insert a new reply, returning its ID.
pub async fn insert_reply(executor: impl SqliteExecutor<'_>, reply: &NewReply) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO replies (reply_id, post_id, indexed_at, content)
        VALUES (?, ?, ?, ?)
        ",
    )
    .bind(&reply.reply_id)
    .bind(&reply.post_id)
    .bind(&reply.indexed_at)
    .bind(&reply.content)
    .execute(executor)
    .await
    .context("Failed to insert reply")?;

    Ok(result.last_insert_rowid())
}

/// Update an existing reply in place with freshly observed values.
pub async fn update_reply(
    executor: impl SqliteExecutor<'_>,
    id: i64,
    reply: &NewReply,
) -> Result<()> {
    sqlx::query(
        r"
        UPDATE replies
        SET indexed_at = ?, content = ?, processed_at = datetime('now')
        WHERE id = ?
        ",
    )
    .bind(&reply.indexed_at)
    .bind(&reply.content)
    .bind(id)
    .execute(executor)
    .await
    .context("Failed to update reply")?;

    Ok(())
}

/// Count stored replies.
pub async fn count_replies(executor: impl SqliteExecutor<'_>) -> Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM replies")
        .fetch_one(executor)
        .await
        .context("Failed to count replies")?;
    Ok(count)
}

/// Get all posts ordered by insertion (autoincrement) order.
pub async fn get_posts_in_insertion_order(executor: impl SqliteExecutor<'_>) -> Result<Vec<Post>> {
    sqlx::query_as("SELECT * FROM posts ORDER BY id ASC")
        .fetch_all(executor)
        .await
        .context("Failed to fetch posts")
}

/// Get the replies stored for a post, ordered by insertion.
pub async fn get_replies_for_post(
    executor: impl SqliteExecutor<'_>,
    post_id: &str,
) -> Result<Vec<Reply>> {
    sqlx::query_as("SELECT * FROM replies WHERE post_id = ? ORDER BY id ASC")
        .bind(post_id)
        .fetch_all(executor)
        .await
        .context("Failed to fetch replies for post")
}
