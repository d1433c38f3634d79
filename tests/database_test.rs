//! Integration tests for database operations.

use bluesky_crawler::db::{
    count_posts, count_replies, get_post_by_uri, get_reply_by_uri, insert_post, insert_reply,
    update_post, update_reply, Database, NewPost, NewReply,
};
use tempfile::TempDir;

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn sample_post(uri: &str) -> NewPost {
    NewPost {
        post_id: uri.to_string(),
        indexed_at: "2024-01-01T12:00:00+00:00".to_string(),
        content: r#"{"text":"hello"}"#.to_string(),
    }
}

#[tokio::test]
async fn test_insert_and_get_post() {
    let (db, _temp_dir) = setup_db().await;

    let uri = "at://did:plc:abc/app.bsky.feed.post/1";
    let id = insert_post(db.pool(), &sample_post(uri))
        .await
        .expect("Failed to insert post");
    assert!(id > 0);

    let retrieved = get_post_by_uri(db.pool(), uri)
        .await
        .expect("Failed to get post")
        .expect("Post not found");

    assert_eq!(retrieved.post_id, uri);
    assert_eq!(retrieved.indexed_at, "2024-01-01T12:00:00+00:00");
    assert_eq!(retrieved.content, r#"{"text":"hello"}"#);
}

#[tokio::test]
async fn test_get_missing_post_returns_none() {
    let (db, _temp_dir) = setup_db().await;

    let result = get_post_by_uri(db.pool(), "at://nonexistent")
        .await
        .expect("Failed to query");
    assert!(result.is_none());
}

#[tokio::test]
async fn test_update_post_in_place() {
    let (db, _temp_dir) = setup_db().await;

    let uri = "at://did:plc:abc/app.bsky.feed.post/1";
    let id = insert_post(db.pool(), &sample_post(uri)).await.unwrap();

    let updated = NewPost {
        post_id: uri.to_string(),
        indexed_at: "2024-02-01T12:00:00+00:00".to_string(),
        content: r#"{"text":"edited"}"#.to_string(),
    };
    update_post(db.pool(), id, &updated)
        .await
        .expect("Failed to update post");

    let retrieved = get_post_by_uri(db.pool(), uri).await.unwrap().unwrap();
    assert_eq!(retrieved.id, id);
    assert_eq!(retrieved.indexed_at, "2024-02-01T12:00:00+00:00");
    assert_eq!(retrieved.content, r#"{"text":"edited"}"#);

    // Still exactly one row for the natural key
    assert_eq!(count_posts(db.pool()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_duplicate_post_uri_rejected() {
    let (db, _temp_dir) = setup_db().await;

    let uri = "at://did:plc:abc/app.bsky.feed.post/1";
    insert_post(db.pool(), &sample_post(uri)).await.unwrap();

    let result = insert_post(db.pool(), &sample_post(uri)).await;
    assert!(result.is_err(), "Second insert of same post_id should fail");
    assert_eq!(count_posts(db.pool()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_insert_and_update_reply() {
    let (db, _temp_dir) = setup_db().await;

    let parent = "at://did:plc:abc/app.bsky.feed.post/1";
    insert_post(db.pool(), &sample_post(parent)).await.unwrap();

    let reply_uri = "at://did:plc:xyz/app.bsky.feed.post/9";
    let new_reply = NewReply {
        reply_id: reply_uri.to_string(),
        post_id: parent.to_string(),
        indexed_at: "2024-01-01T13:00:00+00:00".to_string(),
        content: r#"{"text":"nice post"}"#.to_string(),
    };
    let id = insert_reply(db.pool(), &new_reply)
        .await
        .expect("Failed to insert reply");

    let retrieved = get_reply_by_uri(db.pool(), reply_uri)
        .await
        .unwrap()
        .expect("Reply not found");
    assert_eq!(retrieved.post_id, parent);

    let updated = NewReply {
        indexed_at: "2024-01-01T14:00:00+00:00".to_string(),
        ..new_reply
    };
    update_reply(db.pool(), id, &updated)
        .await
        .expect("Failed to update reply");

    let retrieved = get_reply_by_uri(db.pool(), reply_uri).await.unwrap().unwrap();
    assert_eq!(retrieved.indexed_at, "2024-01-01T14:00:00+00:00");
    assert_eq!(count_replies(db.pool()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_reopening_database_preserves_rows() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.sqlite");

    {
        let db = Database::new(&db_path).await.unwrap();
        insert_post(db.pool(), &sample_post("at://did:plc:abc/app.bsky.feed.post/1"))
            .await
            .unwrap();
    }

    // Re-initialization must be idempotent: migrations rerun without data loss
    let db = Database::new(&db_path).await.unwrap();
    assert_eq!(count_posts(db.pool()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_creates_missing_parent_directory() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("nested").join("dirs").join("test.sqlite");

    let db = Database::new(&db_path).await.expect("Failed to create database");
    assert_eq!(count_posts(db.pool()).await.unwrap(), 0);
    assert!(db_path.exists());
}
