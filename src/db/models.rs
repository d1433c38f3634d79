use serde::{Deserialize, Serialize};

/// A stored Bluesky post, one row per distinct remote URI.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub post_id: String,
    pub indexed_at: String,
    pub content: String,
    pub processed_at: String,
}

/// A stored direct reply to a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Reply {
    pub id: i64,
    pub reply_id: String,
    pub post_id: String,
    pub indexed_at: String,
    pub content: String,
    pub processed_at: String,
}

/// Data for inserting or updating a post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_id: String,
    pub indexed_at: String,
    pub content: String,
}

/// Data for inserting or updating a reply.
#[derive(Debug, Clone)]
pub struct NewReply {
    pub reply_id: String,
    pub post_id: String,
    pub indexed_at: String,
    pub content: String,
}
