use anyhow::{Context, Result};
use chrono::DateTime;
use tracing::{debug, error, info, warn};

use crate::client::{BlueskyClient, FeedItem};
use crate::db::{self, Database, NewPost, NewReply};

/// Counters for one crawl run.
///
/// Dropped and failed units are counted rather than silently discarded so
/// schema drift in the remote API stays observable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub posts_upserted: usize,
    pub replies_upserted: usize,
    pub items_skipped: usize,
    pub items_failed: usize,
    pub replies_skipped: usize,
    pub replies_failed: usize,
}

impl RunStats {
    fn merge(&mut self, other: Self) {
        self.posts_upserted += other.posts_upserted;
        self.replies_upserted += other.replies_upserted;
        self.items_skipped += other.items_skipped;
        self.items_failed += other.items_failed;
        self.replies_skipped += other.replies_skipped;
        self.replies_failed += other.replies_failed;
    }
}

enum ReplyOutcome {
    Upserted,
    Skipped,
}

/// Processes the author feed and reconciles it against the store.
pub struct FeedProcessor {
    client: BlueskyClient,
    db: Database,
}

impl FeedProcessor {
    #[must_use]
    pub fn new(client: BlueskyClient, db: Database) -> Self {
        Self { client, db }
    }

    /// Run one crawl: fetch the feed, upsert each post and its direct
    /// replies, one committed transaction per feed item.
    ///
    /// Failures are contained at the item and reply boundaries; a single
    /// malformed item rolls back its own transaction and the run continues.
    pub async fn process_feed(&self) -> RunStats {
        let mut stats = RunStats::default();

        let feed = self.client.get_author_feed().await;
        if feed.is_empty() {
            warn!("No feed items returned");
            return stats;
        }

        let total = feed.len();
        info!(items = total, "Processing feed items");

        // Oldest first, so a later observation of the same post lands last
        // and the stored row reflects the most recent state.
        for (idx, item) in feed.iter().rev().enumerate() {
            match self.process_feed_item(item, idx + 1, total).await {
                Ok(outcome) => stats.merge(outcome),
                Err(e) => {
                    error!(error = format!("{e:#}"), "Error processing feed item");
                    stats.items_failed += 1;
                }
            }
        }

        info!(
            posts = stats.posts_upserted,
            replies = stats.replies_upserted,
            items_skipped = stats.items_skipped,
            items_failed = stats.items_failed,
            replies_skipped = stats.replies_skipped,
            replies_failed = stats.replies_failed,
            "Feed run complete"
        );

        stats
    }

    /// Process one feed item and its replies inside a single transaction.
    ///
    /// Missing required fields are a counted skip, not an error; any error
    /// drops the open transaction, rolling the whole item back.
    async fn process_feed_item(
        &self,
        item: &FeedItem,
        idx: usize,
        total: usize,
    ) -> Result<RunStats> {
        let mut outcome = RunStats::default();

        let Some(post) = item.post.as_ref() else {
            warn!("Empty post object in feed item");
            outcome.items_skipped = 1;
            return Ok(outcome);
        };

        let (Some(post_id), Some(raw_timestamp)) = (post.uri.as_deref(), post.indexed_at.as_deref())
        else {
            warn!("Missing required post data");
            outcome.items_skipped = 1;
            return Ok(outcome);
        };

        info!(idx, total, post_id, "Processing post");

        let indexed_at = parse_timestamp(raw_timestamp)
            .with_context(|| format!("Malformed indexedAt for post {post_id}"))?;
        let new_post = NewPost {
            post_id: post_id.to_string(),
            indexed_at,
            content: serialize_record(post.record.as_ref()),
        };

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .context("Failed to begin transaction")?;

        match db::get_post_by_uri(&mut *tx, post_id).await? {
            Some(existing) => {
                debug!(post_id, "Post already exists, updating");
                db::update_post(&mut *tx, existing.id, &new_post).await?;
            }
            None => {
                db::insert_post(&mut *tx, &new_post).await?;
            }
        }
        outcome.posts_upserted = 1;

        let replies = self.client.get_post_replies(post_id).await;
        if !replies.is_empty() {
            info!(count = replies.len(), post_id, "Processing replies");
            for reply in &replies {
                match save_reply(&mut tx, post_id, reply).await {
                    Ok(ReplyOutcome::Upserted) => outcome.replies_upserted += 1,
                    Ok(ReplyOutcome::Skipped) => outcome.replies_skipped += 1,
                    Err(e) => {
                        error!(post_id, error = format!("{e:#}"), "Error saving reply");
                        outcome.replies_failed += 1;
                    }
                }
            }
        }

        tx.commit().await.context("Failed to commit feed item")?;
        Ok(outcome)
    }
}

/// Upsert one reply within the item's open transaction.
///
/// A reply with missing fields is dropped (never stored with nulls).
async fn save_reply(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    post_id: &str,
    reply: &FeedItem,
) -> Result<ReplyOutcome> {
    let Some(reply_post) = reply.post.as_ref() else {
        warn!(post_id, "Empty post object in reply");
        return Ok(ReplyOutcome::Skipped);
    };

    let (Some(reply_id), Some(raw_timestamp)) =
        (reply_post.uri.as_deref(), reply_post.indexed_at.as_deref())
    else {
        warn!(post_id, "Missing required reply data");
        return Ok(ReplyOutcome::Skipped);
    };

    let indexed_at = parse_timestamp(raw_timestamp)
        .with_context(|| format!("Malformed indexedAt for reply {reply_id}"))?;
    let new_reply = NewReply {
        reply_id: reply_id.to_string(),
        post_id: post_id.to_string(),
        indexed_at,
        content: serialize_record(reply_post.record.as_ref()),
    };

    match db::get_reply_by_uri(&mut **tx, reply_id).await? {
        Some(existing) => {
            debug!(reply_id, "Reply already exists, updating");
            db::update_reply(&mut **tx, existing.id, &new_reply).await?;
        }
        None => {
            db::insert_reply(&mut **tx, &new_reply).await?;
        }
    }

    Ok(ReplyOutcome::Upserted)
}

/// Parse an ISO-8601 timestamp, normalizing a trailing `Z` to an explicit
/// UTC offset, and render it back as RFC 3339 for storage.
fn parse_timestamp(raw: &str) -> Result<String> {
    let normalized = raw
        .strip_suffix('Z')
        .map_or_else(|| raw.to_string(), |stripped| format!("{stripped}+00:00"));

    let parsed = DateTime::parse_from_rfc3339(&normalized)
        .with_context(|| format!("Unparsable timestamp: {raw}"))?;
    Ok(parsed.to_rfc3339())
}

fn serialize_record(record: Option<&serde_json::Value>) -> String {
    record.map_or_else(|| "{}".to_string(), ToString::to_string)
}
