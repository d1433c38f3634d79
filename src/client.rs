use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::config::Config;

const GET_AUTHOR_FEED: &str = "app.bsky.feed.getAuthorFeed";
const GET_POST_THREAD: &str = "app.bsky.feed.getPostThread";

/// HTTP statuses that indicate a transient failure worth retrying.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Error)]
pub enum ClientError {
    /// Network-level error (DNS, connection, TLS, timeout, body decode).
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Non-retryable HTTP response (4xx other than 429).
    #[error("HTTP error: status {0}")]
    Status(u16),
    /// Transient failures persisted past the retry budget.
    #[error("retries exhausted after {0} attempts")]
    RetriesExhausted(u32),
}

/// Client settings for the public Bluesky endpoint.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub actor: String,
    pub base_url: String,
    pub posts_limit: u32,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl ClientConfig {
    /// Defaults suitable for the public unauthenticated endpoint.
    #[must_use]
    pub fn new(actor: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            base_url: "https://public.api.bsky.app/xrpc".to_string(),
            posts_limit: 5,
            request_timeout: Duration::from_secs(10),
            max_retries: 3,
            backoff: Duration::from_millis(300),
        }
    }
}

impl From<&Config> for ClientConfig {
    fn from(config: &Config) -> Self {
        Self {
            actor: config.actor.clone(),
            base_url: config.base_url.clone(),
            posts_limit: config.posts_limit,
            request_timeout: config.request_timeout,
            max_retries: config.max_retries,
            backoff: config.backoff,
        }
    }
}

/// One entry of the author feed (or of a reply thread).
///
/// Every field is optional so remote schema drift degrades to counted
/// drops instead of failing the whole page.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedItem {
    #[serde(default)]
    pub post: Option<PostView>,
}

/// The nested post record inside a feed item or thread reply.
#[derive(Debug, Clone, Deserialize)]
pub struct PostView {
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default, rename = "indexedAt")]
    pub indexed_at: Option<String>,
    #[serde(default)]
    pub record: Option<JsonValue>,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    feed: Vec<FeedItem>,
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    #[serde(default)]
    thread: Option<ThreadView>,
}

#[derive(Debug, Default, Deserialize)]
struct ThreadView {
    #[serde(default)]
    replies: Vec<FeedItem>,
}

/// Client for the public Bluesky API with bounded retry and backoff.
#[derive(Debug, Clone)]
pub struct BlueskyClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl BlueskyClient {
    /// Build a client with a bounded per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be constructed.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(concat!("bluesky-crawler/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { config, http })
    }

    /// Fetch the author's feed, newest-first, at most `posts_limit` entries.
    ///
    /// On unrecoverable failure this logs and returns an empty vec; the
    /// caller proceeds with zero work.
    pub async fn get_author_feed(&self) -> Vec<FeedItem> {
        let params = [
            ("actor", self.config.actor.clone()),
            ("limit", self.config.posts_limit.to_string()),
        ];
        match self.request_json::<FeedResponse>(GET_AUTHOR_FEED, &params).await {
            Ok(response) => response.feed,
            Err(e) => {
                error!(actor = %self.config.actor, error = %e, "Failed to fetch author feed");
                Vec::new()
            }
        }
    }

    /// Fetch the direct replies to a post.
    ///
    /// Same failure policy as [`Self::get_author_feed`]: empty vec on
    /// unrecoverable failure, never an error to the caller.
    pub async fn get_post_replies(&self, uri: &str) -> Vec<FeedItem> {
        let params = [("uri", uri.to_string())];
        match self.request_json::<ThreadResponse>(GET_POST_THREAD, &params).await {
            Ok(response) => response.thread.unwrap_or_default().replies,
            Err(e) => {
                error!(uri = %uri, error = %e, "Failed to fetch post replies");
                Vec::new()
            }
        }
    }

    /// Issue a GET request with bounded retry and exponential backoff.
    ///
    /// Transport errors and retryable statuses (429, 5xx) back off as
    /// `backoff * 2^attempt`; other non-2xx statuses fail immediately.
    async fn request_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut attempt = 0u32;

        loop {
            let result = self.http.get(&url).query(params).send().await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    if attempt >= self.config.max_retries {
                        warn!(endpoint, attempt, error = %e, "Transport error, retries exhausted");
                        return Err(ClientError::RetriesExhausted(attempt + 1));
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(endpoint, attempt, delay_ms = delay.as_millis() as u64, error = %e,
                        "Transport error, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            };

            let status = response.status();
            if RETRYABLE_STATUSES.contains(&status.as_u16()) {
                if attempt >= self.config.max_retries {
                    warn!(endpoint, attempt, status = status.as_u16(), "Retries exhausted");
                    return Err(ClientError::RetriesExhausted(attempt + 1));
                }
                let delay = self.backoff_delay(attempt);
                warn!(endpoint, attempt, status = status.as_u16(),
                    delay_ms = delay.as_millis() as u64, "Transient HTTP error, backing off");
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if !status.is_success() {
                return Err(ClientError::Status(status.as_u16()));
            }

            debug!(endpoint, attempt, "Request succeeded");
            return Ok(response.json::<T>().await?);
        }
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        self.config.backoff * 2u32.saturating_pow(attempt)
    }
}
