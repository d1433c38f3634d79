//! Bluesky account crawler library.
//!
//! Periodically pulls a single Bluesky account's posts and their direct
//! reply threads from the public API and records them in a local SQLite
//! database with idempotent upsert semantics.

pub mod client;
pub mod config;
pub mod db;
pub mod processor;
