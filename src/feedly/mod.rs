//! Feedly cloud API client.
//!
//! - [`client`] - authenticated transport, error mapping, size-limited reads
//! - [`subscriptions`] - the feed directory with groups and unread counts
//! - [`streams`] - unread entries for one feed or for all feeds
//! - [`markers`] - batched mark-as-read, the remote side of a read sync
//!
//! # Example
//!
//! ```ignore
//! use skimly::feedly::{build_http_client, FeedlyClient, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
//!
//! let client = FeedlyClient::new(build_http_client()?, DEFAULT_BASE_URL, token, DEFAULT_TIMEOUT)?;
//! let feeds = client.fetch_feeds().await?;
//! let entries = client.fetch_entries(&feeds[0].id, ArticleCount::default()).await?;
//! ```

mod client;
mod markers;
mod streams;
mod subscriptions;

pub use client::{build_http_client, FeedlyClient, FeedlyError, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
