//! Entry feed: unread stream contents for a feed or for all feeds.
use serde::Deserialize;

use super::client::{FeedlyClient, FeedlyError};
use crate::model::{is_aggregate, ArticleCount, Entry};
use crate::util::strip_html;

const NO_PREVIEW: &str = "No preview available.";

#[derive(Debug, Deserialize)]
struct Profile {
    id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamResponse {
    #[serde(default)]
    pub items: Option<Vec<StreamItem>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamItem {
    pub id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<ContentBlock>,
    pub content: Option<ContentBlock>,
    pub alternate: Option<Vec<Link>>,
    pub canonical: Option<Vec<Link>>,
    pub origin: Option<Origin>,
    pub published: Option<i64>,
    pub updated: Option<i64>,
    pub crawled: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ContentBlock {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    pub href: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Origin {
    pub title: Option<String>,
    pub stream_id: Option<String>,
}

fn first_href(links: Option<&Vec<Link>>) -> Option<&str> {
    links?.first()?.href.as_deref()
}

/// Convert a stream item into an [`Entry`].
///
/// `now_ms` stands in for a missing publish time. Items without an id cannot
/// be marked read later and yield `None`.
pub(crate) fn entry_from_item(item: StreamItem, now_ms: i64) -> Option<Entry> {
    let id = item.id.clone().filter(|id| !id.is_empty())?;
    let published = item.published.unwrap_or(now_ms);
    let age_timestamp = item.crawled.or(item.updated).unwrap_or(published);

    let raw_summary = item
        .summary
        .as_ref()
        .and_then(|block| block.content.as_deref())
        .or_else(|| item.content.as_ref().and_then(|block| block.content.as_deref()))
        .unwrap_or(NO_PREVIEW);

    let url = first_href(item.canonical.as_ref())
        .or_else(|| first_href(item.alternate.as_ref()))
        .filter(|href| !href.is_empty())
        .map(str::to_string);

    let (feed_id, source) = match &item.origin {
        Some(origin) => (
            origin.stream_id.clone().unwrap_or_default(),
            origin
                .title
                .clone()
                .unwrap_or_else(|| "Unknown source".to_string()),
        ),
        None => (String::new(), "Unknown source".to_string()),
    };

    Some(Entry {
        id,
        feed_id,
        title: item.title.clone().unwrap_or_else(|| "(Untitled)".to_string()),
        summary: strip_html(raw_summary),
        source,
        published,
        age_timestamp,
        url,
    })
}

impl FeedlyClient {
    /// Stream id of the user's "all feeds" category.
    ///
    /// # Errors
    ///
    /// [`FeedlyError::MissingProfileId`] when the profile has no id, or any
    /// transport error from the `/v3/profile` call.
    pub async fn all_feeds_stream_id(&self) -> Result<String, FeedlyError> {
        let profile: Profile = self.get_json(self.endpoint("/v3/profile", &[])).await?;
        let profile_id = profile
            .id
            .filter(|id| !id.is_empty())
            .ok_or(FeedlyError::MissingProfileId)?;
        Ok(format!("user/{profile_id}/category/global.all"))
    }

    /// Load up to `count` unread entries, newest first.
    ///
    /// Items Feedly returns without an id are skipped with a warning.
    ///
    /// # Arguments
    ///
    /// * `feed_id` - Feedly stream id; empty or [`ALL_FEEDS_ID`](crate::model::ALL_FEEDS_ID)
    ///   loads the "all feeds" stream
    /// * `count` - How many entries to request
    ///
    /// # Errors
    ///
    /// * [`FeedlyError::MissingProfileId`] - aggregate view and no profile id
    /// * [`FeedlyError::Unauthorized`] - the token was rejected
    /// * [`FeedlyError::HttpStatus`], [`FeedlyError::Network`], [`FeedlyError::Timeout`] - transport failures
    /// * [`FeedlyError::Decode`] - the response is not a stream contents object
    pub async fn fetch_entries(&self, feed_id: &str, count: ArticleCount) -> Result<Vec<Entry>, FeedlyError> {
        let stream_id = if feed_id.is_empty() || is_aggregate(feed_id) {
            self.all_feeds_stream_id().await?
        } else {
            feed_id.to_string()
        };

        let count = count.get().to_string();
        let url = self.endpoint(
            "/v3/streams/contents",
            &[
                ("streamId", stream_id.as_str()),
                ("count", count.as_str()),
                ("ranked", "newest"),
                ("unreadOnly", "true"),
            ],
        );
        let response: StreamResponse = self.get_json(url).await?;

        let now_ms = chrono::Utc::now().timestamp_millis();
        let items = response.items.unwrap_or_default();
        let received = items.len();
        let entries: Vec<Entry> = items
            .into_iter()
            .filter_map(|item| entry_from_item(item, now_ms))
            .collect();

        if entries.len() < received {
            tracing::warn!(
                stream = %stream_id,
                skipped = received - entries.len(),
                "Skipped stream items without an id"
            );
        }

        tracing::debug!(stream = %stream_id, entries = entries.len(), "Loaded unread entries");
        Ok(entries)
    }
}
