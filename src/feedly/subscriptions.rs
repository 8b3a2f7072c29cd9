//! Feed directory: subscriptions merged with unread marker counts.
use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use super::client::{FeedlyClient, FeedlyError};
use crate::model::{compare_titles, Feed, UNGROUPED_LABEL};

#[derive(Debug, Deserialize)]
pub(crate) struct Subscription {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub categories: Option<Vec<Category>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Category {
    pub id: Option<String>,
    pub label: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct MarkerCounts {
    #[serde(default)]
    pub unreadcounts: Option<Vec<UnreadCount>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnreadCount {
    pub id: Option<String>,
    pub count: Option<i64>,
}

/// Derive display group labels from a subscription's categories.
///
/// Prefers the category label; otherwise uses the last path segment of the
/// category id without its `global.` prefix. Labels are trimmed and
/// deduplicated in order. No usable label yields `["Ungrouped"]`.
pub(crate) fn infer_groups(subscription: &Subscription) -> Vec<String> {
    let mut seen = HashSet::new();
    let groups: Vec<String> = subscription
        .categories
        .iter()
        .flatten()
        .filter_map(|category| {
            let label = category.label.as_deref().map(str::trim).unwrap_or("");
            let name = if label.is_empty() {
                category
                    .id
                    .as_deref()
                    .and_then(|id| id.rsplit('/').next())
                    .map(|segment| segment.strip_prefix("global.").unwrap_or(segment))
                    .unwrap_or("")
                    .trim()
            } else {
                label
            };
            (!name.is_empty()).then(|| name.to_string())
        })
        .filter(|name| seen.insert(name.clone()))
        .collect();

    if groups.is_empty() {
        vec![UNGROUPED_LABEL.to_string()]
    } else {
        groups
    }
}

/// Merge subscriptions with unread counts into sorted feeds.
pub(crate) fn build_feeds(subscriptions: Vec<Subscription>, counts: MarkerCounts) -> Vec<Feed> {
    let unread_by_stream: HashMap<String, u32> = counts
        .unreadcounts
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| {
            let id = item.id.filter(|id| !id.is_empty())?;
            let count = item.count.unwrap_or(0).clamp(0, i64::from(u32::MAX)) as u32;
            Some((id, count))
        })
        .collect();

    let mut feeds: Vec<Feed> = subscriptions
        .into_iter()
        .filter_map(|subscription| {
            let id = subscription.id.clone().filter(|id| !id.is_empty())?;
            let title = subscription
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or("Untitled feed")
                .to_string();
            let groups = infer_groups(&subscription);
            let unread_count = unread_by_stream.get(&id).copied().unwrap_or(0);
            Some(Feed {
                id,
                title,
                groups,
                unread_count,
            })
        })
        .collect();

    feeds.sort_by(|left, right| compare_titles(&left.title, &right.title));
    feeds
}

impl FeedlyClient {
    /// Load subscribed feeds with unread counts, sorted by title.
    ///
    /// Unread counts are best effort: if the counts call fails, every feed
    /// reports zero unread rather than failing the whole directory.
    ///
    /// # Errors
    ///
    /// Any error from the `/v3/subscriptions` call, such as
    /// [`FeedlyError::Unauthorized`] for a rejected token.
    pub async fn fetch_feeds(&self) -> Result<Vec<Feed>, FeedlyError> {
        let subscriptions: Option<Vec<Subscription>> =
            self.get_json(self.endpoint("/v3/subscriptions", &[])).await?;

        let counts = match self
            .get_json::<MarkerCounts>(self.endpoint("/v3/markers/counts", &[]))
            .await
        {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load unread counts, showing zero");
                MarkerCounts::default()
            }
        };

        let feeds = build_feeds(subscriptions.unwrap_or_default(), counts);
        tracing::debug!(feeds = feeds.len(), "Loaded Feedly subscriptions");
        Ok(feeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn subscription(json: &str) -> Subscription {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_infer_groups_prefers_label() {
        let sub = subscription(
            r#"{"id":"feed/a","categories":[{"id":"user/1/category/tech","label":" Tech "}]}"#,
        );
        assert_eq!(infer_groups(&sub), vec!["Tech"]);
    }

    #[test]
    fn test_infer_groups_from_category_id() {
        let sub = subscription(
            r#"{"id":"feed/a","categories":[{"id":"user/1/category/global.must"},{"id":"user/1/category/news"}]}"#,
        );
        assert_eq!(infer_groups(&sub), vec!["must", "news"]);
    }

    #[test]
    fn test_infer_groups_dedupes() {
        let sub = subscription(
            r#"{"id":"feed/a","categories":[{"label":"News"},{"id":"user/1/category/News"}]}"#,
        );
        assert_eq!(infer_groups(&sub), vec!["News"]);
    }

    #[test]
    fn test_infer_groups_default() {
        assert_eq!(infer_groups(&subscription(r#"{"id":"feed/a"}"#)), vec!["Ungrouped"]);
        assert_eq!(
            infer_groups(&subscription(r#"{"id":"feed/a","categories":[{"label":"  "}]}"#)),
            vec!["Ungrouped"]
        );
    }

    #[test]
    fn test_build_feeds_merges_counts_and_sorts() {
        let subs: Vec<Subscription> = serde_json::from_str(
            r#"[
                {"id":"feed/z","title":"Zeta"},
                {"id":"feed/a","title":"  "},
                {"title":"No id"},
                {"id":"feed/b","title":"Beta"}
            ]"#,
        )
        .unwrap();
        let counts: MarkerCounts = serde_json::from_str(
            r#"{"unreadcounts":[{"id":"feed/z","count":4},{"id":"feed/b","count":-2},{"count":9}]}"#,
        )
        .unwrap();

        let feeds = build_feeds(subs, counts);
        let summary: Vec<(&str, &str, u32)> = feeds
            .iter()
            .map(|f| (f.id.as_str(), f.title.as_str(), f.unread_count))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("feed/b", "Beta", 0),
                ("feed/a", "Untitled feed", 0),
                ("feed/z", "Zeta", 4),
            ]
        );
    }

    #[test]
    fn test_build_feeds_sorts_titles_case_insensitively() {
        let subs: Vec<Subscription> = serde_json::from_str(
            r#"[
                {"id":"feed/z","title":"Zeta"},
                {"id":"feed/a","title":"apple"},
                {"id":"feed/m","title":"Mango"}
            ]"#,
        )
        .unwrap();

        let titles: Vec<String> = build_feeds(subs, MarkerCounts::default())
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, vec!["apple", "Mango", "Zeta"]);
    }
}
