use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Reserved feed id for the synthetic "all feeds" view.
///
/// Feedly stream ids for real feeds always start with `feed/`, so this value
/// can never collect unread-count mutations of its own.
pub const ALL_FEEDS_ID: &str = "__all__";

/// Group label used for feeds without any category.
pub const UNGROUPED_LABEL: &str = "Ungrouped";

/// Returns true when `feed_id` names the aggregate view rather than a real feed.
pub fn is_aggregate(feed_id: &str) -> bool {
    feed_id == ALL_FEEDS_ID
}

/// Display order for feed titles.
///
/// Case-insensitive, so "apple" sorts before "Zeta"; titles equal up to case
/// fall back to a byte comparison to keep the order total.
///
/// ```
/// use skimly::model::compare_titles;
/// use std::cmp::Ordering;
///
/// assert_eq!(compare_titles("apple", "Zeta"), Ordering::Less);
/// assert_eq!(compare_titles("Beta", "beta"), Ordering::Less);
/// ```
pub fn compare_titles(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| left.cmp(right))
}

// ============================================================================
// Data Structures
// ============================================================================

/// A subscribed feed with its unread counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub id: String,
    pub title: String,
    /// Category labels. Never empty once produced by the Feedly client.
    pub groups: Vec<String>,
    pub unread_count: u32,
}

impl Feed {
    /// Group labels, with the "Ungrouped" default applied.
    pub fn group_labels(&self) -> Vec<&str> {
        if self.groups.is_empty() {
            vec![UNGROUPED_LABEL]
        } else {
            self.groups.iter().map(String::as_str).collect()
        }
    }
}

/// An unread entry as returned by a stream fetch.
///
/// Timestamps are epoch milliseconds as Feedly reports them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: String,
    /// Owning feed id. Empty when Feedly did not report an origin stream.
    pub feed_id: String,
    pub title: String,
    pub summary: String,
    pub source: String,
    pub published: i64,
    /// Recency key: crawl time, else update time, else publish time.
    pub age_timestamp: i64,
    pub url: Option<String>,
}

impl Entry {
    /// Resolve the feed this entry's read action should be attributed to.
    ///
    /// Uses the entry's own feed id when present, otherwise `fallback`.
    /// Returns `None` when neither yields a real (non-aggregate) feed.
    pub fn resolve_feed_id<'a>(&'a self, fallback: Option<&'a str>) -> Option<&'a str> {
        let resolved = if self.feed_id.is_empty() {
            fallback?
        } else {
            self.feed_id.as_str()
        };

        if resolved.is_empty() || is_aggregate(resolved) {
            None
        } else {
            Some(resolved)
        }
    }
}

// ============================================================================
// View Options
// ============================================================================

/// Entry ordering by age timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newest" => Ok(SortOrder::Newest),
            "oldest" => Ok(SortOrder::Oldest),
            other => Err(format!("unknown sort order '{other}' (expected newest or oldest)")),
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortOrder::Newest => f.write_str("newest"),
            SortOrder::Oldest => f.write_str("oldest"),
        }
    }
}

/// Number of unread entries requested per stream fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArticleCount {
    #[default]
    Ten,
    TwentyFive,
    Fifty,
    Hundred,
}

impl ArticleCount {
    pub const OPTIONS: [ArticleCount; 4] = [
        ArticleCount::Ten,
        ArticleCount::TwentyFive,
        ArticleCount::Fifty,
        ArticleCount::Hundred,
    ];

    pub fn get(self) -> u32 {
        match self {
            ArticleCount::Ten => 10,
            ArticleCount::TwentyFive => 25,
            ArticleCount::Fifty => 50,
            ArticleCount::Hundred => 100,
        }
    }

    /// Map a requested count onto a supported option, falling back to the default.
    pub fn from_requested(requested: u32) -> Self {
        match Self::try_from(requested) {
            Ok(count) => count,
            Err(()) => {
                tracing::debug!(requested, "Unsupported article count, using default");
                Self::default()
            }
        }
    }
}

impl TryFrom<u32> for ArticleCount {
    type Error = ();

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::OPTIONS
            .into_iter()
            .find(|option| option.get() == value)
            .ok_or(())
    }
}

impl Serialize for ArticleCount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.get())
    }
}

impl<'de> Deserialize<'de> for ArticleCount {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u32::deserialize(deserializer)?;
        Self::try_from(value).map_err(|()| {
            serde::de::Error::custom(format!(
                "unsupported article count {value} (expected 10, 25, 50 or 100)"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(feed_id: &str) -> Entry {
        Entry {
            id: "e1".to_string(),
            feed_id: feed_id.to_string(),
            title: "Title".to_string(),
            summary: String::new(),
            source: "Source".to_string(),
            published: 0,
            age_timestamp: 0,
            url: None,
        }
    }

    #[test]
    fn test_compare_titles_ignores_case() {
        let mut titles = vec!["Zeta", "apple", "beta", "Beta", "Apple"];
        titles.sort_by(|a, b| compare_titles(a, b));
        assert_eq!(titles, vec!["Apple", "apple", "Beta", "beta", "Zeta"]);
    }

    #[test]
    fn test_resolve_prefers_entry_feed() {
        let e = entry("feed/a");
        assert_eq!(e.resolve_feed_id(Some("feed/b")), Some("feed/a"));
    }

    #[test]
    fn test_resolve_falls_back_when_entry_feed_empty() {
        let e = entry("");
        assert_eq!(e.resolve_feed_id(Some("feed/b")), Some("feed/b"));
        assert_eq!(e.resolve_feed_id(None), None);
    }

    #[test]
    fn test_resolve_rejects_aggregate() {
        assert_eq!(entry("").resolve_feed_id(Some(ALL_FEEDS_ID)), None);
        assert_eq!(entry(ALL_FEEDS_ID).resolve_feed_id(Some("feed/b")), None);
        assert_eq!(entry("").resolve_feed_id(Some("")), None);
    }

    #[test]
    fn test_group_labels_default() {
        let feed = Feed {
            id: "feed/a".to_string(),
            title: "A".to_string(),
            groups: Vec::new(),
            unread_count: 0,
        };
        assert_eq!(feed.group_labels(), vec![UNGROUPED_LABEL]);
    }

    #[test]
    fn test_article_count_from_requested() {
        assert_eq!(ArticleCount::from_requested(25).get(), 25);
        assert_eq!(ArticleCount::from_requested(100).get(), 100);
        assert_eq!(ArticleCount::from_requested(7), ArticleCount::Ten);
        assert_eq!(ArticleCount::from_requested(0), ArticleCount::Ten);
    }

    #[test]
    fn test_sort_order_parse() {
        assert_eq!("newest".parse::<SortOrder>(), Ok(SortOrder::Newest));
        assert_eq!(" Oldest ".parse::<SortOrder>(), Ok(SortOrder::Oldest));
        assert!("random".parse::<SortOrder>().is_err());
    }
}
