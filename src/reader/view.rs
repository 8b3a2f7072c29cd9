//! In-memory feed/entry snapshot for one reading session.
use std::collections::BTreeMap;

use crate::model::{compare_titles, Entry, Feed, SortOrder};
use crate::reader::queue::SyncBatch;

/// Feeds that share a group label, in display order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedGroup<'a> {
    pub name: &'a str,
    pub feeds: Vec<&'a Feed>,
}

/// Feed list, entry list and selections, as last loaded from Feedly.
///
/// Only `apply_commit` changes entries or unread counts after a load; the
/// rest of the mutators replace whole snapshots or move selections.
#[derive(Debug, Default)]
pub struct ReaderView {
    feeds: Vec<Feed>,
    selected_feed_id: Option<String>,
    entries: Vec<Entry>,
    selected_entry_id: Option<String>,
    error: Option<String>,
}

impl ReaderView {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> &[Feed] {
        &self.feeds
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn selected_feed_id(&self) -> Option<&str> {
        self.selected_feed_id.as_deref()
    }

    pub fn selected_entry_id(&self) -> Option<&str> {
        self.selected_entry_id.as_deref()
    }

    pub fn selected_feed(&self) -> Option<&Feed> {
        let id = self.selected_feed_id.as_deref()?;
        self.feeds.iter().find(|feed| feed.id == id)
    }

    pub fn selected_entry(&self) -> Option<&Entry> {
        let id = self.selected_entry_id.as_deref()?;
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Replace the feed list and pick the feed to show.
    ///
    /// Keeps the current selection when it still exists, otherwise prefers the
    /// first feed with unread entries, then the first feed. Returns the id of
    /// the selected feed so the caller can load its entries.
    pub fn replace_feeds(&mut self, feeds: Vec<Feed>) -> Option<String> {
        let next = self
            .selected_feed_id
            .as_deref()
            .and_then(|current| feeds.iter().find(|feed| feed.id == current))
            .or_else(|| feeds.iter().find(|feed| feed.unread_count > 0))
            .or_else(|| feeds.first())
            .map(|feed| feed.id.clone());

        self.feeds = feeds;
        self.selected_feed_id = next.clone();
        if next.is_none() {
            self.entries.clear();
            self.selected_entry_id = None;
        }
        next
    }

    /// Select a feed id, including the aggregate view.
    pub fn select_feed(&mut self, feed_id: impl Into<String>) {
        self.selected_feed_id = Some(feed_id.into());
    }

    /// Replace the entry list, keeping the selected entry if it is still present.
    pub fn replace_entries(&mut self, entries: Vec<Entry>) {
        let keep_selection = self
            .selected_entry_id
            .as_deref()
            .is_some_and(|current| entries.iter().any(|entry| entry.id == current));

        if !keep_selection {
            self.selected_entry_id = entries.first().map(|entry| entry.id.clone());
        }
        self.entries = entries;
    }

    /// Select an entry by id. Returns false if the entry is not loaded.
    pub fn select_entry(&mut self, entry_id: &str) -> bool {
        if self.entries.iter().any(|entry| entry.id == entry_id) {
            self.selected_entry_id = Some(entry_id.to_string());
            true
        } else {
            false
        }
    }

    /// Apply a confirmed remote commit to the snapshot.
    ///
    /// Removes the committed entries, moves the selection off a removed entry
    /// to the first remaining one (or to none), and subtracts the per-feed
    /// counts from the unread counters, never going below 0.
    ///
    /// Call this only after Feedly accepted the batch. It cannot fail; a
    /// rejected batch is simply never applied.
    ///
    /// # Arguments
    ///
    /// * `batch` - The snapshot that was sent, as returned by
    ///   [`ReadQueue::begin_sync`](crate::reader::ReadQueue::begin_sync)
    ///
    /// # Returns
    ///
    /// The number of entries removed from the list.
    pub fn apply_commit(&mut self, batch: &SyncBatch) -> usize {
        let committed = batch.id_set();
        let before = self.entries.len();
        self.entries
            .retain(|entry| !committed.contains(entry.id.as_str()));

        let selection_removed = self
            .selected_entry_id
            .as_deref()
            .is_some_and(|id| committed.contains(id));
        if selection_removed {
            self.selected_entry_id = self.entries.first().map(|entry| entry.id.clone());
        }

        let counts = batch.counts_by_feed();
        for feed in &mut self.feeds {
            if let Some(&read) = counts.get(feed.id.as_str()) {
                feed.unread_count = feed.unread_count.saturating_sub(read);
            }
        }

        before - self.entries.len()
    }

    /// Feeds grouped by label for the sidebar.
    ///
    /// Groups are sorted by name. A feed appears under every label it carries.
    /// Within a group, feeds with unread entries come first, then by title.
    pub fn grouped_feeds(&self) -> Vec<FeedGroup<'_>> {
        let mut groups: BTreeMap<&str, Vec<&Feed>> = BTreeMap::new();
        for feed in &self.feeds {
            for label in feed.group_labels() {
                groups.entry(label).or_default().push(feed);
            }
        }

        groups
            .into_iter()
            .map(|(name, mut feeds)| {
                feeds.sort_by(|left, right| {
                    (right.unread_count > 0)
                        .cmp(&(left.unread_count > 0))
                        .then_with(|| compare_titles(&left.title, &right.title))
                });
                FeedGroup { name, feeds }
            })
            .collect()
    }

    /// Entries ordered for display.
    pub fn sorted_entries(&self, order: SortOrder) -> Vec<&Entry> {
        sort_entries(&self.entries, order)
    }
}

/// Order entries by age timestamp. The sort is stable, so ties keep fetch order.
pub fn sort_entries(entries: &[Entry], order: SortOrder) -> Vec<&Entry> {
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    match order {
        SortOrder::Newest => sorted.sort_by(|a, b| b.age_timestamp.cmp(&a.age_timestamp)),
        SortOrder::Oldest => sorted.sort_by(|a, b| a.age_timestamp.cmp(&b.age_timestamp)),
    }
    sorted
}
