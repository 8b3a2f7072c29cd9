//! Pending "mark read" queue.
//!
//! Read actions are queued locally and flushed to Feedly as one batch. The
//! queue is snapshotted when a sync begins; only the snapshotted items are
//! removed when the sync commits, so anything queued while the request is in
//! flight stays pending for the next sync.
use std::collections::{HashMap, HashSet};

use crate::model::Entry;

/// One pending local "mark read" action.
///
/// `feed_id` is always a real feed: never empty and never the aggregate id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub entry_id: String,
    pub feed_id: String,
}

/// Sync state of a queued entry.
///
/// Committed items leave the queue, so only these two states are observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemState {
    /// Queued, not part of any in-flight batch.
    Unsynced,
    /// Included in the batch of the sync currently in flight.
    InFlight,
}

/// Immutable snapshot of the queue taken when a sync begins.
#[derive(Debug, Clone)]
pub struct SyncBatch {
    items: Vec<QueueItem>,
}

impl SyncBatch {
    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entry ids in queue order, for the remote request.
    pub fn entry_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.entry_id.clone()).collect()
    }

    /// Set of entry ids, for pruning the entry list.
    pub fn id_set(&self) -> HashSet<&str> {
        self.items.iter().map(|item| item.entry_id.as_str()).collect()
    }

    /// How many batch items belong to each feed.
    pub fn counts_by_feed(&self) -> HashMap<&str, u32> {
        let mut counts = HashMap::new();
        for item in &self.items {
            *counts.entry(item.feed_id.as_str()).or_insert(0) += 1;
        }
        counts
    }
}

/// Ordered set of pending read actions plus the single-flight sync gate.
#[derive(Debug, Default)]
pub struct ReadQueue {
    items: Vec<QueueItem>,
    pending: HashSet<String>,
    in_flight: HashSet<String>,
    syncing: bool,
}

impl ReadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn is_pending(&self, entry_id: &str) -> bool {
        self.pending.contains(entry_id)
    }

    pub fn is_syncing(&self) -> bool {
        self.syncing
    }

    pub fn state_of(&self, entry_id: &str) -> Option<ItemState> {
        if !self.pending.contains(entry_id) {
            return None;
        }
        if self.in_flight.contains(entry_id) {
            Some(ItemState::InFlight)
        } else {
            Some(ItemState::Unsynced)
        }
    }

    /// Queue (`checked`) or unqueue a single entry.
    ///
    /// Entries that resolve to no feed, or to the aggregate view, are ignored
    /// in both directions. Unchecking an entry that is part of the in-flight
    /// batch drops it from the queue right away.
    ///
    /// # Arguments
    ///
    /// * `entry` - The entry the user toggled
    /// * `checked` - `true` to queue it as read, `false` to unqueue it
    /// * `fallback_feed_id` - Owner to use when the entry carries no feed id,
    ///   normally the selected feed
    ///
    /// # Returns
    ///
    /// `true` if the queue changed.
    pub fn enqueue_single(&mut self, entry: &Entry, checked: bool, fallback_feed_id: Option<&str>) -> bool {
        let Some(feed_id) = entry.resolve_feed_id(fallback_feed_id) else {
            tracing::trace!(entry_id = %entry.id, "No real feed for entry, ignoring read toggle");
            return false;
        };

        if !checked {
            return self.remove(&entry.id);
        }

        if self.pending.contains(&entry.id) {
            return false;
        }

        self.push(QueueItem {
            entry_id: entry.id.clone(),
            feed_id: feed_id.to_string(),
        });
        true
    }

    /// Queue every entry in `entries` that resolves to a real feed and is not
    /// already pending. Does nothing while a sync is in flight.
    ///
    /// Returns the number of newly queued entries.
    pub fn enqueue_all_visible(&mut self, entries: &[Entry], fallback_feed_id: Option<&str>) -> usize {
        if self.syncing || entries.is_empty() {
            return 0;
        }

        let mut added = 0;
        for entry in entries {
            let Some(feed_id) = entry.resolve_feed_id(fallback_feed_id) else {
                continue;
            };
            if self.pending.contains(&entry.id) {
                continue;
            }
            self.push(QueueItem {
                entry_id: entry.id.clone(),
                feed_id: feed_id.to_string(),
            });
            added += 1;
        }

        if added > 0 {
            tracing::debug!(added, pending = self.items.len(), "Queued visible entries as read");
        }
        added
    }

    /// Snapshot the queue and mark a sync as in flight.
    ///
    /// Every queued item becomes [`ItemState::InFlight`] until the sync is
    /// committed or finished.
    ///
    /// # Returns
    ///
    /// The batch to send, or `None` when the queue is empty or a sync is
    /// already running.
    pub fn begin_sync(&mut self) -> Option<SyncBatch> {
        if self.syncing || self.items.is_empty() {
            return None;
        }

        self.syncing = true;
        self.in_flight = self.pending.clone();
        Some(SyncBatch {
            items: self.items.clone(),
        })
    }

    /// Remove exactly the batch's items after a confirmed remote commit.
    ///
    /// Items queued after the batch was taken are kept.
    pub fn commit(&mut self, batch: &SyncBatch) {
        let committed = batch.id_set();
        self.items
            .retain(|item| !committed.contains(item.entry_id.as_str()));
        self.pending
            .retain(|entry_id| !committed.contains(entry_id.as_str()));
        self.finish_sync();
    }

    /// End the in-flight sync without touching queued items.
    ///
    /// Safe to call more than once; the second call is a no-op.
    pub fn finish_sync(&mut self) {
        self.syncing = false;
        self.in_flight.clear();
    }

    fn push(&mut self, item: QueueItem) {
        self.pending.insert(item.entry_id.clone());
        self.items.push(item);
    }

    fn remove(&mut self, entry_id: &str) -> bool {
        if !self.pending.remove(entry_id) {
            return false;
        }
        self.in_flight.remove(entry_id);
        self.items.retain(|item| item.entry_id != entry_id);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ALL_FEEDS_ID;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn entry(id: &str, feed_id: &str) -> Entry {
        Entry {
            id: id.to_string(),
            feed_id: feed_id.to_string(),
            title: format!("Entry {id}"),
            summary: String::new(),
            source: "Example".to_string(),
            published: 1_700_000_000_000,
            age_timestamp: 1_700_000_000_000,
            url: None,
        }
    }

    fn ids(queue: &ReadQueue) -> Vec<&str> {
        queue.items().iter().map(|i| i.entry_id.as_str()).collect()
    }

    #[test]
    fn test_enqueue_single_is_idempotent() {
        let mut queue = ReadQueue::new();
        let a = entry("a", "feed/1");

        assert!(queue.enqueue_single(&a, true, None));
        assert!(!queue.enqueue_single(&a, true, None));

        assert_eq!(queue.len(), 1);
        assert!(queue.is_pending("a"));
    }

    #[test]
    fn test_enqueue_single_uses_fallback_feed() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", ""), true, Some("feed/9"));

        assert_eq!(
            queue.items(),
            &[QueueItem {
                entry_id: "a".to_string(),
                feed_id: "feed/9".to_string(),
            }]
        );
    }

    #[test]
    fn test_enqueue_single_aggregate_guard() {
        let mut queue = ReadQueue::new();
        assert!(!queue.enqueue_single(&entry("a", ""), true, Some(ALL_FEEDS_ID)));
        assert!(!queue.enqueue_single(&entry("b", ""), true, None));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unchecked_with_unresolvable_feed_keeps_item() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", ""), true, Some("feed/1"));

        // Same entry seen from the aggregate view cannot be resolved, so the
        // toggle is ignored entirely.
        assert!(!queue.enqueue_single(&entry("a", ""), false, Some(ALL_FEEDS_ID)));
        assert!(queue.is_pending("a"));
    }

    #[test]
    fn test_toggle_off_removes() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("x", "feed/1"), true, None);
        let before = queue.len();

        let a = entry("a", "feed/1");
        queue.enqueue_single(&a, true, None);
        assert!(queue.enqueue_single(&a, false, None));

        assert_eq!(queue.len(), before);
        assert!(!queue.is_pending("a"));
        // Removing a non-member is a no-op
        assert!(!queue.enqueue_single(&a, false, None));
    }

    #[test]
    fn test_enqueue_all_visible_is_union() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("b", "feed/1"), true, None);

        let visible = vec![
            entry("a", "feed/1"),
            entry("b", "feed/1"),
            entry("c", "feed/2"),
            entry("d", ""),
        ];
        let added = queue.enqueue_all_visible(&visible, Some(ALL_FEEDS_ID));

        assert_eq!(added, 2);
        assert_eq!(ids(&queue), vec!["b", "a", "c"]);

        assert_eq!(queue.enqueue_all_visible(&visible, Some(ALL_FEEDS_ID)), 0);
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_enqueue_all_visible_dedupes_within_call() {
        let mut queue = ReadQueue::new();
        let visible = vec![entry("a", "feed/1"), entry("a", "feed/1")];
        assert_eq!(queue.enqueue_all_visible(&visible, None), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_enqueue_all_visible_noop_while_syncing() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", "feed/1"), true, None);
        let _batch = queue.begin_sync().unwrap();

        assert_eq!(queue.enqueue_all_visible(&[entry("b", "feed/1")], None), 0);
        assert!(!queue.is_pending("b"));
    }

    #[test]
    fn test_begin_sync_empty_queue() {
        let mut queue = ReadQueue::new();
        assert!(queue.begin_sync().is_none());
        assert!(!queue.is_syncing());
    }

    #[test]
    fn test_begin_sync_single_flight() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", "feed/1"), true, None);

        let batch = queue.begin_sync().unwrap();
        assert_eq!(batch.len(), 1);
        assert!(queue.is_syncing());
        assert!(queue.begin_sync().is_none());
    }

    #[test]
    fn test_item_states_through_sync() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", "feed/1"), true, None);
        assert_eq!(queue.state_of("a"), Some(ItemState::Unsynced));

        let batch = queue.begin_sync().unwrap();
        queue.enqueue_single(&entry("b", "feed/1"), true, None);
        assert_eq!(queue.state_of("a"), Some(ItemState::InFlight));
        assert_eq!(queue.state_of("b"), Some(ItemState::Unsynced));

        queue.commit(&batch);
        assert_eq!(queue.state_of("a"), None);
        assert_eq!(queue.state_of("b"), Some(ItemState::Unsynced));
        assert!(!queue.is_syncing());
    }

    #[test]
    fn test_failed_sync_returns_items_to_unsynced() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", "feed/1"), true, None);
        let _batch = queue.begin_sync().unwrap();

        queue.finish_sync();

        assert_eq!(queue.state_of("a"), Some(ItemState::Unsynced));
        assert_eq!(queue.len(), 1);
        assert!(!queue.is_syncing());
    }

    #[test]
    fn test_batch_counts_by_feed() {
        let mut queue = ReadQueue::new();
        queue.enqueue_single(&entry("a", "feed/1"), true, None);
        queue.enqueue_single(&entry("b", "feed/1"), true, None);
        queue.enqueue_single(&entry("c", "feed/2"), true, None);

        let batch = queue.begin_sync().unwrap();
        let counts = batch.counts_by_feed();

        assert_eq!(counts.get("feed/1"), Some(&2));
        assert_eq!(counts.get("feed/2"), Some(&1));
        assert_eq!(batch.entry_ids(), vec!["a", "b", "c"]);
    }

    proptest! {
        #[test]
        fn prop_pending_set_matches_items(ops in proptest::collection::vec((0u8..8, any::<bool>()), 0..64)) {
            let mut queue = ReadQueue::new();
            for (n, checked) in ops {
                let e = entry(&format!("e{n}"), "feed/1");
                queue.enqueue_single(&e, checked, None);
            }

            let from_items: HashSet<&str> = queue.items().iter().map(|i| i.entry_id.as_str()).collect();
            prop_assert_eq!(from_items.len(), queue.len());
            for id in &from_items {
                prop_assert!(queue.is_pending(id));
            }
        }

        #[test]
        fn prop_bulk_enqueue_is_set_union(
            first in proptest::collection::vec(0u8..16, 0..16),
            second in proptest::collection::vec(0u8..16, 0..16),
        ) {
            let mut queue = ReadQueue::new();
            let to_entries = |ns: &[u8]| ns.iter().map(|n| entry(&format!("e{n}"), "feed/1")).collect::<Vec<_>>();

            queue.enqueue_all_visible(&to_entries(&first[..]), None);
            queue.enqueue_all_visible(&to_entries(&second[..]), None);

            let expected: HashSet<String> = first.iter().chain(second.iter()).map(|n| format!("e{n}")).collect();
            let actual: HashSet<String> = queue.items().iter().map(|i| i.entry_id.clone()).collect();
            prop_assert_eq!(queue.len(), expected.len());
            prop_assert_eq!(actual, expected);
        }
    }
}
