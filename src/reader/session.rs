//! Session handle tying the read queue, the view snapshot and Feedly together.
//!
//! All state sits behind one `std::sync::Mutex`. Locks are only taken for
//! synchronous bookkeeping and are always released before awaiting the remote
//! call, so other tasks can keep queueing reads while a sync is in flight.
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::feedly::FeedlyError;
use crate::model::{Entry, Feed};
use crate::reader::queue::{ItemState, ReadQueue};
use crate::reader::view::ReaderView;

/// Message shown when a sync fails, whatever the cause.
pub const SYNC_ERROR_MESSAGE: &str = "Unable to sync read articles.";

/// Remote side of a sync: marks a batch of entries read upstream.
///
/// Any error is treated as a failure of the whole batch.
pub trait MarkReadService: Send + Sync {
    fn mark_read(&self, entry_ids: &[String]) -> impl Future<Output = Result<(), FeedlyError>> + Send;
}

impl<S: MarkReadService> MarkReadService for Arc<S> {
    fn mark_read(&self, entry_ids: &[String]) -> impl Future<Output = Result<(), FeedlyError>> + Send {
        (**self).mark_read(entry_ids)
    }
}

/// Why a sync call did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyQueue,
    AlreadySyncing,
}

/// Result of one `sync()` call. Failures are reported here, never as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    Skipped(SkipReason),
    Committed {
        /// Entries sent in the batch.
        synced: usize,
        /// Entries removed from the visible list.
        removed: usize,
    },
    Failed,
}

#[derive(Debug, Default)]
struct SessionState {
    view: ReaderView,
    queue: ReadQueue,
}

struct Inner<S> {
    state: Mutex<SessionState>,
    service: S,
}

/// Cloneable handle to one user's reading session.
pub struct ReaderSession<S> {
    inner: Arc<Inner<S>>,
}

impl<S> Clone for ReaderSession<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Ends the flight if the sync future is dropped before it settles.
///
/// Both settled paths release the flight under the same lock that records
/// their outcome and then disarm the guard. Releasing it again after the lock
/// was dropped would clear the flag of a sync another handle started in
/// between.
struct SyncGuard<'a> {
    state: &'a Mutex<SessionState>,
    armed: bool,
}

impl SyncGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SyncGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            lock(self.state).queue.finish_sync();
        }
    }
}

fn lock(state: &Mutex<SessionState>) -> MutexGuard<'_, SessionState> {
    // No operation leaves the state half-updated across a panic point, so a
    // poisoned lock is still consistent.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<S: MarkReadService> ReaderSession<S> {
    pub fn new(service: S) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(SessionState::default()),
                service,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.inner.state)
    }

    // ------------------------------------------------------------------------
    // Snapshot loading and selection
    // ------------------------------------------------------------------------

    /// See [`ReaderView::replace_feeds`].
    pub fn replace_feeds(&self, feeds: Vec<Feed>) -> Option<String> {
        self.state().view.replace_feeds(feeds)
    }

    /// See [`ReaderView::replace_entries`].
    pub fn replace_entries(&self, entries: Vec<Entry>) {
        self.state().view.replace_entries(entries);
    }

    pub fn select_feed(&self, feed_id: impl Into<String>) {
        self.state().view.select_feed(feed_id);
    }

    pub fn select_entry(&self, entry_id: &str) -> bool {
        self.state().view.select_entry(entry_id)
    }

    pub fn feeds(&self) -> Vec<Feed> {
        self.state().view.feeds().to_vec()
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.state().view.entries().to_vec()
    }

    pub fn selected_feed_id(&self) -> Option<String> {
        self.state().view.selected_feed_id().map(str::to_string)
    }

    pub fn selected_entry_id(&self) -> Option<String> {
        self.state().view.selected_entry_id().map(str::to_string)
    }

    pub fn error(&self) -> Option<String> {
        self.state().view.error().map(str::to_string)
    }

    /// Run `f` against the view without copying it out.
    pub fn with_view<R>(&self, f: impl FnOnce(&ReaderView) -> R) -> R {
        f(&self.state().view)
    }

    // ------------------------------------------------------------------------
    // Queue
    // ------------------------------------------------------------------------

    pub fn pending_count(&self) -> usize {
        self.state().queue.len()
    }

    pub fn is_pending(&self, entry_id: &str) -> bool {
        self.state().queue.is_pending(entry_id)
    }

    pub fn item_state(&self, entry_id: &str) -> Option<ItemState> {
        self.state().queue.state_of(entry_id)
    }

    pub fn is_syncing(&self) -> bool {
        self.state().queue.is_syncing()
    }

    /// Toggle the read mark of the selected entry.
    ///
    /// The selected feed is the fallback for entries without an origin feed.
    pub fn mark_selected(&self, checked: bool) -> bool {
        let mut state = self.state();
        let SessionState { view, queue } = &mut *state;
        let Some(entry) = view.selected_entry() else {
            return false;
        };
        queue.enqueue_single(entry, checked, view.selected_feed_id())
    }

    /// Toggle the read mark of a loaded entry by id.
    ///
    /// # Arguments
    ///
    /// * `entry_id` - Id of an entry in the current entry list
    /// * `checked` - `true` to queue it as read, `false` to unqueue it
    ///
    /// # Returns
    ///
    /// `true` if the queue changed. `false` when the entry is not loaded, is
    /// already in the requested state, or has no real owning feed.
    pub fn mark_entry(&self, entry_id: &str, checked: bool) -> bool {
        let mut state = self.state();
        let SessionState { view, queue } = &mut *state;
        let Some(entry) = view.entries().iter().find(|entry| entry.id == entry_id) else {
            tracing::debug!(entry_id, "Entry not loaded, ignoring read toggle");
            return false;
        };
        queue.enqueue_single(entry, checked, view.selected_feed_id())
    }

    /// Queue every loaded entry as read. Returns the number newly queued.
    pub fn mark_all_visible(&self) -> usize {
        let mut state = self.state();
        let SessionState { view, queue } = &mut *state;
        queue.enqueue_all_visible(view.entries(), view.selected_feed_id())
    }

    /// Flush the pending queue to Feedly as a single batch.
    ///
    /// On success the committed entries disappear from the list and the
    /// owning feeds' unread counts drop. On failure nothing changes except the
    /// error message; the user retries by syncing again.
    ///
    /// Only one sync runs at a time across all clones of the session. Entries
    /// queued while the request is in flight stay pending for the next sync.
    ///
    /// # Errors
    ///
    /// Never returns an error. A failed remote call is reported as
    /// [`SyncOutcome::Failed`] and [`SYNC_ERROR_MESSAGE`] is stored as the
    /// session error.
    pub async fn sync(&self) -> SyncOutcome {
        let batch = {
            let mut state = self.state();
            if state.queue.is_syncing() {
                return SyncOutcome::Skipped(SkipReason::AlreadySyncing);
            }
            let Some(batch) = state.queue.begin_sync() else {
                return SyncOutcome::Skipped(SkipReason::EmptyQueue);
            };
            state.view.clear_error();
            batch
        };
        let mut guard = SyncGuard {
            state: &self.inner.state,
            armed: true,
        };

        let entry_ids = batch.entry_ids();
        tracing::info!(entries = entry_ids.len(), "Syncing read entries");

        match self.inner.service.mark_read(&entry_ids).await {
            Ok(()) => {
                let mut state = self.state();
                let removed = state.view.apply_commit(&batch);
                state.queue.commit(&batch);
                guard.disarm();
                tracing::info!(
                    synced = batch.len(),
                    removed,
                    pending = state.queue.len(),
                    "Read entries committed"
                );
                SyncOutcome::Committed {
                    synced: batch.len(),
                    removed,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, entries = batch.len(), "Failed to sync read entries");
                let mut state = self.state();
                state.queue.finish_sync();
                state.view.set_error(SYNC_ERROR_MESSAGE);
                guard.disarm();
                SyncOutcome::Failed
            }
        }
    }
}
