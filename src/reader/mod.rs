//! Local-first read state.
//!
//! - [`queue`] - pending "mark read" actions and the single-flight sync gate
//! - [`view`] - the feed/entry snapshot the queue's commits are applied to
//! - [`session`] - the shared handle that runs batched syncs against Feedly
//!
//! Marking an entry read only queues it. Nothing changes on screen until a
//! sync commits the batch: then the entries leave the unread list and the
//! owning feeds' unread counters drop by the number committed.

pub mod queue;
pub mod session;
pub mod view;

pub use queue::{ItemState, QueueItem, ReadQueue, SyncBatch};
pub use session::{MarkReadService, ReaderSession, SkipReason, SyncOutcome, SYNC_ERROR_MESSAGE};
pub use view::{sort_entries, FeedGroup, ReaderView};
