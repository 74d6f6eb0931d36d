//! Core domain types.
//!
//! Pure data and state transitions; nothing here performs I/O.

mod context;
mod item;
mod queue;
mod snapshot;
mod state;

pub use context::{PlaybackContext, select_next_live_item};
pub use item::{ItemId, ItemKind, QueueItem, StreamItem, TextItem};
pub use queue::{EnqueuePosition, Queue, RemoveOutcome, index_serde};
pub use snapshot::{ItemSummary, NowPlayingSnapshot, QueueSnapshot};
pub use state::PlaybackState;
