//! Playback event union.
//!
//! The coordinator emits these on a `tokio::sync::broadcast` channel. UI
//! observers and the now-playing bridge subscribe independently.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "item_failed", "itemId": "6f1c…", "error": { "kind": "resource_load_failed", "message": "404" } }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ItemId, NowPlayingSnapshot, QueueSnapshot};
use crate::errors::PlaybackError;

/// Events emitted by the playback coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    /// The state machine moved (or the loaded item changed).
    StateChanged { snapshot: NowPlayingSnapshot },

    /// Throttled position update while playing.
    Progress { snapshot: NowPlayingSnapshot },

    /// Queue order, membership or pointer changed.
    QueueChanged { queue: QueueSnapshot },

    /// An item could not be played.
    ItemFailed {
        #[serde(rename = "itemId")]
        item_id: ItemId,
        error: PlaybackError,
    },

    /// Playback moved on without a user command (natural end or skip).
    AutoAdvanced {
        #[serde(rename = "fromId")]
        from_id: Option<ItemId>,
        #[serde(rename = "toId")]
        to_id: ItemId,
    },
}

impl PlaybackEvent {
    /// The snapshot carried by this event, if any.
    #[must_use]
    pub const fn snapshot(&self) -> Option<&NowPlayingSnapshot> {
        match self {
            Self::StateChanged { snapshot } | Self::Progress { snapshot } => Some(snapshot),
            _ => None,
        }
    }

    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::StateChanged { .. } => "state_changed",
            Self::Progress { .. } => "progress",
            Self::QueueChanged { .. } => "queue_changed",
            Self::ItemFailed { .. } => "item_failed",
            Self::AutoAdvanced { .. } => "auto_advanced",
        }
    }
}
