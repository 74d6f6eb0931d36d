//! Read-only snapshots for now-playing surfaces and UI observers.
//!
//! These are "UI safe" DTOs: Clone + Debug + Serialize with no references
//! back into the queue or coordinator.

use serde::{Deserialize, Serialize};

use super::context::PlaybackContext;
use super::item::{ItemId, ItemKind, QueueItem};
use super::queue::index_serde;
use super::state::PlaybackState;

/// Compact description of one queue item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSummary {
    pub id: ItemId,
    /// `"text"` or `"stream"`.
    pub kind: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_label: Option<String>,
    pub listened: bool,
    pub kept: bool,
    pub last_position: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known_duration: Option<f64>,
}

impl From<&QueueItem> for ItemSummary {
    fn from(item: &QueueItem) -> Self {
        let (author, known_duration) = match &item.kind {
            ItemKind::Text(t) => (t.author.clone(), None),
            ItemKind::Stream(s) => (None, s.known_duration),
        };
        Self {
            id: item.id.clone(),
            kind: item.kind.kind_name().to_string(),
            title: item.title().to_string(),
            author,
            feed_label: item.feed_label().map(str::to_string),
            listened: item.listened,
            kept: item.kept,
            last_position: item.last_position,
            known_duration,
        }
    }
}

/// Snapshot of the queue order and pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueSnapshot {
    #[serde(with = "index_serde")]
    pub current_index: Option<usize>,
    pub items: Vec<ItemSummary>,
}

impl QueueSnapshot {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Everything a now-playing surface needs to render the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingSnapshot {
    pub state: PlaybackState,
    pub item: Option<ItemSummary>,
    pub position_seconds: f64,
    pub duration_seconds: Option<f64>,
    pub rate: f64,
    pub context: PlaybackContext,
    pub queue: QueueSnapshot,
}

impl NowPlayingSnapshot {
    /// Snapshot of a coordinator that has never played anything.
    #[must_use]
    pub fn idle(queue: QueueSnapshot, rate: f64) -> Self {
        Self {
            state: PlaybackState::Idle,
            item: None,
            position_seconds: 0.0,
            duration_seconds: None,
            rate,
            context: PlaybackContext::Standalone,
            queue,
        }
    }
}
