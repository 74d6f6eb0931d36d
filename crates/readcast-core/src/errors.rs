//! Playback and queue error types.
//!
//! Like the event union, these are serializable and do not wrap
//! non-serializable sources such as `std::io::Error`; adapters capture the
//! message as a string at the port boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invalid queue operation.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum QueueError {
    /// Index does not address an item in the queue.
    #[error("Index {index} out of range for queue of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// An item with this id is already queued.
    #[error("Already queued: {id}")]
    DuplicateId { id: String },

    /// No item with this id is queued.
    #[error("Not in queue: {id}")]
    NotInQueue { id: String },

    /// The item is loaded in the audio output and must be stopped first.
    #[error("Item {id} is currently active; stop playback before removing it")]
    ItemIsActive { id: String },
}

/// Errors surfaced by the playback coordinator.
#[derive(Clone, Debug, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlaybackError {
    /// The content store has no usable text or stream info for the item.
    #[error("Content unavailable: {message}")]
    ContentUnavailable { message: String },

    /// Remote and local synthesis both failed.
    #[error("Synthesis failed: {message}")]
    SynthesisFailed { message: String },

    /// The audio output could not load the resolved source.
    #[error("Resource load failed: {message}")]
    ResourceLoadFailed { message: String },

    /// A system audio interruption is in progress.
    #[error("Playback is interrupted by the system")]
    InterruptedBySystem,

    /// The queue document could not be written.
    #[error("Persistence write failed: {message}")]
    PersistenceWriteFailed { message: String },

    #[error(transparent)]
    Queue(#[from] QueueError),

    /// No item to play (empty queue or nothing loaded).
    #[error("Nothing to play")]
    NothingToPlay,
}

impl PlaybackError {
    pub fn content_unavailable(message: impl Into<String>) -> Self {
        Self::ContentUnavailable {
            message: message.into(),
        }
    }

    pub fn synthesis_failed(message: impl Into<String>) -> Self {
        Self::SynthesisFailed {
            message: message.into(),
        }
    }

    pub fn resource_load_failed(message: impl Into<String>) -> Self {
        Self::ResourceLoadFailed {
            message: message.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        Self::PersistenceWriteFailed {
            message: message.into(),
        }
    }

    /// Whether an autonomous live-feed advance should skip past this error.
    ///
    /// Synthesis failures are not skippable: they already exhausted the local
    /// fallback and are surfaced so the user can see the item is broken.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(
            self,
            Self::ContentUnavailable { .. } | Self::ResourceLoadFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PlaybackError::Queue(QueueError::IndexOutOfRange { index: 4, len: 2 });
        assert_eq!(err.to_string(), "Index 4 out of range for queue of length 2");
        assert_eq!(
            PlaybackError::content_unavailable("a1").to_string(),
            "Content unavailable: a1"
        );
    }

    #[test]
    fn test_error_serializes_with_kind_tag() {
        let err = PlaybackError::resource_load_failed("404");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "resource_load_failed");
        assert_eq!(json["message"], "404");

        let back: PlaybackError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);

        let queue_err = PlaybackError::from(QueueError::NotInQueue { id: "x".into() });
        let json = serde_json::to_value(&queue_err).unwrap();
        assert_eq!(json["kind"], "queue");
        assert_eq!(json["reason"], "not_in_queue");
    }

    #[test]
    fn test_skippable() {
        assert!(PlaybackError::resource_load_failed("x").is_skippable());
        assert!(PlaybackError::content_unavailable("x").is_skippable());
        assert!(!PlaybackError::synthesis_failed("x").is_skippable());
        assert!(!PlaybackError::InterruptedBySystem.is_skippable());
    }
}
