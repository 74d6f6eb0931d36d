//! Queue persistence port.
//!
//! The whole queue is stored as one document and written as a single unit.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Queue, QueueItem, index_serde};

/// Current queue document schema version.
pub const QUEUE_DOCUMENT_VERSION: u32 = 1;

/// Durable representation of the queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueDocument {
    pub version: u32,
    #[serde(with = "index_serde")]
    pub current_index: Option<usize>,
    pub items: Vec<QueueItem>,
}

impl QueueDocument {
    #[must_use]
    pub fn from_queue(queue: &Queue) -> Self {
        Self {
            version: QUEUE_DOCUMENT_VERSION,
            current_index: queue.current_index(),
            items: queue.items().to_vec(),
        }
    }

    /// Rebuild the queue, de-duplicating ids and validating the pointer.
    #[must_use]
    pub fn into_queue(self) -> Queue {
        Queue::restore(self.items, self.current_index)
    }
}

/// Queue persistence errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Failed to read queue document: {0}")]
    Read(String),

    #[error("Failed to write queue document: {0}")]
    Write(String),

    #[error("Queue document is corrupt: {0}")]
    Corrupt(String),

    #[error("Unsupported queue document version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },
}

/// Port for loading and saving the queue document.
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Load the stored document, `None` if nothing was ever saved.
    async fn load(&self) -> Result<Option<QueueDocument>, RepositoryError>;

    /// Replace the stored document atomically.
    async fn save(&self, document: &QueueDocument) -> Result<(), RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::EnqueuePosition;

    #[test]
    fn test_document_round_trip() {
        let mut queue = Queue::new();
        queue
            .enqueue(QueueItem::text("a1", "Essay").with_author("Ann"), EnqueuePosition::Append)
            .unwrap();
        queue
            .enqueue(
                QueueItem::stream("e1", "https://x/e1.mp3", "Episode").with_feed_label("news"),
                EnqueuePosition::Append,
            )
            .unwrap();
        queue.select(1).unwrap();

        let json = serde_json::to_string(&QueueDocument::from_queue(&queue)).unwrap();
        let document: QueueDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(document.version, QUEUE_DOCUMENT_VERSION);
        assert_eq!(document.into_queue(), queue);
    }

    #[test]
    fn test_empty_document_uses_minus_one() {
        let json = serde_json::to_value(QueueDocument::from_queue(&Queue::new())).unwrap();
        assert_eq!(json["currentIndex"], -1);
        assert_eq!(json["items"], serde_json::json!([]));
    }
}
