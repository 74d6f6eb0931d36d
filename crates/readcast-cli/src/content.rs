//! File-backed content store.
//!
//! One JSON record per content id in the content directory:
//!
//! ```json
//! { "kind": "text", "title": "On Queues", "author": "Ann", "text": "..." }
//! { "kind": "stream", "title": "Episode 12", "url": "https://...", "durationSeconds": 1800 }
//! ```
//!
//! Ids are restricted to `[A-Za-z0-9_-]` so a record path never leaves the
//! directory.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use readcast_core::{ContentError, ContentStore, StreamInfo, TextContent, atomic_write};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A stored article or episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentRecord {
    Text {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        author: Option<String>,
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Stream {
        title: String,
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_seconds: Option<f64>,
    },
}

/// `ContentStore` over a directory of JSON records.
#[derive(Debug, Clone)]
pub struct FileContentStore {
    dir: PathBuf,
}

impl FileContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `record` under `content_id`, replacing any previous record.
    pub async fn save(&self, content_id: &str, record: &ContentRecord) -> Result<(), ContentError> {
        let path = self.record_path(content_id)?;
        let json =
            serde_json::to_vec_pretty(record).map_err(|e| ContentError::Store(e.to_string()))?;
        tokio::task::spawn_blocking(move || atomic_write(&path, &json))
            .await
            .map_err(|e| ContentError::Store(e.to_string()))?
            .map_err(|e| ContentError::Store(e.to_string()))?;
        debug!(content_id, "Saved content record");
        Ok(())
    }

    pub async fn load(&self, content_id: &str) -> Result<ContentRecord, ContentError> {
        let path = self.record_path(content_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ContentError::NotFound(content_id.to_string()));
            }
            Err(e) => return Err(ContentError::Store(format!("{}: {e}", path.display()))),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| ContentError::Store(format!("{}: {e}", path.display())))
    }

    /// Delete the record. A missing record is not an error.
    pub async fn remove(&self, content_id: &str) -> Result<(), ContentError> {
        let path = self.record_path(content_id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ContentError::Store(e.to_string())),
        }
    }

    fn record_path(&self, content_id: &str) -> Result<PathBuf, ContentError> {
        let valid = !content_id.is_empty()
            && content_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(ContentError::Store(format!("invalid content id {content_id:?}")));
        }
        Ok(self.dir.join(format!("{content_id}.json")))
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn fetch_text(&self, content_id: &str) -> Result<TextContent, ContentError> {
        match self.load(content_id).await? {
            ContentRecord::Text { text, .. } if text.trim().is_empty() => Err(ContentError::Empty {
                id: content_id.to_string(),
            }),
            ContentRecord::Text {
                title,
                author,
                text,
            } => Ok(TextContent {
                text,
                title,
                author,
            }),
            ContentRecord::Stream { .. } => Err(ContentError::Store(format!(
                "{content_id} is an episode, not an article"
            ))),
        }
    }

    async fn fetch_stream_info(&self, content_id: &str) -> Result<StreamInfo, ContentError> {
        match self.load(content_id).await? {
            ContentRecord::Stream {
                title,
                url,
                duration_seconds,
            } => Ok(StreamInfo {
                url,
                title,
                duration_hint: duration_seconds,
            }),
            ContentRecord::Text { .. } => Err(ContentError::Store(format!(
                "{content_id} is an article, not an episode"
            ))),
        }
    }
}
