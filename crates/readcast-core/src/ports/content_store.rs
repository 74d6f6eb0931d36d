//! Content store port.
//!
//! Read-only lookup of article text and episode stream info. The record
//! store, feed ingestion and extraction live outside this workspace.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Text and metadata for a text item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
    pub title: String,
    pub author: Option<String>,
}

/// Playable URL and metadata for a stream item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamInfo {
    pub url: String,
    pub title: String,
    pub duration_hint: Option<f64>,
}

/// Errors from content lookup.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContentError {
    #[error("Content not found: {0}")]
    NotFound(String),

    /// The record exists but has nothing playable (e.g. empty body).
    #[error("Content {id} is empty")]
    Empty { id: String },

    #[error("Content store error: {0}")]
    Store(String),
}

/// Port for content lookup.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the body text of a text item.
    async fn fetch_text(&self, content_id: &str) -> Result<TextContent, ContentError>;

    /// Fetch the stream URL of an episode.
    async fn fetch_stream_info(&self, content_id: &str) -> Result<StreamInfo, ContentError>;
}
