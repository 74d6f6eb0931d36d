//! Queue item types.
//!
//! A queue holds two structurally different kinds of content behind one
//! [`QueueItem`] envelope: text that is synthesized to speech on demand, and
//! pre-recorded stream episodes that are loaded straight from a URL.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, stable identifier of a queue item (UUID v4 string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Generate a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Wrap an existing id string (e.g. one read back from disk).
    pub fn from_string(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Text content that is turned into speech before playback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextItem {
    /// Id of the article in the content store.
    pub content_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_label: Option<String>,
}

/// A pre-recorded episode played directly from its URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamItem {
    /// Id of the episode in the content store.
    pub content_id: String,
    pub audio_url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_label: Option<String>,
    /// Duration reported by the feed, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_duration: Option<f64>,
}

/// The two content kinds a queue can hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemKind {
    Text(TextItem),
    Stream(StreamItem),
}

impl ItemKind {
    #[must_use]
    pub fn content_id(&self) -> &str {
        match self {
            Self::Text(t) => &t.content_id,
            Self::Stream(s) => &s.content_id,
        }
    }

    #[must_use]
    pub fn title(&self) -> &str {
        match self {
            Self::Text(t) => &t.title,
            Self::Stream(s) => &s.title,
        }
    }

    #[must_use]
    pub fn feed_label(&self) -> Option<&str> {
        match self {
            Self::Text(t) => t.feed_label.as_deref(),
            Self::Stream(s) => s.feed_label.as_deref(),
        }
    }

    /// Short name used in logs and CLI output.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Stream(_) => "stream",
        }
    }
}

/// One entry of the playback queue.
///
/// Serializes flat, with the kind tag and the kind's fields next to the
/// common attributes; this is also the record layout of the queue document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: ItemId,
    #[serde(flatten)]
    pub kind: ItemKind,
    /// When the item was enqueued.
    pub added_at: DateTime<Utc>,
    /// Last known playback position in seconds.
    pub last_position: f64,
    pub listened: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Explicitly kept items survive the expiry sweep.
    #[serde(default)]
    pub kept: bool,
}

impl QueueItem {
    /// Create a text item with a fresh id, enqueued now.
    pub fn text(content_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self::with_kind(ItemKind::Text(TextItem {
            content_id: content_id.into(),
            title: title.into(),
            author: None,
            feed_label: None,
        }))
    }

    /// Create a stream item with a fresh id, enqueued now.
    pub fn stream(
        content_id: impl Into<String>,
        audio_url: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self::with_kind(ItemKind::Stream(StreamItem {
            content_id: content_id.into(),
            audio_url: audio_url.into(),
            title: title.into(),
            feed_label: None,
            known_duration: None,
        }))
    }

    #[must_use]
    pub fn with_kind(kind: ItemKind) -> Self {
        Self {
            id: ItemId::new(),
            kind,
            added_at: Utc::now(),
            last_position: 0.0,
            listened: false,
            expires_at: None,
            kept: false,
        }
    }

    /// Set the feed label on either item kind.
    #[must_use]
    pub fn with_feed_label(mut self, label: impl Into<String>) -> Self {
        let label = Some(label.into());
        match &mut self.kind {
            ItemKind::Text(t) => t.feed_label = label,
            ItemKind::Stream(s) => s.feed_label = label,
        }
        self
    }

    /// Set the author. Stream items carry no author and ignore it.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        if let ItemKind::Text(t) = &mut self.kind {
            t.author = Some(author.into());
        }
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: ItemId) -> Self {
        self.id = id;
        self
    }

    #[must_use]
    pub const fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }

    #[must_use]
    pub const fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    #[must_use]
    pub fn with_known_duration(mut self, seconds: f64) -> Self {
        if let ItemKind::Stream(s) = &mut self.kind {
            s.known_duration = Some(seconds);
        }
        self
    }

    #[must_use]
    pub const fn is_text(&self) -> bool {
        matches!(self.kind, ItemKind::Text(_))
    }

    #[must_use]
    pub const fn is_stream(&self) -> bool {
        matches!(self.kind, ItemKind::Stream(_))
    }

    #[must_use]
    pub fn title(&self) -> &str {
        self.kind.title()
    }

    #[must_use]
    pub fn feed_label(&self) -> Option<&str> {
        self.kind.feed_label()
    }

    /// Whether the item has passed its expiry timestamp.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_ids_are_unique() {
        let a = QueueItem::text("a1", "First");
        let b = QueueItem::text("a1", "First");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_builders_apply_per_kind() {
        let text = QueueItem::text("a1", "Essay")
            .with_author("Ann")
            .with_feed_label("blog")
            .with_known_duration(12.0);
        match &text.kind {
            ItemKind::Text(t) => {
                assert_eq!(t.author.as_deref(), Some("Ann"));
                assert_eq!(t.feed_label.as_deref(), Some("blog"));
            }
            ItemKind::Stream(_) => panic!("expected text item"),
        }

        let stream = QueueItem::stream("e1", "https://x/e1.mp3", "Episode")
            .with_author("ignored")
            .with_known_duration(1800.0);
        match &stream.kind {
            ItemKind::Stream(s) => assert_eq!(s.known_duration, Some(1800.0)),
            ItemKind::Text(_) => panic!("expected stream item"),
        }
    }

    #[test]
    fn test_expiry() {
        let now = Utc::now();
        let item = QueueItem::stream("e1", "u", "t").with_expiry(now - Duration::hours(1));
        assert!(item.is_expired(now));
        let fresh = QueueItem::stream("e2", "u", "t").with_expiry(now + Duration::hours(1));
        assert!(!fresh.is_expired(now));
        assert!(!QueueItem::text("a", "t").is_expired(now));
    }

    #[test]
    fn test_serializes_flat_record() {
        let item = QueueItem::stream("e1", "https://x/e1.mp3", "Episode").with_feed_label("news");
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["kind"], "stream");
        assert_eq!(json["contentId"], "e1");
        assert_eq!(json["audioUrl"], "https://x/e1.mp3");
        assert_eq!(json["feedLabel"], "news");
        assert_eq!(json["lastPosition"], 0.0);
        assert!(json.get("expiresAt").is_none());

        let back: QueueItem = serde_json::from_value(json).unwrap();
        assert_eq!(back, item);
    }
}
