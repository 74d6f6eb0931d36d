//! Now-playing sink port.
//!
//! Receives snapshots to drive system media controls (lock screen, media
//! keys) and any other read-only observer.
//!
//! # Design
//!
//! - **Object-safe**: `&self` methods for `Arc<dyn NowPlayingPublisher>`
//! - **Fire-and-forget**: no `Result`; adapters handle their own errors

use crate::domain::NowPlayingSnapshot;

/// Port for publishing now-playing snapshots.
pub trait NowPlayingPublisher: Send + Sync {
    /// Publish the latest snapshot. Must not block.
    fn publish(&self, snapshot: &NowPlayingSnapshot);

    /// Clear the now-playing surface (queue emptied, playback reset).
    fn clear(&self) {}
}

/// A publisher that discards everything, for tests and headless contexts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPublisher;

impl NoopPublisher {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl NowPlayingPublisher for NoopPublisher {
    fn publish(&self, _snapshot: &NowPlayingSnapshot) {
        // Intentionally do nothing
    }
}
