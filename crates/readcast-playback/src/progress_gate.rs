//! Pacing for now-playing progress.
//!
//! The coordinator ticks several times a second while a lock screen or a
//! status line only needs a redraw now and then. A [`ProgressGate`] passes a
//! progress snapshot when `interval` has elapsed since the last one it
//! passed. A different item or a backwards jump (seek, restart) passes at
//! once. Runs on the tokio clock so paused-time tests can drive it.

use std::time::Duration;

use readcast_core::{ItemId, NowPlayingSnapshot};
use tokio::time::Instant;

/// Decides which progress snapshots reach a now-playing surface.
#[derive(Debug, Clone)]
pub struct ProgressGate {
    interval: Duration,
    last: Option<Passed>,
}

#[derive(Debug, Clone)]
struct Passed {
    at: Instant,
    item: Option<ItemId>,
    position: f64,
}

impl ProgressGate {
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Whether `snapshot` should be published. Records it when it is.
    pub fn admit(&mut self, snapshot: &NowPlayingSnapshot) -> bool {
        let now = Instant::now();
        let item = snapshot.item.as_ref().map(|item| &item.id);
        let open = match &self.last {
            None => true,
            Some(last) => {
                last.item.as_ref() != item
                    || snapshot.position_seconds < last.position
                    || now.duration_since(last.at) >= self.interval
            }
        };
        if open {
            self.last = Some(Passed {
                at: now,
                item: item.cloned(),
                position: snapshot.position_seconds,
            });
        }
        open
    }

    /// Let the next snapshot through. Called on every state change.
    pub fn reopen(&mut self) {
        self.last = None;
    }
}
