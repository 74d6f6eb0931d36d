//! Bridge from the playback event channel to a [`NowPlayingPublisher`].
//!
//! State changes are published as they arrive. Progress snapshots go through
//! a [`ProgressGate`].

use std::sync::Arc;
use std::time::Duration;

use readcast_core::{NowPlayingPublisher, PlaybackEvent, PlaybackState};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::progress_gate::ProgressGate;

/// Forward snapshots from `events` to `publisher` until the channel closes.
pub fn spawn_now_playing_bridge(
    mut events: broadcast::Receiver<PlaybackEvent>,
    publisher: Arc<dyn NowPlayingPublisher>,
    progress_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut gate = ProgressGate::new(progress_interval);
        loop {
            match events.recv().await {
                Ok(PlaybackEvent::StateChanged { snapshot }) => {
                    gate.reopen();
                    if snapshot.state == PlaybackState::Idle && snapshot.item.is_none() {
                        publisher.clear();
                    } else {
                        publisher.publish(&snapshot);
                    }
                }
                Ok(PlaybackEvent::Progress { snapshot }) => {
                    if gate.admit(&snapshot) {
                        publisher.publish(&snapshot);
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Now-playing bridge lagged behind playback events");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Now-playing bridge stopped");
    })
}
