//! Background tasks owned by the coordinator.
//!
//! Both hold a `Weak` reference and stop when the coordinator is dropped or
//! its cancellation token fires.

use std::sync::Weak;
use std::time::Duration;

use readcast_core::OutputEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Inner;

/// Record the playing position and emit a progress snapshot every
/// `period`.
pub(super) fn spawn_progress_ticker(inner: Weak<Inner>, period: Duration, cancel: CancellationToken) {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.progress_tick().await;
                }
                () = cancel.cancelled() => break,
            }
        }
        debug!("Progress ticker stopped");
    });
}

/// Feed audio output events into the coordinator.
pub(super) fn spawn_output_listener(
    inner: Weak<Inner>,
    mut events: broadcast::Receiver<OutputEvent>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                received = events.recv() => received,
                () = cancel.cancelled() => break,
            };

            match received {
                Ok(event) => {
                    let Some(inner) = inner.upgrade() else { break };
                    inner.on_output_event(event).await;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Output event listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Output event listener stopped");
    });
}
