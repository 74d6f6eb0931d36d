//! Coalescing of concurrent syntheses for the same key.
//!
//! The first caller for a key becomes the leader and spawns the synthesis;
//! later callers subscribe to the same result. Every caller holds a
//! [`Waiter`] whose drop releases its reference. When the last waiter goes
//! away before the result is ready the flight's token is cancelled, which
//! stops the synthesis task.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use readcast_core::SpeechError;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::key::CacheKey;
use super::Settled;
use crate::error::CacheError;

pub(crate) type FlightResult = Result<Settled, CacheError>;

struct Flight {
    id: u64,
    waiters: usize,
    cancel: CancellationToken,
    tx: watch::Sender<Option<FlightResult>>,
}

#[derive(Default)]
struct Flights {
    next_id: u64,
    by_key: HashMap<CacheKey, Flight>,
}

/// Registry of syntheses in progress.
#[derive(Clone, Default)]
pub(crate) struct InFlight {
    inner: Arc<Mutex<Flights>>,
}

/// How a caller joined a flight.
pub(crate) enum Joined {
    /// No flight existed; the caller must start the work under `cancel`.
    Leader {
        waiter: Waiter,
        flight_id: u64,
        cancel: CancellationToken,
    },
    /// The caller attached to an existing flight.
    Follower { waiter: Waiter },
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, Flights> {
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Attach to the flight for `key`, creating it if needed.
    pub(crate) fn join(&self, key: &CacheKey) -> Joined {
        let mut flights = self.lock();

        if let Some(flight) = flights.by_key.get_mut(key) {
            flight.waiters += 1;
            let waiter = Waiter {
                registry: self.clone(),
                key: key.clone(),
                flight_id: flight.id,
                rx: flight.tx.subscribe(),
            };
            return Joined::Follower { waiter };
        }

        flights.next_id += 1;
        let id = flights.next_id;
        let (tx, rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        flights.by_key.insert(
            key.clone(),
            Flight {
                id,
                waiters: 1,
                cancel: cancel.clone(),
                tx,
            },
        );

        Joined::Leader {
            waiter: Waiter {
                registry: self.clone(),
                key: key.clone(),
                flight_id: id,
                rx,
            },
            flight_id: id,
            cancel,
        }
    }

    /// Publish the outcome of flight `flight_id` and retire it.
    ///
    /// Returns `false` when the flight is gone (every waiter left).
    pub(crate) fn complete(&self, key: &CacheKey, flight_id: u64, result: FlightResult) -> bool {
        let mut flights = self.lock();
        if flights.by_key.get(key).is_some_and(|f| f.id == flight_id)
            && let Some(flight) = flights.by_key.remove(key)
        {
            let _ = flight.tx.send(Some(result));
            true
        } else {
            false
        }
    }

    fn release(&self, key: &CacheKey, flight_id: u64) {
        let mut flights = self.lock();
        let Some(flight) = flights.by_key.get_mut(key) else {
            return;
        };
        if flight.id != flight_id {
            return;
        }

        flight.waiters = flight.waiters.saturating_sub(1);
        if flight.waiters == 0 {
            tracing::debug!(key = %key, "Last waiter left, cancelling synthesis");
            flight.cancel.cancel();
            flights.by_key.remove(key);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().by_key.len()
    }
}

/// One caller's interest in a flight.
pub(crate) struct Waiter {
    registry: InFlight,
    key: CacheKey,
    flight_id: u64,
    rx: watch::Receiver<Option<FlightResult>>,
}

impl Waiter {
    /// Wait for the flight's result.
    pub(crate) async fn wait(mut self) -> FlightResult {
        let outcome = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map(|value| (*value).clone());
        match outcome {
            Ok(Some(result)) => result,
            // Sender dropped without a result: the flight was cancelled.
            Ok(None) | Err(_) => Err(CacheError::Speech(SpeechError::Cancelled)),
        }
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.flight_id);
    }
}
