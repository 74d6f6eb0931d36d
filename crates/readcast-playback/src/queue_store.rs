//! Durable queue with debounced persistence.
//!
//! `QueueStore` wraps the pure [`Queue`] state machine. Every mutation
//! updates memory immediately, emits `QueueChanged`, and schedules a write.
//! A background writer waits for the debounce window to pass before saving,
//! so a burst of mutations costs one write.
//!
//! Failed writes are logged and retried in the next window. [`QueueStore::flush`]
//! writes immediately and returns the failure to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use std::time::Duration;

use chrono::{DateTime, Utc};
use readcast_core::{
    EnqueuePosition, ItemId, PlaybackError, PlaybackEvent, Queue, QueueDocument, QueueError,
    QueueItem, QueueRepository, QueueSnapshot, RepositoryError,
};
use tokio::sync::{Notify, broadcast};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the event channel created by [`QueueStore::open`].
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Persisted, observable queue.
pub struct QueueStore {
    queue: RwLock<Queue>,
    /// Item loaded in the audio output; refused by `remove` and `clear`.
    active: Mutex<Option<ItemId>>,
    repository: Arc<dyn QueueRepository>,
    events: broadcast::Sender<PlaybackEvent>,
    dirty: AtomicBool,
    /// Serializes the writer task and explicit flushes.
    save_lock: tokio::sync::Mutex<()>,
    writer: Arc<WriterSignal>,
}

struct WriterSignal {
    notify: Notify,
    cancel: CancellationToken,
}

impl QueueStore {
    /// Restore the queue from `repository` and start the debounced writer.
    ///
    /// A corrupt document is logged and replaced by an empty queue. The
    /// restored pointer is kept but nothing starts playing.
    pub async fn open(
        repository: Arc<dyn QueueRepository>,
        debounce: Duration,
    ) -> Result<Arc<Self>, RepositoryError> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self::open_with_events(repository, debounce, events).await
    }

    /// Like [`open`](Self::open), emitting on an existing channel.
    pub async fn open_with_events(
        repository: Arc<dyn QueueRepository>,
        debounce: Duration,
        events: broadcast::Sender<PlaybackEvent>,
    ) -> Result<Arc<Self>, RepositoryError> {
        let queue = match repository.load().await {
            Ok(Some(doc)) => {
                let stored = doc.items.len();
                let queue = doc.into_queue();
                if queue.len() != stored {
                    warn!(
                        stored,
                        kept = queue.len(),
                        "Dropped duplicate ids while restoring queue"
                    );
                }
                info!(
                    items = queue.len(),
                    current_index = ?queue.current_index(),
                    "Restored queue"
                );
                queue
            }
            Ok(None) => Queue::new(),
            Err(RepositoryError::Corrupt(reason)) => {
                warn!(%reason, "Queue document is corrupt, starting with an empty queue");
                Queue::new()
            }
            Err(e) => return Err(e),
        };

        let store = Arc::new(Self {
            queue: RwLock::new(queue),
            active: Mutex::new(None),
            repository,
            events,
            dirty: AtomicBool::new(false),
            save_lock: tokio::sync::Mutex::new(()),
            writer: Arc::new(WriterSignal {
                notify: Notify::new(),
                cancel: CancellationToken::new(),
            }),
        });

        spawn_writer(Arc::downgrade(&store), Arc::clone(&store.writer), debounce);
        Ok(store)
    }

    // ── Reads ──────────────────────────────────────────────────────────

    /// Run `f` against the current queue.
    pub fn read<T>(&self, f: impl FnOnce(&Queue) -> T) -> T {
        f(&self.read_guard())
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.read_guard().snapshot()
    }

    pub fn len(&self) -> usize {
        self.read_guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guard().is_empty()
    }

    pub fn current(&self) -> Option<QueueItem> {
        self.read_guard().current().cloned()
    }

    pub fn find(&self, id: &ItemId) -> Option<QueueItem> {
        self.read_guard().find(id).cloned()
    }

    pub fn get(&self, index: usize) -> Option<QueueItem> {
        self.read_guard().get(index).cloned()
    }

    pub fn position_of(&self, id: &ItemId) -> Option<usize> {
        self.read_guard().position_of(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    /// Sender shared with the coordinator so both emit on one channel.
    pub fn event_sender(&self) -> broadcast::Sender<PlaybackEvent> {
        self.events.clone()
    }

    // ── Active item guard ──────────────────────────────────────────────

    /// Mark the item loaded in the audio output (or none).
    pub fn set_active_item(&self, id: Option<ItemId>) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = id;
    }

    pub fn active_item(&self) -> Option<ItemId> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    // ── Mutations ──────────────────────────────────────────────────────

    pub fn enqueue(&self, item: QueueItem, position: EnqueuePosition) -> Result<usize, QueueError> {
        let id = item.id.clone();
        let index = self.mutate(|queue| queue.enqueue(item, position))?;
        debug!(%id, index, ?position, "Enqueued item");
        Ok(index)
    }

    /// Remove the item at `at`. The active item is refused; stop playback
    /// first.
    pub fn remove(&self, at: usize) -> Result<QueueItem, QueueError> {
        let active = self.active_item();
        let outcome = self.mutate(|queue| {
            if let Some(item) = queue.get(at)
                && Some(&item.id) == active.as_ref()
            {
                return Err(QueueError::ItemIsActive {
                    id: item.id.to_string(),
                });
            }
            queue.remove(at)
        })?;
        debug!(id = %outcome.removed.id, at, was_current = outcome.was_current, "Removed item");
        Ok(outcome.removed)
    }

    pub fn move_item(&self, from: usize, to: usize) -> Result<(), QueueError> {
        self.mutate(|queue| queue.move_item(from, to))
    }

    /// Remove every item. Refused while an item is active.
    pub fn clear(&self) -> Result<usize, QueueError> {
        if let Some(id) = self.active_item() {
            return Err(QueueError::ItemIsActive { id: id.to_string() });
        }
        let removed = self.mutate(|queue| Ok(queue.clear()))?;
        info!(removed, "Cleared queue");
        Ok(removed)
    }

    pub fn select(&self, index: usize) -> Result<QueueItem, QueueError> {
        self.mutate(|queue| queue.select(index).cloned())
    }

    pub fn mark_listened(&self, id: &ItemId) -> Result<(), QueueError> {
        self.mutate(|queue| queue.mark_listened(id))
    }

    /// Store a position outright (pause, stop, seek).
    pub fn update_progress(&self, id: &ItemId, position: f64) -> Result<(), QueueError> {
        self.mutate(|queue| queue.update_progress(id, position))
    }

    /// Store a playing position. Never moves backwards and does not emit
    /// `QueueChanged`; progress ticks are reported by the coordinator.
    pub fn record_tick(&self, id: &ItemId, position: f64) -> Result<bool, QueueError> {
        let changed = self.write_guard().record_tick(id, position)?;
        if changed {
            self.schedule_persist();
        }
        Ok(changed)
    }

    pub fn set_kept(&self, id: &ItemId, kept: bool) -> Result<(), QueueError> {
        self.mutate(|queue| queue.set_kept(id, kept))
    }

    /// Drop expired stream items that are not current, kept or active.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> Vec<QueueItem> {
        let active = self.active_item();
        let (removed, snapshot) = {
            let mut queue = self.write_guard();
            let removed = queue.sweep_expired_except(now, active.as_ref());
            (removed, queue.snapshot())
        };

        if !removed.is_empty() {
            info!(removed = removed.len(), "Swept expired items");
            self.schedule_persist();
            let _ = self.events.send(PlaybackEvent::QueueChanged { queue: snapshot });
        }
        removed
    }

    // ── Persistence ────────────────────────────────────────────────────

    /// Write the queue now if it has unsaved changes.
    pub async fn flush(&self) -> Result<(), PlaybackError> {
        self.persist_if_dirty()
            .await
            .map_err(|e| PlaybackError::persistence(e.to_string()))
    }

    /// Flush and stop the background writer.
    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        let result = self.flush().await;
        self.writer.cancel.cancel();
        result
    }

    /// Whether there are changes not yet written.
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn schedule_persist(&self) {
        self.dirty.store(true, Ordering::SeqCst);
        self.writer.notify.notify_one();
    }

    async fn persist_if_dirty(&self) -> Result<(), RepositoryError> {
        let _guard = self.save_lock.lock().await;
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let document = QueueDocument::from_queue(&self.read_guard());
        if let Err(e) = self.repository.save(&document).await {
            self.dirty.store(true, Ordering::SeqCst);
            return Err(e);
        }
        Ok(())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Queue) -> Result<T, QueueError>) -> Result<T, QueueError> {
        let (result, snapshot) = {
            let mut queue = self.write_guard();
            let result = f(&mut queue)?;
            (result, queue.snapshot())
        };
        self.schedule_persist();
        let _ = self.events.send(PlaybackEvent::QueueChanged { queue: snapshot });
        Ok(result)
    }

    fn read_guard(&self) -> RwLockReadGuard<'_, Queue> {
        self.queue.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_guard(&self) -> RwLockWriteGuard<'_, Queue> {
        self.queue.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for QueueStore {
    fn drop(&mut self) {
        self.writer.cancel.cancel();
    }
}

/// Background writer: wake on the first mutation, wait out the debounce
/// window, then save once.
fn spawn_writer(store: Weak<QueueStore>, signal: Arc<WriterSignal>, debounce: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                () = signal.cancel.cancelled() => break,
                () = signal.notify.notified() => {}
            }

            tokio::select! {
                () = signal.cancel.cancelled() => break,
                () = tokio::time::sleep(debounce) => {}
            }

            let Some(store) = store.upgrade() else { break };
            if let Err(e) = store.persist_if_dirty().await {
                warn!(error = %e, "Queue write failed, retrying in the next window");
                signal.notify.notify_one();
            }
        }
        debug!("Queue writer stopped");
    });
}
