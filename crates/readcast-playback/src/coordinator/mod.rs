//! Playback coordinator.
//!
//! Owns the single audio output and the playback state machine:
//!
//! ```text
//! Idle ─play─▶ Loading ─ok─▶ Playing ◀─toggle/interruption─▶ Paused
//!                 │              │                             │
//!                 └─err─▶ Failed  └────────stop/end──▶ Stopped ◀┘
//! Stopped/Failed ─reset─▶ Idle
//! ```
//!
//! Every state-changing entry point runs under one async lock, so user
//! commands, remote commands, output events and system events never
//! interleave. Background synthesis and progress ticks run outside it.
//!
//! Text items resolve through the speech cache; stream items load their URL
//! directly. "Next" depends on the [`PlaybackContext`] the item was played
//! in: nothing for standalone plays, queue order for `FromQueue`, and one
//! item per feed group for `FromLiveFeed`.

mod session;
mod tasks;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use readcast_core::{
    AudioOutput, AudioSource, ContentStore, ItemId, ItemKind, ItemSummary, NowPlayingSnapshot,
    OutputEvent, PlaybackContext, PlaybackError, PlaybackEvent, PlaybackState, QueueError,
    QueueItem, Settings, SpeechSynthesizer, SystemEvent, clamp_rate, select_next_live_item,
};
use readcast_tts::{Artifact, CacheKey, TtsCache};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::queue_store::QueueStore;
use crate::remote::RemoteCommand;
use session::{Loaded, Session};

/// `previous` restarts the current item past this many seconds.
pub const RESTART_THRESHOLD_SECONDS: f64 = 3.0;

/// Coordinator tuning, usually derived from [`Settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// Remote voice id used for synthesis and cache keys.
    pub voice: String,
    pub text_skip_seconds: f64,
    pub stream_skip_seconds: f64,
    pub progress_interval: Duration,
    pub initial_rate: f64,
}

impl CoordinatorConfig {
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            voice: settings.effective_voice().to_string(),
            text_skip_seconds: settings.effective_text_skip(),
            stream_skip_seconds: settings.effective_stream_skip(),
            progress_interval: settings.effective_progress_interval(),
            initial_rate: settings.effective_playback_rate(),
        }
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Handle to the playback engine. Cheap to clone.
#[derive(Clone)]
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoordinatorConfig,
    queue: Arc<QueueStore>,
    content: Arc<dyn ContentStore>,
    cache: TtsCache,
    speech: Arc<dyn SpeechSynthesizer>,
    output: Arc<dyn AudioOutput>,
    events: broadcast::Sender<PlaybackEvent>,
    /// Serializes every state-mutating operation.
    op_lock: tokio::sync::Mutex<()>,
    session: Mutex<Session>,
    prefetches: Mutex<HashMap<ItemId, JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl PlaybackCoordinator {
    /// Build a coordinator. Events share the queue store's channel.
    ///
    /// Call [`start`](Self::start) to listen for output events and run the
    /// progress ticker.
    pub fn new(
        queue: Arc<QueueStore>,
        content: Arc<dyn ContentStore>,
        cache: TtsCache,
        speech: Arc<dyn SpeechSynthesizer>,
        output: Arc<dyn AudioOutput>,
        config: CoordinatorConfig,
    ) -> Self {
        let rate = clamp_rate(config.initial_rate);
        Self {
            inner: Arc::new(Inner {
                events: queue.event_sender(),
                queue,
                content,
                cache,
                speech,
                output,
                session: Mutex::new(Session::new(rate)),
                config,
                op_lock: tokio::sync::Mutex::new(()),
                prefetches: Mutex::new(HashMap::new()),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Spawn the output event listener and the progress ticker.
    pub fn start(&self) {
        tasks::spawn_output_listener(
            Arc::downgrade(&self.inner),
            self.inner.output.subscribe(),
            self.inner.cancel.clone(),
        );
        tasks::spawn_progress_ticker(
            Arc::downgrade(&self.inner),
            self.inner.config.progress_interval,
            self.inner.cancel.clone(),
        );
        info!("Playback coordinator started");
    }

    /// Stop playback and cancel background work, then flush the queue and
    /// the cache access times.
    pub async fn shutdown(&self) -> Result<(), PlaybackError> {
        self.stop().await?;
        self.inner.cancel.cancel();
        self.inner.abort_prefetches();
        if let Err(e) = self.inner.cache.flush().await {
            warn!(error = %e, "Failed to save cache access times");
        }
        self.inner.queue.flush().await
    }

    pub fn queue(&self) -> &Arc<QueueStore> {
        &self.inner.queue
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.inner.events.subscribe()
    }

    // ── Transport ──────────────────────────────────────────────────────

    /// Load and play a queued item.
    ///
    /// Returns once the item is playing or has failed. Under a live feed a
    /// skippable failure advances to the next feed group; the call succeeds
    /// if a later item starts.
    pub async fn play(&self, item_id: &ItemId, context: PlaybackContext) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.play_locked(item_id, context).await
    }

    pub async fn toggle(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        if self.inner.session().is_playing() {
            self.inner.pause_locked().await
        } else {
            self.inner.resume_locked().await
        }
    }

    pub async fn pause(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.pause_locked().await
    }

    /// Resume a paused item, or start the current queue item when nothing
    /// is loaded. Refused while a system interruption is active.
    pub async fn resume(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.resume_locked().await
    }

    /// Stop and unload. Idempotent.
    pub async fn stop(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.stop_locked().await;
        Ok(())
    }

    /// Stop, then return to `Idle` with a standalone context.
    pub async fn reset(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.stop_locked().await;
        self.inner.session().reset();
        self.inner.publish_state().await;
        Ok(())
    }

    pub async fn seek(&self, seconds: f64) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.seek_locked(seconds).await
    }

    pub async fn skip_forward(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.skip_locked(1.0).await
    }

    pub async fn skip_backward(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.skip_locked(-1.0).await
    }

    /// Set the playback rate, clamped to the supported range. Returns the
    /// rate applied.
    pub async fn set_rate(&self, rate: f64) -> Result<f64, PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        let rate = clamp_rate(rate);
        let loaded = {
            let mut session = self.inner.session();
            session.rate = rate;
            session.loaded.is_some()
        };
        if loaded && let Err(e) = self.inner.output.set_rate(rate).await {
            warn!(error = %e, rate, "Output rejected playback rate");
        }
        self.inner.publish_state().await;
        Ok(rate)
    }

    // ── Navigation ─────────────────────────────────────────────────────

    /// Move to the next item for the current context. A no-op at the end
    /// of the queue, after the last feed group, and for standalone plays.
    pub async fn next(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.next_locked().await
    }

    /// Restart the item when more than three seconds in, otherwise move to
    /// the previous item for the current context.
    pub async fn previous(&self) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.previous_locked().await
    }

    // ── Queue operations that touch playback ───────────────────────────

    /// Remove the item at `at`, stopping playback first if it is loaded.
    pub async fn remove(&self, at: usize) -> Result<QueueItem, PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        let item = self.inner.queue.get(at).ok_or(QueueError::IndexOutOfRange {
            index: at,
            len: self.inner.queue.len(),
        })?;

        if self.inner.is_loaded(&item.id) {
            info!(id = %item.id, "Stopping playback to remove the current item");
            self.inner.stop_locked().await;
        }
        self.inner.cancel_prefetch(&item.id);
        Ok(self.inner.queue.remove(at)?)
    }

    /// Stop playback and empty the queue. Returns how many items were removed.
    pub async fn clear_queue(&self) -> Result<usize, PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.stop_locked().await;
        self.inner.abort_prefetches();
        let removed = self.inner.queue.clear()?;
        self.inner.session().item = None;
        self.inner.publish_state().await;
        Ok(removed)
    }

    /// Warm the speech cache for a queued text item in the background.
    /// Stream items need no preparation.
    pub fn prefetch(&self, item_id: &ItemId) -> Result<(), PlaybackError> {
        let item = self
            .inner
            .queue
            .find(item_id)
            .ok_or_else(|| QueueError::NotInQueue {
                id: item_id.to_string(),
            })?;
        self.inner.spawn_prefetch(&item);
        Ok(())
    }

    /// Whether a prefetch for `item_id` is still running.
    pub fn is_prefetching(&self, item_id: &ItemId) -> bool {
        self.inner
            .prefetches()
            .get(item_id)
            .is_some_and(|handle| !handle.is_finished())
    }

    // ── Events ─────────────────────────────────────────────────────────

    /// React to an audio output event. Events from a replaced load are
    /// ignored.
    pub async fn handle_output_event(&self, event: OutputEvent) {
        self.inner.on_output_event(event).await;
    }

    pub async fn handle_system_event(&self, event: SystemEvent) -> Result<(), PlaybackError> {
        let _op = self.inner.op_lock.lock().await;
        self.inner.system_event_locked(event).await
    }

    /// Run a remote-control command.
    pub async fn dispatch(&self, command: RemoteCommand) -> Result<(), PlaybackError> {
        debug!(command = command.name(), "Remote command");
        match command {
            RemoteCommand::Play => self.resume().await,
            RemoteCommand::Pause => self.pause().await,
            RemoteCommand::Toggle => self.toggle().await,
            RemoteCommand::Stop => self.stop().await,
            RemoteCommand::SkipForward => self.skip_forward().await,
            RemoteCommand::SkipBackward => self.skip_backward().await,
            RemoteCommand::Next => self.next().await,
            RemoteCommand::Previous => self.previous().await,
            RemoteCommand::SeekTo(seconds) => self.seek(seconds).await,
            RemoteCommand::SetRate(rate) => self.set_rate(rate).await.map(|_| ()),
        }
    }

    // ── Observation ────────────────────────────────────────────────────

    pub async fn current_snapshot(&self) -> NowPlayingSnapshot {
        self.inner.snapshot().await
    }

    pub fn state(&self) -> PlaybackState {
        self.inner.session().state.clone()
    }

    pub fn context(&self) -> PlaybackContext {
        self.inner.session().context.clone()
    }
}

// ── Internals ──────────────────────────────────────────────────────────

impl Inner {
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn prefetches(&self) -> MutexGuard<'_, HashMap<ItemId, JoinHandle<()>>> {
        self.prefetches.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: PlaybackEvent) {
        // No receivers is fine.
        let _ = self.events.send(event);
    }

    fn is_loaded(&self, id: &ItemId) -> bool {
        self.session()
            .loaded
            .as_ref()
            .is_some_and(|loaded| &loaded.item_id == id)
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    async fn snapshot(&self) -> NowPlayingSnapshot {
        let loaded = self.session().loaded.is_some();
        let position = if loaded {
            self.output.position().await
        } else {
            0.0
        };
        self.snapshot_at(position)
    }

    fn snapshot_at(&self, position: f64) -> NowPlayingSnapshot {
        let (state, context, rate, item_id, loaded_duration) = {
            let session = self.session();
            (
                session.state.clone(),
                session.context.clone(),
                session.rate,
                session.item.clone(),
                session.loaded.as_ref().and_then(|l| l.duration),
            )
        };

        let item = item_id.and_then(|id| self.queue.find(&id));
        let duration_seconds = loaded_duration.or_else(|| match item.as_ref().map(|i| &i.kind) {
            Some(ItemKind::Stream(stream)) => stream.known_duration,
            _ => None,
        });

        NowPlayingSnapshot {
            state,
            item: item.as_ref().map(ItemSummary::from),
            position_seconds: position,
            duration_seconds,
            rate,
            context,
            queue: self.queue.snapshot(),
        }
    }

    async fn publish_state(&self) {
        let snapshot = self.snapshot().await;
        self.emit(PlaybackEvent::StateChanged { snapshot });
    }

    // ── Loading ────────────────────────────────────────────────────────

    async fn play_locked(&self, id: &ItemId, context: PlaybackContext) -> Result<(), PlaybackError> {
        let live = context.is_live_feed();
        match self.start_item(id, context).await {
            Ok(()) => Ok(()),
            Err(e) if live && e.is_skippable() => {
                if self.advance_live_feed(Some(id.clone())).await {
                    Ok(())
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// One attempt at loading and playing `id`.
    async fn start_item(&self, id: &ItemId, context: PlaybackContext) -> Result<(), PlaybackError> {
        let index = self
            .queue
            .position_of(id)
            .ok_or_else(|| QueueError::NotInQueue { id: id.to_string() })?;

        self.unload(true).await;
        let item = self.queue.select(index)?;
        {
            let mut session = self.session();
            session.enter(&item.id, context);
            session.transition(PlaybackState::Loading);
        }
        info!(id = %item.id, kind = item.kind.kind_name(), title = item.title(), "Loading item");
        self.publish_state().await;

        if let Err(e) = self.load_and_play(&item).await {
            self.fail(&item.id, &e).await;
            return Err(e);
        }

        self.session().transition(PlaybackState::Playing);
        info!(id = %item.id, "Playing");
        self.publish_state().await;

        if matches!(self.session().context, PlaybackContext::FromQueue) {
            let next = self.queue.get(index + 1);
            if let Some(next) = next {
                self.spawn_prefetch(&next);
            }
        }
        Ok(())
    }

    async fn load_and_play(&self, item: &QueueItem) -> Result<(), PlaybackError> {
        let (source, pinned, single_use) = match &item.kind {
            ItemKind::Stream(stream) => (AudioSource::Url(stream.audio_url.clone()), None, None),
            ItemKind::Text(text) => match self.synthesize(&text.content_id).await? {
                Artifact::Cached { key, path } => {
                    self.cache.pin(&key);
                    (AudioSource::File(path), Some(key), None)
                }
                Artifact::SingleUse { path } => (AudioSource::File(path.clone()), None, Some(path)),
            },
        };

        let media = match self.output.load(source).await {
            Ok(media) => media,
            Err(e) => {
                self.release(pinned.as_ref(), single_use).await;
                return Err(PlaybackError::resource_load_failed(e.to_string()));
            }
        };

        self.session().loaded = Some(Loaded {
            item_id: item.id.clone(),
            generation: media.generation,
            duration: media.duration,
            is_text: item.is_text(),
            pinned,
            single_use,
        });
        self.queue.set_active_item(Some(item.id.clone()));

        let resume_at = item.last_position;
        if !item.listened
            && resume_at > 0.0
            && media.duration.is_none_or(|duration| resume_at < duration)
        {
            debug!(id = %item.id, position = resume_at, "Resuming where playback left off");
            if let Err(e) = self.output.seek(resume_at).await {
                warn!(id = %item.id, error = %e, "Could not resume from stored position");
            }
        }

        let rate = self.session().rate;
        if let Err(e) = self.output.set_rate(rate).await {
            warn!(error = %e, rate, "Output rejected playback rate");
        }

        self.output
            .play()
            .await
            .map_err(|e| PlaybackError::resource_load_failed(e.to_string()))
    }

    /// Fetch the text for `content_id` and resolve it through the cache.
    async fn synthesize(&self, content_id: &str) -> Result<Artifact, PlaybackError> {
        let content = self
            .content
            .fetch_text(content_id)
            .await
            .map_err(|e| PlaybackError::content_unavailable(e.to_string()))?;
        if content.text.trim().is_empty() {
            return Err(PlaybackError::content_unavailable(format!(
                "{content_id} has no text"
            )));
        }

        self.cache
            .resolve(&content.text, &self.config.voice, Arc::clone(&self.speech))
            .await
            .map_err(|e| PlaybackError::synthesis_failed(e.to_string()))
    }

    async fn fail(&self, id: &ItemId, error: &PlaybackError) {
        self.unload(false).await;
        self.session().transition(PlaybackState::failed(error.to_string()));
        warn!(%id, error = %error, "Item failed");
        self.emit(PlaybackEvent::ItemFailed {
            item_id: id.clone(),
            error: error.clone(),
        });
        self.publish_state().await;
    }

    /// Stop the output and release what backs the loaded item. Returns the
    /// unloaded item id.
    async fn unload(&self, save_position: bool) -> Option<ItemId> {
        let loaded = self.session().loaded.take()?;

        if save_position {
            let position = self.output.position().await;
            if let Err(e) = self.queue.update_progress(&loaded.item_id, position) {
                debug!(id = %loaded.item_id, error = %e, "Position not saved");
            }
        }
        if let Err(e) = self.output.stop().await {
            warn!(error = %e, "Audio output failed to stop");
        }
        self.queue.set_active_item(None);
        self.release(loaded.pinned.as_ref(), loaded.single_use).await;
        Some(loaded.item_id)
    }

    async fn release(&self, pinned: Option<&CacheKey>, single_use: Option<PathBuf>) {
        if let Some(key) = pinned {
            self.cache.unpin(key);
        }
        if let Some(path) = single_use
            && let Err(e) = tokio::fs::remove_file(&path).await
        {
            warn!(path = %path.display(), error = %e, "Failed to delete single-use audio");
        }
    }

    // ── Transport (locked) ─────────────────────────────────────────────

    async fn pause_locked(&self) -> Result<(), PlaybackError> {
        self.session().forget_resume();
        if !self.session().is_playing() {
            return Ok(());
        }
        self.pause_output().await
    }

    async fn pause_output(&self) -> Result<(), PlaybackError> {
        self.output
            .pause()
            .await
            .map_err(|e| PlaybackError::resource_load_failed(e.to_string()))?;

        let loaded_id = self.session().loaded.as_ref().map(|l| l.item_id.clone());
        if let Some(id) = loaded_id {
            let position = self.output.position().await;
            let _ = self.queue.update_progress(&id, position);
        }
        self.session().transition(PlaybackState::Paused);
        self.publish_state().await;
        Ok(())
    }

    async fn resume_locked(&self) -> Result<(), PlaybackError> {
        if self.session().interruption.active {
            return Err(PlaybackError::InterruptedBySystem);
        }

        let state = self.session().state.clone();
        match state {
            PlaybackState::Paused => self.resume_output().await,
            PlaybackState::Playing | PlaybackState::Loading => Ok(()),
            PlaybackState::Idle | PlaybackState::Stopped | PlaybackState::Failed { .. } => {
                self.start_current(&state).await
            }
        }
    }

    async fn resume_output(&self) -> Result<(), PlaybackError> {
        self.output
            .play()
            .await
            .map_err(|e| PlaybackError::resource_load_failed(e.to_string()))?;
        self.session().transition(PlaybackState::Playing);
        self.publish_state().await;
        Ok(())
    }

    /// Play the queue's current item. From `Idle` that starts a queue
    /// session; otherwise the previous context carries over.
    async fn start_current(&self, state: &PlaybackState) -> Result<(), PlaybackError> {
        let current = self.queue.current().ok_or(PlaybackError::NothingToPlay)?;
        let context = if matches!(state, PlaybackState::Idle) {
            PlaybackContext::FromQueue
        } else {
            self.session().context.clone()
        };
        self.play_locked(&current.id, context).await
    }

    async fn stop_locked(&self) {
        self.session().forget_resume();
        let unloaded = self.unload(true).await;
        let failed = self.session().state.is_failed();
        if failed {
            // A failure has no stopped form; stopping clears it.
            self.session().transition(PlaybackState::Idle);
            info!("Cleared failed playback");
        } else if let Some(id) = unloaded {
            self.session().transition(PlaybackState::Stopped);
            info!(%id, "Stopped");
        } else {
            return;
        }
        self.publish_state().await;
    }

    async fn seek_locked(&self, seconds: f64) -> Result<(), PlaybackError> {
        let (id, duration) = self
            .session()
            .loaded
            .as_ref()
            .map(|l| (l.item_id.clone(), l.duration))
            .ok_or(PlaybackError::NothingToPlay)?;

        let target = clamp_position(seconds, duration);
        self.output
            .seek(target)
            .await
            .map_err(|e| PlaybackError::resource_load_failed(e.to_string()))?;
        let _ = self.queue.update_progress(&id, target);

        let snapshot = self.snapshot_at(target);
        self.emit(PlaybackEvent::StateChanged { snapshot });
        Ok(())
    }

    async fn skip_locked(&self, direction: f64) -> Result<(), PlaybackError> {
        let is_text = self
            .session()
            .loaded
            .as_ref()
            .map(|l| l.is_text)
            .ok_or(PlaybackError::NothingToPlay)?;
        let hop = if is_text {
            self.config.text_skip_seconds
        } else {
            self.config.stream_skip_seconds
        };
        let position = self.output.position().await;
        self.seek_locked(direction.mul_add(hop, position)).await
    }

    /// Seek to 0, or replay the current item when nothing is loaded.
    async fn restart_locked(&self) -> Result<(), PlaybackError> {
        if self.session().loaded.is_some() {
            return self.seek_locked(0.0).await;
        }
        let state = self.session().state.clone();
        self.start_current(&state).await
    }

    // ── Navigation (locked) ────────────────────────────────────────────

    async fn next_locked(&self) -> Result<(), PlaybackError> {
        let context = self.session().context.clone();
        match context {
            PlaybackContext::Standalone => {
                debug!("next ignored for a standalone play");
                Ok(())
            }
            PlaybackContext::FromQueue => match self.next_in_queue() {
                Some(id) => self.play_locked(&id, PlaybackContext::FromQueue).await,
                None => {
                    debug!("Already at the end of the queue");
                    Ok(())
                }
            },
            PlaybackContext::FromLiveFeed { feed_group } => match self.next_live_item(&feed_group) {
                Some((id, group)) => self.play_locked(&id, PlaybackContext::live_feed(group)).await,
                None => {
                    debug!(%feed_group, "No further feed group to play");
                    Ok(())
                }
            },
        }
    }

    async fn previous_locked(&self) -> Result<(), PlaybackError> {
        let loaded = self.session().loaded.is_some();
        if loaded && self.output.position().await > RESTART_THRESHOLD_SECONDS {
            return self.seek_locked(0.0).await;
        }

        let context = self.session().context.clone();
        match context {
            PlaybackContext::Standalone => self.restart_locked().await,
            PlaybackContext::FromQueue => {
                let previous = self.queue.read(|queue| {
                    queue
                        .current_index()
                        .and_then(|i| i.checked_sub(1))
                        .and_then(|i| queue.get(i))
                        .map(|item| item.id.clone())
                });
                match previous {
                    Some(id) => self.play_locked(&id, PlaybackContext::FromQueue).await,
                    None => self.restart_locked().await,
                }
            }
            PlaybackContext::FromLiveFeed { feed_group } => {
                let previous = self.session().previous_in_history();
                match previous.and_then(|id| self.queue.find(&id)) {
                    Some(item) => {
                        let group = item.feed_label().map_or(feed_group, str::to_string);
                        self.play_locked(&item.id, PlaybackContext::live_feed(group))
                            .await
                    }
                    None => self.restart_locked().await,
                }
            }
        }
    }

    fn next_in_queue(&self) -> Option<ItemId> {
        self.queue.read(|queue| {
            queue
                .current_index()
                .and_then(|i| queue.get(i + 1))
                .map(|item| item.id.clone())
        })
    }

    fn next_live_item(&self, feed_group: &str) -> Option<(ItemId, String)> {
        let played = self.session().played.clone();
        self.queue.read(|queue| {
            select_next_live_item(queue, feed_group, &played)
                .and_then(|(index, group)| queue.get(index).map(|item| (item.id.clone(), group)))
        })
    }

    // ── Autonomous advance ─────────────────────────────────────────────

    /// Play the next queue item after a natural end, skipping items that
    /// fail. Returns whether something is playing.
    async fn advance_queue(&self, from: Option<ItemId>) -> bool {
        while let Some(id) = self.next_in_queue() {
            match self.start_item(&id, PlaybackContext::FromQueue).await {
                Ok(()) => {
                    self.emit(PlaybackEvent::AutoAdvanced {
                        from_id: from,
                        to_id: id,
                    });
                    return true;
                }
                Err(e) => warn!(%id, error = %e, "Skipping item during auto-advance"),
            }
        }
        info!("Reached the end of the queue");
        false
    }

    /// Play the next feed group's item, skipping items that fail. Returns
    /// whether something is playing.
    async fn advance_live_feed(&self, from: Option<ItemId>) -> bool {
        loop {
            let PlaybackContext::FromLiveFeed { feed_group } = self.session().context.clone() else {
                return false;
            };
            let Some((id, group)) = self.next_live_item(&feed_group) else {
                info!(%feed_group, "Live feed exhausted");
                return false;
            };

            match self.start_item(&id, PlaybackContext::live_feed(group)).await {
                Ok(()) => {
                    self.emit(PlaybackEvent::AutoAdvanced {
                        from_id: from,
                        to_id: id,
                    });
                    return true;
                }
                Err(e) => warn!(%id, error = %e, "Skipping live-feed item"),
            }
        }
    }

    // ── Events ─────────────────────────────────────────────────────────

    async fn on_output_event(&self, event: OutputEvent) {
        let _op = self.op_lock.lock().await;

        let current = self
            .session()
            .loaded
            .as_ref()
            .filter(|loaded| loaded.generation == event.generation())
            .map(|loaded| loaded.item_id.clone());
        let Some(id) = current else {
            debug!(generation = event.generation(), "Ignoring stale output event");
            return;
        };

        match event {
            OutputEvent::Ended { .. } => {
                info!(%id, "Reached the end of the item");
                if let Err(e) = self.queue.mark_listened(&id) {
                    debug!(%id, error = %e, "Finished item left the queue");
                }
                self.unload(true).await;
                self.session().transition(PlaybackState::Stopped);
                self.publish_state().await;

                let context = self.session().context.clone();
                match context {
                    PlaybackContext::FromQueue => {
                        self.advance_queue(Some(id)).await;
                    }
                    PlaybackContext::FromLiveFeed { .. } => {
                        self.advance_live_feed(Some(id)).await;
                    }
                    PlaybackContext::Standalone => {}
                }
            }
            OutputEvent::Failed { reason, .. } => {
                let error = PlaybackError::resource_load_failed(reason);
                self.fail(&id, &error).await;
                if self.session().context.is_live_feed() {
                    self.advance_live_feed(Some(id)).await;
                }
            }
        }
    }

    async fn system_event_locked(&self, event: SystemEvent) -> Result<(), PlaybackError> {
        match event {
            SystemEvent::InterruptionBegan => {
                if self.session().begin_interruption() {
                    info!("Pausing for a system interruption");
                    self.pause_output().await?;
                }
            }
            SystemEvent::InterruptionEnded { should_resume } => {
                if self.session().end_interruption(should_resume) {
                    info!("Resuming after a system interruption");
                    self.resume_output().await?;
                }
            }
            SystemEvent::RouteLost => {
                self.session().forget_resume();
                if self.session().is_playing() {
                    info!("Output route lost, pausing");
                    self.pause_output().await?;
                }
            }
            SystemEvent::Foreground => {
                for item in self.queue.sweep_expired(Utc::now()) {
                    self.cancel_prefetch(&item.id);
                }
            }
        }
        Ok(())
    }

    async fn progress_tick(&self) {
        // A tick that lands during another operation is skipped.
        let Ok(_op) = self.op_lock.try_lock() else {
            return;
        };
        let playing = {
            let session = self.session();
            session
                .loaded
                .as_ref()
                .filter(|_| session.is_playing())
                .map(|l| l.item_id.clone())
        };
        let Some(id) = playing else { return };

        let position = self.output.position().await;
        if let Err(e) = self.queue.record_tick(&id, position) {
            debug!(%id, error = %e, "Progress not recorded");
        }
        let snapshot = self.snapshot_at(position);
        self.emit(PlaybackEvent::Progress { snapshot });
    }

    // ── Prefetch ───────────────────────────────────────────────────────

    fn spawn_prefetch(&self, item: &QueueItem) {
        let ItemKind::Text(text) = &item.kind else {
            return;
        };

        let mut tasks = self.prefetches();
        tasks.retain(|_, handle| !handle.is_finished());
        if tasks.contains_key(&item.id) {
            return;
        }

        let id = item.id.clone();
        let content_id = text.content_id.clone();
        let content = Arc::clone(&self.content);
        let cache = self.cache.clone();
        let speech = Arc::clone(&self.speech);
        let voice = self.config.voice.clone();

        debug!(%id, "Prefetching speech");
        let handle = tokio::spawn(async move {
            let text = match content.fetch_text(&content_id).await {
                Ok(content) => content.text,
                Err(e) => {
                    debug!(%id, error = %e, "Prefetch skipped");
                    return;
                }
            };
            match cache.resolve(&text, &voice, speech).await {
                Ok(Artifact::Cached { key, .. }) => debug!(%id, %key, "Prefetch complete"),
                // Fallback audio is not reusable; the real play will synthesize again.
                Ok(Artifact::SingleUse { path }) => {
                    let _ = tokio::fs::remove_file(&path).await;
                }
                Err(e) => warn!(%id, error = %e, "Prefetch failed"),
            }
        });
        tasks.insert(item.id.clone(), handle);
    }

    fn cancel_prefetch(&self, id: &ItemId) {
        if let Some(handle) = self.prefetches().remove(id) {
            debug!(%id, "Cancelling prefetch");
            handle.abort();
        }
    }

    fn abort_prefetches(&self) {
        for (_, handle) in self.prefetches().drain() {
            handle.abort();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.abort_prefetches();
    }
}

/// Clamp a seek target into `[0, duration]`.
fn clamp_position(seconds: f64, duration: Option<f64>) -> f64 {
    let duration = duration.filter(|d| d.is_finite());
    if !seconds.is_finite() {
        // +inf lands on the end when it is known, anything else on the start.
        return duration.filter(|_| seconds > 0.0).unwrap_or(0.0);
    }
    let seconds = seconds.max(0.0);
    duration.map_or(seconds, |d| seconds.min(d))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_position() {
        assert!((clamp_position(-5.0, None)).abs() < f64::EPSILON);
        assert!((clamp_position(f64::NAN, Some(10.0))).abs() < f64::EPSILON);
        assert!((clamp_position(42.0, Some(10.0)) - 10.0).abs() < f64::EPSILON);
        assert!((clamp_position(4.0, Some(10.0)) - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_clamp_position_infinite() {
        assert!((clamp_position(f64::INFINITY, Some(10.0)) - 10.0).abs() < f64::EPSILON);
        assert!((clamp_position(f64::INFINITY, None)).abs() < f64::EPSILON);
        assert!((clamp_position(f64::NEG_INFINITY, Some(10.0))).abs() < f64::EPSILON);
        assert!((clamp_position(30.0, Some(f64::INFINITY)) - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_config_from_settings() {
        let settings = Settings {
            voice: Some("nova".to_string()),
            playback_rate: Some(1.5),
            ..Settings::default()
        };
        let config = CoordinatorConfig::from_settings(&settings);
        assert_eq!(config.voice, "nova");
        assert!((config.initial_rate - 1.5).abs() < f64::EPSILON);
        assert!((config.text_skip_seconds - 10.0).abs() < f64::EPSILON);
        assert!((config.stream_skip_seconds - 30.0).abs() < f64::EPSILON);
        assert_eq!(config.progress_interval, Duration::from_secs(1));
    }
}
