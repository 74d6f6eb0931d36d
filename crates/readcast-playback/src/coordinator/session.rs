//! Mutable coordinator state.
//!
//! Everything here is guarded by one `std::sync::Mutex` that is never held
//! across an await.

use std::collections::HashSet;
use std::path::PathBuf;

use readcast_core::{ItemId, PlaybackContext, PlaybackState};
use readcast_tts::CacheKey;
use tracing::{debug, warn};

/// The resource currently loaded in the audio output.
#[derive(Debug)]
pub(super) struct Loaded {
    pub item_id: ItemId,
    /// Output generation; events from other generations are stale.
    pub generation: u64,
    pub duration: Option<f64>,
    pub is_text: bool,
    /// Cache entry backing the audio, unpinned on unload.
    pub pinned: Option<CacheKey>,
    /// Local fallback file, deleted on unload.
    pub single_use: Option<PathBuf>,
}

/// System audio interruption bookkeeping.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(super) struct Interruption {
    pub active: bool,
    /// The interruption paused playback and the user has not paused since.
    pub resume_on_end: bool,
}

#[derive(Debug)]
pub(super) struct Session {
    pub state: PlaybackState,
    pub context: PlaybackContext,
    /// Item shown in snapshots: loading, playing, paused, stopped or failed.
    pub item: Option<ItemId>,
    pub loaded: Option<Loaded>,
    pub rate: f64,
    pub interruption: Interruption,
    /// Live-feed items in the order they were played this session.
    pub history: Vec<ItemId>,
    /// Live-feed items already played (or attempted) this session.
    pub played: HashSet<ItemId>,
}

impl Session {
    pub fn new(rate: f64) -> Self {
        Self {
            state: PlaybackState::Idle,
            context: PlaybackContext::Standalone,
            item: None,
            loaded: None,
            rate,
            interruption: Interruption::default(),
            history: Vec::new(),
            played: HashSet::new(),
        }
    }

    /// Move to `next` if the state machine allows it.
    pub fn transition(&mut self, next: PlaybackState) -> bool {
        if self.state == next {
            return false;
        }
        if !self.state.can_transition_to(&next) {
            warn!(from = %self.state, to = %next, "Ignoring illegal playback transition");
            return false;
        }
        debug!(from = %self.state, to = %next, "Playback state changed");
        self.state = next;
        true
    }

    /// Record that `id` is about to be loaded under `context`.
    pub fn enter(&mut self, id: &ItemId, context: PlaybackContext) {
        if context.is_live_feed() {
            if self.history.last() != Some(id) {
                self.history.push(id.clone());
            }
            self.played.insert(id.clone());
        } else {
            self.history.clear();
            self.played.clear();
        }
        self.item = Some(id.clone());
        self.context = context;
    }

    /// The live-feed item played before the current one, removing both from
    /// the history.
    pub fn previous_in_history(&mut self) -> Option<ItemId> {
        if self.history.last() == self.item.as_ref() {
            self.history.pop();
        }
        self.history.pop()
    }

    pub const fn is_playing(&self) -> bool {
        matches!(self.state, PlaybackState::Playing)
    }

    /// Start an interruption. Returns whether playback must be paused.
    pub fn begin_interruption(&mut self) -> bool {
        if self.interruption.active {
            return false;
        }
        let playing = self.is_playing();
        self.interruption = Interruption {
            active: true,
            resume_on_end: playing,
        };
        playing
    }

    /// End an interruption. Returns whether playback should resume.
    pub fn end_interruption(&mut self, should_resume: bool) -> bool {
        let resume = self.interruption.active
            && self.interruption.resume_on_end
            && should_resume
            && matches!(self.state, PlaybackState::Paused);
        self.interruption = Interruption::default();
        resume
    }

    /// A user or route-driven pause cancels any pending auto-resume.
    pub const fn forget_resume(&mut self) {
        self.interruption.resume_on_end = false;
    }

    /// Back to the initial state. Only legal from `Stopped` or `Failed`.
    pub fn reset(&mut self) {
        self.transition(PlaybackState::Idle);
        self.context = PlaybackContext::Standalone;
        self.item = None;
        self.interruption = Interruption::default();
        self.history.clear();
        self.played.clear();
    }
}
