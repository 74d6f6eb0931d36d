//! Playback state machine values.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The single playback state owned by the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
    Stopped,
    Failed {
        reason: String,
    },
}

impl PlaybackState {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }

    /// Whether a resource is loaded (playing or paused).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }

    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Whether `next` is a legal successor of `self`.
    ///
    /// ```text
    /// Idle ─play─▶ Loading ─ok─▶ Playing ◀─toggle─▶ Paused
    ///                 │              │                 │
    ///                 └─err─▶ Failed  └──stop/end─▶ Stopped
    /// Stopped/Failed ─reset─▶ Idle
    /// any but Idle ─play─▶ Loading
    /// ```
    #[must_use]
    pub const fn can_transition_to(&self, next: &Self) -> bool {
        use PlaybackState::{Failed, Idle, Loading, Paused, Playing, Stopped};
        matches!(
            (self, next),
            (Idle | Stopped | Failed { .. } | Playing | Paused | Loading, Loading)
                | (Loading, Playing | Paused | Failed { .. } | Stopped)
                | (Playing, Paused | Stopped | Failed { .. })
                | (Paused, Playing | Stopped | Failed { .. })
                | (Stopped | Failed { .. }, Idle)
        )
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed { reason } => write!(f, "failed ({reason})"),
            other => f.write_str(other.name()),
        }
    }
}
