//! Remote-control commands.
//!
//! System media controls (lock screen, headset buttons, media keys) deliver
//! one of these; [`PlaybackCoordinator::dispatch`](crate::PlaybackCoordinator::dispatch)
//! maps each onto the matching coordinator operation.

use serde::{Deserialize, Serialize};

/// A transport command from outside the app.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum RemoteCommand {
    Play,
    Pause,
    Toggle,
    Stop,
    SkipForward,
    SkipBackward,
    Next,
    Previous,
    /// Absolute position in seconds.
    SeekTo(f64),
    SetRate(f64),
}

impl RemoteCommand {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Play => "play",
            Self::Pause => "pause",
            Self::Toggle => "toggle",
            Self::Stop => "stop",
            Self::SkipForward => "skip_forward",
            Self::SkipBackward => "skip_backward",
            Self::Next => "next",
            Self::Previous => "previous",
            Self::SeekTo(_) => "seek_to",
            Self::SetRate(_) => "set_rate",
        }
    }
}
