//! Audio output port.
//!
//! The single audio-rendering resource. Implementations own the device; the
//! coordinator is the only caller.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

/// What to load into the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// A local artifact (cached or single-use synthesized speech).
    File(PathBuf),
    /// A remote episode URL.
    Url(String),
}

/// Result of a successful load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadedMedia {
    /// Monotonic load counter. Events carry the generation of the load they
    /// belong to so late events from a replaced source can be ignored.
    pub generation: u64,
    /// Media duration in seconds, when the decoder knows it.
    pub duration: Option<f64>,
}

/// Events raised by the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputEvent {
    /// Playback reached the end of the media.
    Ended { generation: u64 },
    /// Rendering failed after a successful load.
    Failed { generation: u64, reason: String },
}

impl OutputEvent {
    #[must_use]
    pub const fn generation(&self) -> u64 {
        match self {
            Self::Ended { generation } | Self::Failed { generation, .. } => *generation,
        }
    }
}

/// Audio session events delivered by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SystemEvent {
    /// Another app or the OS took the audio session (call, alarm).
    InterruptionBegan,
    /// The interruption is over. `should_resume` is the platform's hint.
    InterruptionEnded { should_resume: bool },
    /// The active output device went away (headphones unplugged).
    RouteLost,
    /// The app came back to the foreground.
    Foreground,
}

/// Audio output errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AudioOutputError {
    #[error("Failed to load audio: {0}")]
    Load(String),

    #[error("No media loaded")]
    NotLoaded,

    #[error("Audio device error: {0}")]
    Device(String),

    #[error("Seek failed: {0}")]
    Seek(String),
}

/// Port for the audio-rendering resource.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Replace whatever is loaded with `source`, paused at position 0.
    async fn load(&self, source: AudioSource) -> Result<LoadedMedia, AudioOutputError>;

    async fn play(&self) -> Result<(), AudioOutputError>;

    async fn pause(&self) -> Result<(), AudioOutputError>;

    /// Stop and unload.
    async fn stop(&self) -> Result<(), AudioOutputError>;

    async fn seek(&self, seconds: f64) -> Result<(), AudioOutputError>;

    async fn set_rate(&self, rate: f64) -> Result<(), AudioOutputError>;

    /// Current position in seconds (0 when nothing is loaded).
    async fn position(&self) -> f64;

    fn subscribe(&self) -> broadcast::Receiver<OutputEvent>;
}
