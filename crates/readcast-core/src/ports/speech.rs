//! Speech synthesis ports.
//!
//! Two engines sit behind these traits: a remote, high-fidelity service whose
//! output is cacheable, and a local engine that is always available but
//! produces a lower-fidelity, single-use file. [`SpeechSynthesizer`] is the
//! combined view the cache and coordinator consume.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Shared types ───────────────────────────────────────────────────

/// Container format of synthesized audio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Mp3,
    Wav,
    Opus,
}

impl AudioFormat {
    /// File extension for artifacts of this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mp3 => "mp3",
            Self::Wav => "wav",
            Self::Opus => "opus",
        }
    }

    /// Parse a file extension (case-insensitive).
    #[must_use]
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "mp3" => Some(Self::Mp3),
            "wav" => Some(Self::Wav),
            "opus" => Some(Self::Opus),
            _ => None,
        }
    }
}

/// Encoded audio returned by a remote synthesizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechAudio {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// A file produced by the local engine. Never cached; the owner deletes it
/// once it is no longer loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalSpeech {
    pub path: PathBuf,
}

/// Output of [`SpeechSynthesizer::synthesize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Synthesized {
    /// Cacheable remote audio.
    Remote(SpeechAudio),
    /// Single-use local fallback artifact.
    Local(LocalSpeech),
}

impl Synthesized {
    #[must_use]
    pub const fn is_cacheable(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}

// ── Errors ─────────────────────────────────────────────────────────

/// Speech synthesis errors.
///
/// `Clone` so a single failed synthesis can be handed to every coalesced
/// waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SpeechError {
    /// The remote call did not complete within the configured timeout.
    #[error("Remote synthesis timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Remote service returned an error or was unreachable.
    #[error("Remote synthesis failed: {message}")]
    Remote {
        message: String,
        status_code: Option<u16>,
    },

    /// Local engine failed.
    #[error("Local synthesis failed: {0}")]
    Local(String),

    /// Nothing to synthesize.
    #[error("Text is empty")]
    EmptyText,

    /// Every caller waiting on this synthesis went away.
    #[error("Synthesis cancelled")]
    Cancelled,

    /// Remote failed and the local fallback failed too.
    #[error("Synthesis failed (remote: {remote}; local: {local})")]
    Exhausted { remote: String, local: String },
}

impl SpeechError {
    pub fn remote(message: impl Into<String>) -> Self {
        Self::Remote {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn remote_with_status(message: impl Into<String>, status_code: u16) -> Self {
        Self::Remote {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn local(message: impl Into<String>) -> Self {
        Self::Local(message.into())
    }
}

// ── Ports ──────────────────────────────────────────────────────────

/// Remote, cacheable synthesis.
#[async_trait]
pub trait RemoteSynthesizer: Send + Sync {
    async fn synthesize_remote(&self, text: &str, voice: &str) -> Result<SpeechAudio, SpeechError>;
}

/// Local, always-available synthesis writing a single-use file.
#[async_trait]
pub trait LocalSynthesizer: Send + Sync {
    async fn synthesize_local(&self, text: &str, voice: &str) -> Result<LocalSpeech, SpeechError>;
}

/// Uniform synthesis interface: remote first, local on failure.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Synthesized, SpeechError>;
}
