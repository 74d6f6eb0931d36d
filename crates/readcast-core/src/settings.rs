//! Settings domain types, validation and file persistence.
//!
//! Settings live in `settings.json` under the data root. Every field is
//! optional so older files keep loading; `effective_*` accessors supply the
//! defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::utils::atomic_write;

/// Default synthesis voice.
pub const DEFAULT_VOICE: &str = "alloy";

/// Default skip hop for text items, in seconds.
pub const DEFAULT_TEXT_SKIP_SECONDS: f64 = 10.0;

/// Default skip hop for stream items, in seconds.
pub const DEFAULT_STREAM_SKIP_SECONDS: f64 = 30.0;

/// Lowest accepted playback rate.
pub const MIN_PLAYBACK_RATE: f64 = 0.5;

/// Highest accepted playback rate.
pub const MAX_PLAYBACK_RATE: f64 = 3.0;

/// Default TTS cache budget (500 MiB).
pub const DEFAULT_CACHE_MAX_BYTES: u64 = 500 * 1024 * 1024;

/// Default quiet period before a queue write.
pub const DEFAULT_PERSIST_DEBOUNCE_MS: u64 = 500;

/// Default hard timeout for remote synthesis.
pub const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 45;

/// Default interval between progress ticks.
pub const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Default remote TTS model name.
pub const DEFAULT_TTS_MODEL: &str = "tts-1";

/// Default local synthesis program.
pub const DEFAULT_LOCAL_TTS_COMMAND: &str = "espeak-ng";

/// Clamp a playback rate into the accepted range. NaN maps to 1.0.
#[must_use]
pub fn clamp_rate(rate: f64) -> f64 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
    }
}

/// Application settings structure.
///
/// All fields are optional to support partial updates and graceful defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Voice id passed to both synthesizers.
    pub voice: Option<String>,

    /// Skip hop for text items in seconds.
    pub text_skip_seconds: Option<f64>,

    /// Skip hop for stream items in seconds.
    pub stream_skip_seconds: Option<f64>,

    /// Playback rate applied to every loaded item (0.5-3.0).
    pub playback_rate: Option<f64>,

    /// TTS cache budget in bytes.
    pub cache_max_bytes: Option<u64>,

    /// Debounce window for queue writes in milliseconds.
    pub persist_debounce_ms: Option<u64>,

    /// Remote synthesis timeout in seconds.
    pub remote_timeout_secs: Option<u64>,

    /// Progress tick interval in milliseconds.
    pub progress_interval_ms: Option<u64>,

    /// Base URL of an OpenAI-compatible speech endpoint.
    pub tts_endpoint: Option<String>,

    /// Remote model name sent with each request.
    pub tts_model: Option<String>,

    /// Program used for local synthesis.
    pub local_tts_command: Option<String>,
}

impl Settings {
    /// Create settings with sensible defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            voice: Some(DEFAULT_VOICE.to_string()),
            text_skip_seconds: Some(DEFAULT_TEXT_SKIP_SECONDS),
            stream_skip_seconds: Some(DEFAULT_STREAM_SKIP_SECONDS),
            playback_rate: Some(1.0),
            cache_max_bytes: Some(DEFAULT_CACHE_MAX_BYTES),
            persist_debounce_ms: Some(DEFAULT_PERSIST_DEBOUNCE_MS),
            remote_timeout_secs: Some(DEFAULT_REMOTE_TIMEOUT_SECS),
            progress_interval_ms: Some(DEFAULT_PROGRESS_INTERVAL_MS),
            tts_endpoint: None,
            tts_model: Some(DEFAULT_TTS_MODEL.to_string()),
            local_tts_command: Some(DEFAULT_LOCAL_TTS_COMMAND.to_string()),
        }
    }

    #[must_use]
    pub fn effective_voice(&self) -> &str {
        self.voice.as_deref().unwrap_or(DEFAULT_VOICE)
    }

    #[must_use]
    pub fn effective_text_skip(&self) -> f64 {
        self.text_skip_seconds.unwrap_or(DEFAULT_TEXT_SKIP_SECONDS)
    }

    #[must_use]
    pub fn effective_stream_skip(&self) -> f64 {
        self.stream_skip_seconds
            .unwrap_or(DEFAULT_STREAM_SKIP_SECONDS)
    }

    #[must_use]
    pub fn effective_playback_rate(&self) -> f64 {
        clamp_rate(self.playback_rate.unwrap_or(1.0))
    }

    #[must_use]
    pub fn effective_cache_max_bytes(&self) -> u64 {
        self.cache_max_bytes.unwrap_or(DEFAULT_CACHE_MAX_BYTES)
    }

    #[must_use]
    pub fn effective_persist_debounce(&self) -> Duration {
        Duration::from_millis(
            self.persist_debounce_ms
                .unwrap_or(DEFAULT_PERSIST_DEBOUNCE_MS),
        )
    }

    #[must_use]
    pub fn effective_remote_timeout(&self) -> Duration {
        Duration::from_secs(
            self.remote_timeout_secs
                .unwrap_or(DEFAULT_REMOTE_TIMEOUT_SECS),
        )
    }

    #[must_use]
    pub fn effective_progress_interval(&self) -> Duration {
        Duration::from_millis(
            self.progress_interval_ms
                .unwrap_or(DEFAULT_PROGRESS_INTERVAL_MS),
        )
    }

    #[must_use]
    pub fn effective_tts_model(&self) -> &str {
        self.tts_model.as_deref().unwrap_or(DEFAULT_TTS_MODEL)
    }

    #[must_use]
    pub fn effective_local_tts_command(&self) -> &str {
        self.local_tts_command
            .as_deref()
            .unwrap_or(DEFAULT_LOCAL_TTS_COMMAND)
    }

    /// Merge another settings into this one, only updating fields that are Some.
    pub fn merge(&mut self, other: &SettingsUpdate) {
        if let Some(ref voice) = other.voice {
            self.voice.clone_from(voice);
        }
        if let Some(hop) = other.text_skip_seconds {
            self.text_skip_seconds = hop;
        }
        if let Some(hop) = other.stream_skip_seconds {
            self.stream_skip_seconds = hop;
        }
        if let Some(rate) = other.playback_rate {
            self.playback_rate = rate;
        }
        if let Some(bytes) = other.cache_max_bytes {
            self.cache_max_bytes = bytes;
        }
        if let Some(ms) = other.persist_debounce_ms {
            self.persist_debounce_ms = ms;
        }
        if let Some(secs) = other.remote_timeout_secs {
            self.remote_timeout_secs = secs;
        }
        if let Some(ms) = other.progress_interval_ms {
            self.progress_interval_ms = ms;
        }
        if let Some(ref endpoint) = other.tts_endpoint {
            self.tts_endpoint.clone_from(endpoint);
        }
        if let Some(ref model) = other.tts_model {
            self.tts_model.clone_from(model);
        }
        if let Some(ref command) = other.local_tts_command {
            self.local_tts_command.clone_from(command);
        }
    }

    /// Load settings from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let settings: Self = serde_json::from_str(&content)
                    .map_err(|e| SettingsError::Parse(e.to_string()))?;
                validate_settings(&settings)?;
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No settings file, using defaults");
                Ok(Self::with_defaults())
            }
            Err(e) => Err(SettingsError::Io(e.to_string())),
        }
    }

    /// Validate and write settings to `path` atomically.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        validate_settings(self)?;
        let json =
            serde_json::to_vec_pretty(self).map_err(|e| SettingsError::Parse(e.to_string()))?;
        atomic_write(path, &json).map_err(|e| SettingsError::Io(e.to_string()))
    }
}

/// Partial settings update.
///
/// Each field is `Option<Option<T>>`:
/// - `None` = don't change this field
/// - `Some(None)` = set field to None/null
/// - `Some(Some(value))` = set field to value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsUpdate {
    pub voice: Option<Option<String>>,
    pub text_skip_seconds: Option<Option<f64>>,
    pub stream_skip_seconds: Option<Option<f64>>,
    pub playback_rate: Option<Option<f64>>,
    pub cache_max_bytes: Option<Option<u64>>,
    pub persist_debounce_ms: Option<Option<u64>>,
    pub remote_timeout_secs: Option<Option<u64>>,
    pub progress_interval_ms: Option<Option<u64>>,
    pub tts_endpoint: Option<Option<String>>,
    pub tts_model: Option<Option<String>>,
    pub local_tts_command: Option<Option<String>>,
}

/// Settings validation error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SettingsError {
    #[error("Playback rate must be between 0.5 and 3.0, got {0}")]
    InvalidRate(f64),

    #[error("Skip hop must be positive, got {0}")]
    InvalidSkip(f64),

    #[error("Remote timeout must be at least 1 second")]
    InvalidTimeout,

    #[error("Voice cannot be empty")]
    EmptyVoice,

    #[error("Failed to parse settings: {0}")]
    Parse(String),

    #[error("Failed to access settings file: {0}")]
    Io(String),
}

/// Validate settings values.
pub fn validate_settings(settings: &Settings) -> Result<(), SettingsError> {
    if let Some(rate) = settings.playback_rate {
        if !(MIN_PLAYBACK_RATE..=MAX_PLAYBACK_RATE).contains(&rate) {
            return Err(SettingsError::InvalidRate(rate));
        }
    }

    for hop in [settings.text_skip_seconds, settings.stream_skip_seconds]
        .into_iter()
        .flatten()
    {
        if hop.is_nan() || hop <= 0.0 {
            return Err(SettingsError::InvalidSkip(hop));
        }
    }

    if settings.remote_timeout_secs == Some(0) {
        return Err(SettingsError::InvalidTimeout);
    }

    if settings
        .voice
        .as_ref()
        .is_some_and(|v| v.trim().is_empty())
    {
        return Err(SettingsError::EmptyVoice);
    }

    Ok(())
}
