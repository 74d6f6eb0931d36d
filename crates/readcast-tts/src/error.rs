//! TTS cache error types.

use readcast_core::SpeechError;
use thiserror::Error;

/// Errors from the speech cache.
///
/// `Clone` so one synthesis outcome can be delivered to every coalesced
/// waiter; I/O errors are captured as kind and message strings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Filesystem error on an artifact or the index.
    #[error("Cache I/O error ({kind}): {message}")]
    Io { kind: String, message: String },

    /// The index file could not be parsed or written.
    #[error("Cache index error: {0}")]
    Index(String),

    /// Synthesis failed or was cancelled.
    #[error(transparent)]
    Speech(#[from] SpeechError),
}

impl CacheError {
    /// Create an I/O error from a `std::io::Error`.
    #[must_use]
    pub fn from_io_error(err: &std::io::Error) -> Self {
        Self::Io {
            kind: format!("{:?}", err.kind()),
            message: err.to_string(),
        }
    }

    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Speech(SpeechError::Cancelled))
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::from_io_error(&err)
    }
}
