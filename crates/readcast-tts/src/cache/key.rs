//! Content-addressed cache keys.

use std::fmt;

use readcast_core::{AudioFormat, normalize_text};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// SHA-256 hex digest of (normalized text, voice).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// Derive the key for `text` spoken with `voice`.
    ///
    /// A NUL separator keeps `("ab", "c")` and `("a", "bc")` apart.
    #[must_use]
    pub fn for_speech(text: &str, voice: &str) -> Self {
        let normalized = normalize_text(text);
        let mut hasher = Sha256::new();
        hasher.update(normalized.as_bytes());
        hasher.update([0u8]);
        hasher.update(voice.as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Accept a 64-character lowercase hex string.
    #[must_use]
    pub fn parse(hex: &str) -> Option<Self> {
        let valid = hex.len() == 64
            && hex
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(hex.to_string()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Artifact file name, `<sha256>.<ext>`.
    #[must_use]
    pub fn file_name(&self, format: AudioFormat) -> String {
        format!("{}.{}", self.0, format.extension())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whitespace_variants_share_key() {
        let a = CacheKey::for_speech("Hello   world\n", "alloy");
        let b = CacheKey::for_speech(" Hello world", "alloy");
        assert_eq!(a, b);
    }

    #[test]
    fn test_voice_and_text_change_key() {
        let base = CacheKey::for_speech("Hello world", "alloy");
        assert_ne!(base, CacheKey::for_speech("Hello world", "nova"));
        assert_ne!(base, CacheKey::for_speech("Hello, world", "alloy"));
        assert_ne!(
            CacheKey::for_speech("ab", "c"),
            CacheKey::for_speech("a", "bc")
        );
    }

    #[test]
    fn test_key_is_sha256_hex() {
        let key = CacheKey::for_speech("x", "v");
        assert_eq!(key.as_str().len(), 64);
        assert_eq!(CacheKey::parse(key.as_str()), Some(key.clone()));
        assert!(key.file_name(AudioFormat::Mp3).ends_with(".mp3"));
        assert_eq!(CacheKey::parse("index"), None);
        assert_eq!(CacheKey::parse(&"G".repeat(64)), None);
    }
}
