//! Speech backend: remote synthesis with a hard timeout, local fallback.
//!
//! ## Adapters
//!
//! | Module | Port | Engine |
//! |--------|------|--------|
//! | [`http`] | `RemoteSynthesizer` | OpenAI-compatible `/v1/audio/speech` |
//! | [`command`] | `LocalSynthesizer` | `espeak-ng`-compatible command writing WAV |

pub mod command;
pub mod http;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use readcast_core::{
    LocalSynthesizer, RemoteSynthesizer, SpeechError, SpeechSynthesizer, Synthesized,
};
use tracing::{debug, warn};

pub use command::CommandLocalSynthesizer;
pub use http::HttpRemoteSynthesizer;

/// Default remote timeout.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(45);

/// Combines an optional remote synthesizer with a local fallback.
pub struct SpeechBackend {
    remote: Option<Arc<dyn RemoteSynthesizer>>,
    local: Arc<dyn LocalSynthesizer>,
    timeout: Duration,
}

impl SpeechBackend {
    pub fn new(
        remote: Option<Arc<dyn RemoteSynthesizer>>,
        local: Arc<dyn LocalSynthesizer>,
        timeout: Duration,
    ) -> Self {
        Self {
            remote,
            local,
            timeout,
        }
    }

    /// A backend that only ever synthesizes locally.
    pub fn local_only(local: Arc<dyn LocalSynthesizer>) -> Self {
        Self::new(None, local, DEFAULT_REMOTE_TIMEOUT)
    }

    #[must_use]
    pub const fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn try_remote(
        &self,
        remote: &dyn RemoteSynthesizer,
        text: &str,
        voice: &str,
    ) -> Result<Synthesized, SpeechError> {
        match tokio::time::timeout(self.timeout, remote.synthesize_remote(text, voice)).await {
            Ok(Ok(audio)) => Ok(Synthesized::Remote(audio)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SpeechError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for SpeechBackend {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Synthesized, SpeechError> {
        let remote_error = match &self.remote {
            Some(remote) => match self.try_remote(remote.as_ref(), text, voice).await {
                Ok(audio) => {
                    debug!(chars = text.len(), voice, "Remote synthesis complete");
                    return Ok(audio);
                }
                Err(e) => {
                    warn!(error = %e, "Remote synthesis failed, falling back to local");
                    Some(e)
                }
            },
            None => None,
        };

        match self.local.synthesize_local(text, voice).await {
            Ok(local) => Ok(Synthesized::Local(local)),
            Err(local_error) => Err(match remote_error {
                Some(remote_error) => SpeechError::Exhausted {
                    remote: remote_error.to_string(),
                    local: local_error.to_string(),
                },
                None => local_error,
            }),
        }
    }
}
