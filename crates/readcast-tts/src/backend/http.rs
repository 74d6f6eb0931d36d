//! Remote synthesis over an OpenAI-compatible speech endpoint.
//!
//! `POST {base}/v1/audio/speech` with `{ model, input, voice, response_format }`
//! and an optional bearer token. The response body is the encoded audio.

use async_trait::async_trait;
use readcast_core::{AudioFormat, RemoteSynthesizer, SpeechAudio, SpeechError};
use serde::Serialize;

const SPEECH_PATH: &str = "/v1/audio/speech";

#[derive(Serialize)]
struct SpeechRequest<'a> {
    model: &'a str,
    input: &'a str,
    voice: &'a str,
    response_format: AudioFormat,
}

/// HTTP client for a remote speech service.
#[derive(Debug, Clone)]
pub struct HttpRemoteSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    format: AudioFormat,
}

impl HttpRemoteSynthesizer {
    /// `base_url` is the service root, e.g. `https://api.openai.com`.
    pub fn new(base_url: &str, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: speech_endpoint(base_url),
            api_key: None,
            model: model.into(),
            format: AudioFormat::Mp3,
        }
    }

    #[must_use]
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.trim().is_empty());
        self
    }

    #[must_use]
    pub const fn with_format(mut self, format: AudioFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn speech_endpoint(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = base.strip_suffix("/v1").unwrap_or(base);
    format!("{base}{SPEECH_PATH}")
}

#[async_trait]
impl RemoteSynthesizer for HttpRemoteSynthesizer {
    async fn synthesize_remote(&self, text: &str, voice: &str) -> Result<SpeechAudio, SpeechError> {
        let body = SpeechRequest {
            model: &self.model,
            input: text,
            voice,
            response_format: self.format,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| SpeechError::remote(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(SpeechError::remote_with_status(
                format!("{status}: {}", detail.trim()),
                status.as_u16(),
            ));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SpeechError::remote(format!("failed to read body: {e}")))?;
        if bytes.is_empty() {
            return Err(SpeechError::remote("empty audio response"));
        }

        tracing::debug!(bytes = bytes.len(), voice, "Received remote speech");
        Ok(SpeechAudio {
            bytes: bytes.to_vec(),
            format: self.format,
        })
    }
}
