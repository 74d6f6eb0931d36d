//! Local synthesis through an `espeak-ng`-compatible command.
//!
//! Runs `<program> [-v <voice>] -w <file.wav> --stdin` with the text on
//! stdin. Every call writes a fresh single-use WAV file in the output
//! directory; the file is removed again if the command fails or the call is
//! dropped before it finishes.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use readcast_core::{LocalSpeech, LocalSynthesizer, SpeechError};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Local synthesizer backed by an external program.
#[derive(Debug, Clone)]
pub struct CommandLocalSynthesizer {
    program: String,
    output_dir: PathBuf,
    /// Engine voice. Remote voice ids mean nothing to the local engine, so
    /// this is configured separately and omitted when unset.
    local_voice: Option<String>,
}

impl CommandLocalSynthesizer {
    pub fn new(program: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            output_dir: output_dir.into(),
            local_voice: None,
        }
    }

    #[must_use]
    pub fn with_local_voice(mut self, voice: Option<String>) -> Self {
        self.local_voice = voice;
        self
    }

    #[must_use]
    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl LocalSynthesizer for CommandLocalSynthesizer {
    async fn synthesize_local(&self, text: &str, _voice: &str) -> Result<LocalSpeech, SpeechError> {
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| SpeechError::local(format!("cannot create output dir: {e}")))?;

        // Deleted on drop until `keep` succeeds.
        let output = tempfile::Builder::new()
            .prefix("readcast-local-")
            .suffix(".wav")
            .tempfile_in(&self.output_dir)
            .map_err(|e| SpeechError::local(format!("cannot create output file: {e}")))?
            .into_temp_path();

        let mut cmd = Command::new(&self.program);
        if let Some(ref voice) = self.local_voice {
            cmd.arg("-v").arg(voice);
        }
        cmd.arg("-w")
            .arg(&*output)
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .map_err(|e| SpeechError::local(format!("failed to spawn {}: {e}", self.program)))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| SpeechError::local("missing stdin"))?;
        // A program that exits early closes the pipe; its exit status below
        // is the better error.
        if let Err(e) = stdin.write_all(text.as_bytes()).await
            && e.kind() != std::io::ErrorKind::BrokenPipe
        {
            return Err(SpeechError::local(format!("failed to write text: {e}")));
        }
        drop(stdin);

        let result = child
            .wait_with_output()
            .await
            .map_err(|e| SpeechError::local(format!("failed to wait for {}: {e}", self.program)))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(SpeechError::local(format!(
                "{} exited with {}: {}",
                self.program,
                result.status,
                stderr.trim()
            )));
        }

        let path = output
            .keep()
            .map_err(|e| SpeechError::local(format!("cannot keep output file: {e}")))?;
        tracing::debug!(path = %path.display(), "Local synthesis complete");
        Ok(LocalSpeech { path })
    }
}
