//! CLI bootstrap - the composition root.
//!
//! The only place concrete adapters are built and wired together:
//! - JSON queue repository and `QueueStore` (via readcast-playback)
//! - Speech cache and the remote/local speech backend (via readcast-tts)
//! - File-backed content store
//!
//! Handlers receive the composed [`CliContext`].

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use readcast_core::{RemoteSynthesizer, ResolvedPaths, Settings};
use readcast_playback::{JsonQueueRepository, QueueStore};
use readcast_tts::{CommandLocalSynthesizer, HttpRemoteSynthesizer, SpeechBackend, TtsCache};
use tracing::{debug, info};

use crate::content::FileContentStore;
use crate::parser::Cli;

const LOCAL_OUTPUT_DIR: &str = "local-tts";

/// Options that override the settings file for one invocation.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub tts_endpoint: Option<String>,
    pub tts_api_key: Option<String>,
    pub local_tts_command: Option<String>,
    pub local_voice: Option<String>,
}

impl CliConfig {
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            data_dir: cli.data_dir.clone(),
            tts_endpoint: cli.tts_endpoint.clone(),
            tts_api_key: cli.tts_api_key.clone(),
            local_tts_command: cli.local_tts_command.clone(),
            local_voice: cli.local_voice.clone(),
        }
    }
}

/// Fully composed context for CLI commands.
pub struct CliContext {
    pub paths: ResolvedPaths,
    pub settings: Settings,
    pub queue: Arc<QueueStore>,
    pub cache: TtsCache,
    pub speech: Arc<SpeechBackend>,
    pub content: Arc<FileContentStore>,
}

impl CliContext {
    /// Write pending queue changes, stop the background writer and save
    /// cache access times.
    pub async fn shutdown(&self) -> Result<()> {
        self.queue
            .shutdown()
            .await
            .context("Failed to save the queue")?;
        self.cache
            .flush()
            .await
            .context("Failed to save the speech cache index")
    }
}

/// Bootstrap the CLI.
///
/// 1. Resolves the data directory and loads settings
/// 2. Restores the queue from `queue.json`
/// 3. Opens the speech cache
/// 4. Builds the speech backend (remote only when an endpoint is configured)
pub async fn bootstrap(config: CliConfig) -> Result<CliContext> {
    let paths = match &config.data_dir {
        Some(dir) => ResolvedPaths::at(dir)?,
        None => ResolvedPaths::resolve()?,
    };
    paths.ensure_dirs()?;
    debug!(root = %paths.data_root.display(), "Resolved data directory");

    let settings = Settings::load(&paths.settings_path)
        .with_context(|| format!("Failed to load {}", paths.settings_path.display()))?;

    let repository = Arc::new(JsonQueueRepository::new(&paths.queue_path));
    let queue = QueueStore::open(repository, settings.effective_persist_debounce())
        .await
        .with_context(|| format!("Failed to restore {}", paths.queue_path.display()))?;

    let cache = TtsCache::open(&paths.cache_dir, settings.effective_cache_max_bytes()).await?;
    let speech = Arc::new(build_speech_backend(&config, &settings, &paths));
    let content = Arc::new(FileContentStore::new(&paths.content_dir));

    Ok(CliContext {
        paths,
        settings,
        queue,
        cache,
        speech,
        content,
    })
}

fn build_speech_backend(config: &CliConfig, settings: &Settings, paths: &ResolvedPaths) -> SpeechBackend {
    let program = config
        .local_tts_command
        .clone()
        .unwrap_or_else(|| settings.effective_local_tts_command().to_string());
    let local = Arc::new(
        CommandLocalSynthesizer::new(program, paths.data_root.join(LOCAL_OUTPUT_DIR))
            .with_local_voice(config.local_voice.clone()),
    );

    let endpoint = config
        .tts_endpoint
        .clone()
        .or_else(|| settings.tts_endpoint.clone())
        .filter(|url| !url.trim().is_empty());
    let remote = endpoint.map(|url| {
        info!(endpoint = %url, model = settings.effective_tts_model(), "Remote speech enabled");
        Arc::new(
            HttpRemoteSynthesizer::new(&url, settings.effective_tts_model())
                .with_api_key(config.tts_api_key.clone()),
        ) as Arc<dyn RemoteSynthesizer>
    });
    if remote.is_none() {
        debug!("No speech endpoint configured, using local synthesis only");
    }

    SpeechBackend::new(remote, local, settings.effective_remote_timeout())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bootstrap_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            data_dir: Some(dir.path().join("data")),
            ..CliConfig::default()
        };

        let ctx = bootstrap(config).await.unwrap();

        assert!(ctx.paths.cache_dir.is_dir());
        assert!(ctx.paths.content_dir.is_dir());
        assert!(ctx.queue.is_empty());
        assert!(!ctx.speech.has_remote());
        ctx.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_endpoint_flag_enables_remote() {
        let dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            data_dir: Some(dir.path().to_path_buf()),
            tts_endpoint: Some("http://localhost:8880".to_string()),
            ..CliConfig::default()
        };

        let ctx = bootstrap(config).await.unwrap();
        assert!(ctx.speech.has_remote());
    }
}
