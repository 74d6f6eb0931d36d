//! Main CLI parser and global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Listen to articles and episodes from one queue.
#[derive(Parser)]
#[command(name = "readcast")]
#[command(about = "Queue articles and episodes, synthesize speech, and play them")]
#[command(version)]
pub struct Cli {
    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    /// Data directory (queue, settings, speech cache, content records)
    #[arg(long = "data-dir", env = "READCAST_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Base URL of an OpenAI-compatible speech service
    #[arg(long = "tts-endpoint", env = "READCAST_TTS_ENDPOINT", global = true)]
    pub tts_endpoint: Option<String>,

    /// Bearer token for the speech service
    #[arg(
        long = "tts-api-key",
        env = "READCAST_TTS_API_KEY",
        hide_env_values = true,
        global = true
    )]
    pub tts_api_key: Option<String>,

    /// Local fallback synthesis program (espeak-ng compatible)
    #[arg(long = "local-tts-command", env = "READCAST_LOCAL_TTS_COMMAND", global = true)]
    pub local_tts_command: Option<String>,

    /// Voice passed to the local fallback program
    #[arg(long = "local-voice", env = "READCAST_LOCAL_TTS_VOICE", global = true)]
    pub local_voice: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{CacheCommand, QueueCommand};
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from([
            "readcast",
            "--verbose",
            "--data-dir",
            "/tmp/readcast",
            "queue",
            "list",
        ]);
        assert!(cli.verbose);
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/readcast")));
        assert!(matches!(
            cli.command,
            Some(Commands::Queue {
                command: QueueCommand::List { json: false }
            })
        ));
    }

    #[test]
    fn test_add_stream_args() {
        let cli = Cli::parse_from([
            "readcast",
            "queue",
            "add-stream",
            "https://feeds.test/1.mp3",
            "--title",
            "Episode",
            "--feed",
            "news",
            "--expires-in-hours",
            "48",
            "--next",
        ]);
        let Some(Commands::Queue {
            command: QueueCommand::AddStream(args),
        }) = cli.command
        else {
            panic!("expected queue add-stream");
        };
        assert_eq!(args.url, "https://feeds.test/1.mp3");
        assert_eq!(args.feed.as_deref(), Some("news"));
        assert_eq!(args.expires_in_hours, Some(48));
        assert!(args.next);
    }

    #[test]
    fn test_cache_synth_all() {
        let cli = Cli::parse_from(["readcast", "cache", "synth", "--all"]);
        assert!(matches!(
            cli.command,
            Some(Commands::Cache {
                command: CacheCommand::Synth {
                    position: None,
                    all: true
                }
            })
        ));
    }
}
