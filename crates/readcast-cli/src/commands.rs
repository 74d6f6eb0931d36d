//! Subcommand definitions.
//!
//! Queue positions are 1-based on the command line, as printed by
//! `readcast queue list`.

use std::path::PathBuf;

use clap::{Args, Subcommand};

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Show the resolved data paths
    Paths,
    /// Inspect and edit the playback queue
    Queue {
        #[command(subcommand)]
        command: QueueCommand,
    },
    /// Inspect and maintain the speech cache
    Cache {
        #[command(subcommand)]
        command: CacheCommand,
    },
    /// View or change settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Play the queue on the default audio device
    #[cfg(feature = "rodio-output")]
    Play(PlayArgs),
}

/// Queue subcommands.
#[derive(Subcommand)]
pub enum QueueCommand {
    /// List queued items
    List {
        /// Print the queue snapshot as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a text file as an article
    AddText(AddTextArgs),
    /// Queue an episode by its audio URL
    AddStream(AddStreamArgs),
    /// Remove the item at a position
    Remove { position: usize },
    /// Move an item to another position
    Move { from: usize, to: usize },
    /// Make the item at a position current
    Select { position: usize },
    /// Remove every item
    Clear,
    /// Drop expired episodes that are not kept
    Sweep,
    /// Keep an item through expiry sweeps
    Keep {
        position: usize,
        /// Stop keeping the item
        #[arg(long)]
        off: bool,
    },
}

#[derive(Args, Debug)]
pub struct AddTextArgs {
    /// File containing the article text
    pub file: PathBuf,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub author: Option<String>,
    /// Feed group used for live-feed navigation
    #[arg(long)]
    pub feed: Option<String>,
    /// Insert after the current item instead of appending
    #[arg(long)]
    pub next: bool,
}

#[derive(Args, Debug)]
pub struct AddStreamArgs {
    pub url: String,
    #[arg(long)]
    pub title: String,
    /// Feed group used for live-feed navigation
    #[arg(long)]
    pub feed: Option<String>,
    /// Duration reported by the feed, in seconds
    #[arg(long)]
    pub duration: Option<f64>,
    /// Expire the episode after this many hours
    #[arg(long)]
    pub expires_in_hours: Option<i64>,
    /// Insert after the current item instead of appending
    #[arg(long)]
    pub next: bool,
}

/// Cache subcommands.
#[derive(Subcommand)]
pub enum CacheCommand {
    /// Show entry count, size and budget
    Stats,
    /// Evict least recently used entries down to a budget
    Evict {
        /// Target size in bytes (defaults to the configured budget)
        #[arg(long)]
        max_bytes: Option<u64>,
    },
    /// Synthesize queued articles ahead of playback
    Synth {
        /// Queue position of the article
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        position: Option<usize>,
        /// Every article in the queue
        #[arg(long)]
        all: bool,
    },
}

/// Settings subcommands.
#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Show effective settings
    Show,
    /// Update settings
    Set(SettingsSetArgs),
    /// Reset all settings to defaults
    Reset,
}

#[derive(Args, Debug, Default)]
pub struct SettingsSetArgs {
    /// Remote voice id
    #[arg(long)]
    pub voice: Option<String>,
    /// Playback rate (0.5-3.0)
    #[arg(long)]
    pub playback_rate: Option<f64>,
    /// Skip hop for articles, in seconds
    #[arg(long)]
    pub text_skip: Option<f64>,
    /// Skip hop for episodes, in seconds
    #[arg(long)]
    pub stream_skip: Option<f64>,
    /// Speech cache budget in bytes
    #[arg(long)]
    pub cache_max_bytes: Option<u64>,
    /// Remote synthesis timeout in seconds
    #[arg(long)]
    pub remote_timeout: Option<u64>,
    /// Speech service base URL
    #[arg(long)]
    pub tts_endpoint: Option<String>,
    /// Speech model name
    #[arg(long)]
    pub tts_model: Option<String>,
    /// Local fallback synthesis program
    #[arg(long)]
    pub local_tts_command: Option<String>,
}

/// How `readcast play` picks what follows an item.
#[cfg(feature = "rodio-output")]
#[derive(clap::ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlayMode {
    /// Play through the queue in order
    #[default]
    Queue,
    /// Play one item and stop
    Single,
    /// One item per feed group
    Live,
}

#[cfg(feature = "rodio-output")]
#[derive(Args, Debug)]
pub struct PlayArgs {
    /// Queue position to start from (defaults to the current item)
    pub position: Option<usize>,
    #[arg(long, value_enum, default_value_t)]
    pub mode: PlayMode,
}
