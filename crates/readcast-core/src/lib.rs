#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod domain;
pub mod errors;
pub mod events;
pub mod paths;
pub mod ports;
pub mod settings;
pub mod utils;

// Re-export commonly used types for convenience
pub use domain::{
    EnqueuePosition, ItemId, ItemKind, ItemSummary, NowPlayingSnapshot, PlaybackContext,
    PlaybackState, Queue, QueueItem, QueueSnapshot, RemoveOutcome, StreamItem, TextItem,
    select_next_live_item,
};
pub use errors::{PlaybackError, QueueError};
pub use events::PlaybackEvent;
pub use ports::{
    AudioFormat, AudioOutput, AudioOutputError, AudioSource, ContentError, ContentStore,
    LoadedMedia, LocalSpeech, LocalSynthesizer, NoopPublisher, NowPlayingPublisher, OutputEvent,
    QUEUE_DOCUMENT_VERSION, QueueDocument, QueueRepository, RemoteSynthesizer, RepositoryError,
    SpeechAudio, SpeechError, SpeechSynthesizer, StreamInfo, Synthesized, SystemEvent,
    TextContent,
};
pub use settings::{Settings, SettingsError, SettingsUpdate, clamp_rate, validate_settings};

pub use paths::{PathError, ResolvedPaths, cache_dir, data_root, queue_document_path, settings_path};
pub use utils::{atomic_write, normalize_text};
