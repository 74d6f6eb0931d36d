//! Port definitions (trait abstractions) for external systems.
//!
//! Ports define the interfaces that the playback engine expects from
//! infrastructure. They contain no implementation details and use only
//! domain types.
//!
//! # Design Rules
//!
//! - No HTTP, device or process types in any signature
//! - Async traits use `async_trait` and are `Send + Sync` for `Arc<dyn _>`
//! - Each port carries its own error enum; the coordinator maps them to
//!   [`PlaybackError`](crate::PlaybackError)

pub mod audio_output;
pub mod content_store;
pub mod now_playing;
pub mod queue_repository;
pub mod speech;

pub use audio_output::{
    AudioOutput, AudioOutputError, AudioSource, LoadedMedia, OutputEvent, SystemEvent,
};
pub use content_store::{ContentError, ContentStore, StreamInfo, TextContent};
pub use now_playing::{NoopPublisher, NowPlayingPublisher};
pub use queue_repository::{
    QUEUE_DOCUMENT_VERSION, QueueDocument, QueueRepository, RepositoryError,
};
pub use speech::{
    AudioFormat, LocalSpeech, LocalSynthesizer, RemoteSynthesizer, SpeechAudio, SpeechError,
    SpeechSynthesizer, Synthesized,
};
