#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod backend;
pub mod cache;
pub mod error;

pub use backend::{
    CommandLocalSynthesizer, DEFAULT_REMOTE_TIMEOUT, HttpRemoteSynthesizer, SpeechBackend,
};
pub use cache::{Artifact, CacheEntry, CacheKey, CacheStats, TtsCache};
pub use error::CacheError;
