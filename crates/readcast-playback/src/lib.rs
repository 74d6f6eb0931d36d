#![doc = include_str!(concat!(env!("OUT_DIR"), "/README_GENERATED.md"))]
#![deny(unused_crate_dependencies)]

pub mod audio;
pub mod coordinator;
pub mod persistence;
pub mod progress_gate;
pub mod publisher;
pub mod queue_store;
pub mod remote;

pub use coordinator::{CoordinatorConfig, PlaybackCoordinator, RESTART_THRESHOLD_SECONDS};
pub use persistence::{JsonQueueRepository, MemoryQueueRepository};
pub use progress_gate::ProgressGate;
pub use publisher::spawn_now_playing_bridge;
pub use queue_store::{EVENT_CHANNEL_CAPACITY, QueueStore};
pub use remote::RemoteCommand;

#[cfg(feature = "rodio-output")]
pub use audio::RodioOutput;

// Port mocks live in the integration tests
#[cfg(test)]
use mockall as _;
