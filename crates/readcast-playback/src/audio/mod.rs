//! Audio output adapters.
//!
//! The coordinator only sees the [`AudioOutput`](readcast_core::AudioOutput)
//! port. With the `rodio-output` feature, [`RodioOutput`] renders to the
//! default output device.

#[cfg(feature = "rodio-output")]
mod rodio_output;

#[cfg(feature = "rodio-output")]
pub use rodio_output::RodioOutput;
