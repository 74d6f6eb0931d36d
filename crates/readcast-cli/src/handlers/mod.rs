//! Command handlers.
//!
//! Handlers are thin: validate CLI input, call into the composed services
//! from [`CliContext`](crate::bootstrap::CliContext), format the result.

pub mod cache;
pub mod paths;
#[cfg(feature = "rodio-output")]
pub mod play;
pub mod queue;
pub mod settings;

use anyhow::{Result, bail};

/// Convert a 1-based position from the command line into an index.
pub fn to_index(position: usize, len: usize) -> Result<usize> {
    if position == 0 || position > len {
        bail!("No item at position {position} (the queue has {len})");
    }
    Ok(position - 1)
}
