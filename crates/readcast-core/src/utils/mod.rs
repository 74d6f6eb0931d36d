//! Small shared helpers.

mod atomic;
mod text;

pub use atomic::atomic_write;
pub use text::normalize_text;
