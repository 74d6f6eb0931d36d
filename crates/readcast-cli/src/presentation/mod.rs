//! Terminal output helpers.

mod progress;
mod tables;

pub use progress::NowPlayingBar;
pub use tables::{format_duration, print_queue, print_separator, truncate_string};
