//! Now-playing status line for `readcast play`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use readcast_core::{NowPlayingPublisher, NowPlayingSnapshot};

use super::{format_duration, truncate_string};

const TITLE_WIDTH: usize = 48;

/// Renders now-playing snapshots as a progress bar over the item's
/// duration. Position and length are whole seconds.
pub struct NowPlayingBar {
    bar: Mutex<ProgressBar>,
    visible: bool,
}

impl NowPlayingBar {
    /// A bar drawn on stdout.
    pub fn new() -> Self {
        Self::with_visibility(true)
    }

    fn with_visibility(visible: bool) -> Self {
        Self {
            bar: Mutex::new(fresh_bar(visible)),
            visible,
        }
    }

    /// Leave the last status line on screen and stop drawing.
    pub fn finish(&self) {
        self.bar().abandon();
    }

    fn bar(&self) -> MutexGuard<'_, ProgressBar> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NowPlayingBar {
    fn default() -> Self {
        Self::new()
    }
}

impl NowPlayingPublisher for NowPlayingBar {
    fn publish(&self, snapshot: &NowPlayingSnapshot) {
        let title = snapshot
            .item
            .as_ref()
            .map_or("-", |item| item.title.as_str());
        let bar = self.bar();
        bar.set_prefix(snapshot.state.name());
        bar.set_message(format!(
            "{}  x{:.2}",
            truncate_string(title, TITLE_WIDTH),
            snapshot.rate
        ));
        match snapshot.duration_seconds.and_then(whole_seconds) {
            Some(length) => bar.set_length(length),
            None => bar.unset_length(),
        }
        bar.set_position(whole_seconds(snapshot.position_seconds).unwrap_or(0));
    }

    fn clear(&self) {
        let mut bar = self.bar();
        bar.finish_and_clear();
        *bar = fresh_bar(self.visible);
    }
}

fn fresh_bar(visible: bool) -> ProgressBar {
    let target = if visible {
        ProgressDrawTarget::stdout()
    } else {
        ProgressDrawTarget::hidden()
    };
    let bar = ProgressBar::with_draw_target(None, target);
    bar.set_style(style());
    bar
}

fn style() -> ProgressStyle {
    ProgressStyle::with_template("[{prefix}] {msg} {bar:24.cyan/blue} {clock_pos} / {clock_len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .with_key("clock_pos", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let _ = write!(w, "{}", clock(state.pos()));
        })
        .with_key("clock_len", |state: &ProgressState, w: &mut dyn std::fmt::Write| {
            let value = state.len().map_or_else(|| "?".to_string(), clock);
            let _ = write!(w, "{value}");
        })
}

#[allow(clippy::cast_precision_loss)]
fn clock(seconds: u64) -> String {
    format_duration(seconds as f64)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn whole_seconds(seconds: f64) -> Option<u64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| seconds.floor() as u64)
}
