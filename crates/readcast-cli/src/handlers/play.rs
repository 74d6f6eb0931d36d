//! Play command handler.
//!
//! Runs the playback coordinator on the default audio device until the
//! queue runs out or Ctrl-C is pressed.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use readcast_core::{
    AudioOutput, ContentStore, NowPlayingPublisher, PlaybackContext, PlaybackState,
    SpeechSynthesizer,
};
use readcast_playback::{
    CoordinatorConfig, PlaybackCoordinator, RodioOutput, spawn_now_playing_bridge,
};
use tracing::info;

use super::to_index;
use crate::bootstrap::CliContext;
use crate::commands::{PlayArgs, PlayMode};
use crate::presentation::NowPlayingBar;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

fn context_for(mode: PlayMode, feed_label: Option<&str>) -> Result<PlaybackContext> {
    Ok(match mode {
        PlayMode::Queue => PlaybackContext::FromQueue,
        PlayMode::Single => PlaybackContext::Standalone,
        PlayMode::Live => {
            let feed = feed_label.context("Live mode needs an item with a feed label")?;
            PlaybackContext::live_feed(feed)
        }
    })
}

const fn is_settled(state: &PlaybackState) -> bool {
    matches!(
        state,
        PlaybackState::Idle | PlaybackState::Stopped | PlaybackState::Failed { .. }
    )
}

pub async fn execute(ctx: &CliContext, args: PlayArgs) -> Result<()> {
    let item = match args.position {
        Some(position) => {
            let index = to_index(position, ctx.queue.len())?;
            ctx.queue.get(index)
        }
        None => ctx.queue.current(),
    }
    .context("The queue is empty")?;
    let context = context_for(args.mode, item.feed_label())?;

    let output: Arc<dyn AudioOutput> =
        Arc::new(RodioOutput::spawn().context("Failed to open the audio device")?);
    let config = CoordinatorConfig::from_settings(&ctx.settings);
    let progress_interval = config.progress_interval;
    let content: Arc<dyn ContentStore> = ctx.content.clone();
    let speech: Arc<dyn SpeechSynthesizer> = ctx.speech.clone();
    let coordinator = PlaybackCoordinator::new(
        Arc::clone(&ctx.queue),
        content,
        ctx.cache.clone(),
        speech,
        output,
        config,
    );
    coordinator.start();
    let status = Arc::new(NowPlayingBar::new());
    let publisher: Arc<dyn NowPlayingPublisher> = status.clone();
    let bridge = spawn_now_playing_bridge(coordinator.subscribe(), publisher, progress_interval);

    info!(item = %item.id, mode = ?args.mode, "Starting playback");
    let result = run(&coordinator, &item.id, context).await;

    bridge.abort();
    status.finish();
    coordinator
        .shutdown()
        .await
        .context("Failed to stop playback")?;
    result
}

async fn run(
    coordinator: &PlaybackCoordinator,
    item_id: &readcast_core::ItemId,
    context: PlaybackContext,
) -> Result<()> {
    coordinator
        .play(item_id, context)
        .await
        .context("Playback failed")?;

    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    let mut settled_polls = 0u8;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return Ok(());
            }
            _ = ticker.tick() => {
                // Between items the state passes through Stopped briefly.
                if is_settled(&coordinator.state()) {
                    settled_polls += 1;
                    if settled_polls >= 2 {
                        return Ok(());
                    }
                } else {
                    settled_polls = 0;
                }
            }
        }
    }
}
