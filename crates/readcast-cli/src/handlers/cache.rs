//! Speech cache command handlers.

use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::HumanBytes;
use readcast_core::{ContentStore, QueueItem, SpeechSynthesizer};
use readcast_tts::Artifact;
use tracing::{info, warn};

use super::to_index;
use crate::bootstrap::CliContext;
use crate::commands::CacheCommand;

pub async fn execute(ctx: &CliContext, command: CacheCommand) -> Result<()> {
    match command {
        CacheCommand::Stats => {
            stats(ctx);
            Ok(())
        }
        CacheCommand::Evict { max_bytes } => evict(ctx, max_bytes).await,
        CacheCommand::Synth { position, all } => synth(ctx, position, all).await,
    }
}

fn stats(ctx: &CliContext) {
    let stats = ctx.cache.stats();
    println!("Directory: {}", ctx.cache.dir().display());
    println!("Entries:   {}", stats.entries);
    println!(
        "Size:      {} of {}",
        HumanBytes(stats.total_bytes),
        HumanBytes(stats.max_bytes)
    );
}

async fn evict(ctx: &CliContext, max_bytes: Option<u64>) -> Result<()> {
    let target = max_bytes.unwrap_or_else(|| ctx.cache.max_bytes());
    let evicted = ctx
        .cache
        .evict_lru(target)
        .await
        .context("Failed to evict cache entries")?;
    println!(
        "Evicted {} entr{} (limit {})",
        evicted.len(),
        if evicted.len() == 1 { "y" } else { "ies" },
        HumanBytes(target)
    );
    Ok(())
}

/// Synthesize ahead of playback so the first play is a cache hit.
async fn synth(ctx: &CliContext, position: Option<usize>, all: bool) -> Result<()> {
    let targets: Vec<QueueItem> = if all {
        ctx.queue
            .read(|queue| queue.items().iter().filter(|i| i.is_text()).cloned().collect())
    } else {
        let position = position.context("Give a position or --all")?;
        let index = to_index(position, ctx.queue.len())?;
        let item = ctx
            .queue
            .get(index)
            .with_context(|| format!("No item at position {position}"))?;
        if !item.is_text() {
            anyhow::bail!("'{}' is a stream and needs no speech", item.title());
        }
        vec![item]
    };

    let voice = ctx.settings.effective_voice().to_string();
    let synthesizer: Arc<dyn SpeechSynthesizer> = ctx.speech.clone();
    let mut failures = 0usize;

    for item in &targets {
        match synth_one(ctx, item, &voice, synthesizer.clone()).await {
            Ok(artifact) => {
                let origin = if artifact.is_single_use() {
                    "local fallback, not cached"
                } else {
                    "cached"
                };
                println!("{}: {origin}", item.title());
            }
            Err(e) => {
                failures += 1;
                warn!(item = %item.id, error = %e, "Synthesis failed");
                println!("{}: failed ({e:#})", item.title());
            }
        }
    }

    info!(items = targets.len(), failures, "Synthesis finished");
    if failures > 0 {
        anyhow::bail!("{failures} of {} item(s) failed", targets.len());
    }
    Ok(())
}

async fn synth_one(
    ctx: &CliContext,
    item: &QueueItem,
    voice: &str,
    synthesizer: Arc<dyn SpeechSynthesizer>,
) -> Result<Artifact> {
    let content = ctx.content.fetch_text(item.kind.content_id()).await?;
    let artifact = ctx.cache.resolve(&content.text, voice, synthesizer).await?;
    // Local output is never cached; nothing will play it from here.
    if let Artifact::SingleUse { path } = &artifact
        && let Err(e) = tokio::fs::remove_file(path).await
    {
        warn!(path = %path.display(), error = %e, "Failed to delete local speech file");
    }
    Ok(artifact)
}
