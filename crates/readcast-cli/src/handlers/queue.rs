//! Queue command handlers.
//!
//! Adding an item writes its content record first, then enqueues it. The
//! records of removed items are deleted with them.

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use readcast_core::{EnqueuePosition, ItemId, QueueItem};
use tracing::warn;

use super::to_index;
use crate::bootstrap::CliContext;
use crate::commands::{AddStreamArgs, AddTextArgs, QueueCommand};
use crate::content::ContentRecord;
use crate::presentation::print_queue;

pub async fn execute(ctx: &CliContext, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::List { json } => list(ctx, json),
        QueueCommand::AddText(args) => add_text(ctx, args).await,
        QueueCommand::AddStream(args) => add_stream(ctx, args).await,
        QueueCommand::Remove { position } => remove(ctx, position).await,
        QueueCommand::Move { from, to } => move_item(ctx, from, to),
        QueueCommand::Select { position } => select(ctx, position),
        QueueCommand::Clear => clear(ctx).await,
        QueueCommand::Sweep => sweep(ctx).await,
        QueueCommand::Keep { position, off } => keep(ctx, position, !off),
    }
}

fn list(ctx: &CliContext, json: bool) -> Result<()> {
    let snapshot = ctx.queue.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print_queue(&snapshot);
    }
    Ok(())
}

const fn enqueue_position(next: bool) -> EnqueuePosition {
    if next {
        EnqueuePosition::AfterCurrent
    } else {
        EnqueuePosition::Append
    }
}

async fn add_text(ctx: &CliContext, args: AddTextArgs) -> Result<()> {
    let text = tokio::fs::read_to_string(&args.file)
        .await
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    if text.trim().is_empty() {
        anyhow::bail!("{} contains no text", args.file.display());
    }

    let content_id = ItemId::new().to_string();
    let record = ContentRecord::Text {
        title: args.title.clone(),
        author: args.author.clone(),
        text,
    };
    ctx.content.save(&content_id, &record).await?;

    let mut item = QueueItem::text(&content_id, &args.title);
    if let Some(author) = args.author {
        item = item.with_author(author);
    }
    if let Some(feed) = args.feed {
        item = item.with_feed_label(feed);
    }

    let index = enqueue(ctx, item, &content_id, args.next).await?;
    println!("Queued '{}' at position {}", args.title, index + 1);
    Ok(())
}

async fn add_stream(ctx: &CliContext, args: AddStreamArgs) -> Result<()> {
    let content_id = ItemId::new().to_string();
    let record = ContentRecord::Stream {
        title: args.title.clone(),
        url: args.url.clone(),
        duration_seconds: args.duration,
    };
    ctx.content.save(&content_id, &record).await?;

    let mut item = QueueItem::stream(&content_id, &args.url, &args.title);
    if let Some(feed) = args.feed {
        item = item.with_feed_label(feed);
    }
    if let Some(seconds) = args.duration {
        item = item.with_known_duration(seconds);
    }
    if let Some(hours) = args.expires_in_hours {
        item = item.with_expiry(Utc::now() + Duration::hours(hours));
    }

    let index = enqueue(ctx, item, &content_id, args.next).await?;
    println!("Queued '{}' at position {}", args.title, index + 1);
    Ok(())
}

/// Enqueue, dropping the freshly written record if the queue refuses.
async fn enqueue(ctx: &CliContext, item: QueueItem, content_id: &str, next: bool) -> Result<usize> {
    match ctx.queue.enqueue(item, enqueue_position(next)) {
        Ok(index) => Ok(index),
        Err(e) => {
            ctx.content.remove(content_id).await?;
            Err(e.into())
        }
    }
}

async fn remove(ctx: &CliContext, position: usize) -> Result<()> {
    let index = to_index(position, ctx.queue.len())?;
    let item = ctx.queue.remove(index)?;
    forget_content(ctx, &item).await;
    println!("Removed '{}'", item.title());
    Ok(())
}

fn move_item(ctx: &CliContext, from: usize, to: usize) -> Result<()> {
    let len = ctx.queue.len();
    ctx.queue.move_item(to_index(from, len)?, to_index(to, len)?)?;
    println!("Moved item {from} to position {to}");
    Ok(())
}

fn select(ctx: &CliContext, position: usize) -> Result<()> {
    let item = ctx.queue.select(to_index(position, ctx.queue.len())?)?;
    println!("Current item: '{}'", item.title());
    Ok(())
}

async fn clear(ctx: &CliContext) -> Result<()> {
    let items = ctx.queue.read(|queue| queue.items().to_vec());
    let removed = ctx.queue.clear()?;
    for item in &items {
        forget_content(ctx, item).await;
    }
    println!("Removed {removed} item(s)");
    Ok(())
}

async fn sweep(ctx: &CliContext) -> Result<()> {
    let removed = ctx.queue.sweep_expired(Utc::now());
    for item in &removed {
        forget_content(ctx, item).await;
    }
    println!("Swept {} expired item(s)", removed.len());
    Ok(())
}

fn keep(ctx: &CliContext, position: usize, kept: bool) -> Result<()> {
    let index = to_index(position, ctx.queue.len())?;
    let item = ctx
        .queue
        .get(index)
        .with_context(|| format!("No item at position {position}"))?;
    ctx.queue.set_kept(&item.id, kept)?;
    let verb = if kept { "Keeping" } else { "No longer keeping" };
    println!("{verb} '{}'", item.title());
    Ok(())
}

async fn forget_content(ctx: &CliContext, item: &QueueItem) {
    let content_id = item.kind.content_id();
    if let Err(e) = ctx.content.remove(content_id).await {
        warn!(content_id, error = %e, "Failed to delete content record");
    }
}
