//! Settings command handlers.

use anyhow::{Context, Result};
use indicatif::HumanBytes;
use readcast_core::{Settings, SettingsUpdate};

use crate::bootstrap::CliContext;
use crate::commands::{SettingsCommand, SettingsSetArgs};

pub fn execute(ctx: &CliContext, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            show(&ctx.settings);
            Ok(())
        }
        SettingsCommand::Set(args) => set(ctx, args),
        SettingsCommand::Reset => reset(ctx),
    }
}

fn show(settings: &Settings) {
    println!("voice               = {}", settings.effective_voice());
    println!("playback_rate       = {}", settings.effective_playback_rate());
    println!("text_skip_seconds   = {}", settings.effective_text_skip());
    println!("stream_skip_seconds = {}", settings.effective_stream_skip());
    println!(
        "cache_max_bytes     = {} ({})",
        settings.effective_cache_max_bytes(),
        HumanBytes(settings.effective_cache_max_bytes())
    );
    println!(
        "remote_timeout      = {}s",
        settings.effective_remote_timeout().as_secs()
    );
    println!(
        "tts_endpoint        = {}",
        settings.tts_endpoint.as_deref().unwrap_or("(none, local only)")
    );
    println!("tts_model           = {}", settings.effective_tts_model());
    println!("local_tts_command   = {}", settings.effective_local_tts_command());
}

/// Build an update touching only the flags that were given.
fn to_update(args: SettingsSetArgs) -> SettingsUpdate {
    SettingsUpdate {
        voice: args.voice.map(Some),
        text_skip_seconds: args.text_skip.map(Some),
        stream_skip_seconds: args.stream_skip.map(Some),
        playback_rate: args.playback_rate.map(Some),
        cache_max_bytes: args.cache_max_bytes.map(Some),
        remote_timeout_secs: args.remote_timeout.map(Some),
        // An empty endpoint switches the remote backend off.
        tts_endpoint: args
            .tts_endpoint
            .map(|url| if url.trim().is_empty() { None } else { Some(url) }),
        tts_model: args.tts_model.map(Some),
        local_tts_command: args.local_tts_command.map(Some),
        ..SettingsUpdate::default()
    }
}

fn set(ctx: &CliContext, args: SettingsSetArgs) -> Result<()> {
    let mut settings = ctx.settings.clone();
    settings.merge(&to_update(args));
    settings
        .save(&ctx.paths.settings_path)
        .context("Failed to save settings")?;
    show(&settings);
    Ok(())
}

fn reset(ctx: &CliContext) -> Result<()> {
    let settings = Settings::with_defaults();
    settings
        .save(&ctx.paths.settings_path)
        .context("Failed to save settings")?;
    println!("Settings reset to defaults");
    Ok(())
}
