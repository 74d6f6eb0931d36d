//! CLI entry point.
//!
//! Parses arguments, composes services via [`bootstrap`], then hands the
//! context to one handler. The queue is flushed before exit.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use readcast_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before clap reads READCAST_*
    dotenvy::dotenv().ok();

    // Parse CLI arguments
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CliConfig::from_cli(&cli);
    let Some(command) = cli.command else {
        // No command provided - show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    // Bootstrap the CLI context (composition root)
    let ctx = bootstrap(config).await?;

    let result = match command {
        Commands::Paths => {
            handlers::paths::execute(&ctx);
            Ok(())
        }
        Commands::Queue { command } => handlers::queue::execute(&ctx, command).await,
        Commands::Cache { command } => handlers::cache::execute(&ctx, command).await,
        Commands::Settings { command } => handlers::settings::execute(&ctx, command),
        #[cfg(feature = "rodio-output")]
        Commands::Play(args) => handlers::play::execute(&ctx, args).await,
    };

    // Save queue changes even when the command failed part-way
    ctx.shutdown().await?;
    result
}
