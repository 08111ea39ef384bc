mod cli;
mod handlers;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::process;
use tubefetch::config::ConfigManager;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    // Validate CLI arguments first
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    // Initialize logging based on verbosity
    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    let mut config_manager = ConfigManager::new()?;

    // Validate config on startup (unless we're about to fix it)
    if !handlers::should_skip_config_validation(&args.command) {
        if let Err(e) = config_manager.validate() {
            eprintln!("Configuration validation failed: {}", e);
            eprintln!("Run 'tubefetch config reset' to restore the defaults");
            process::exit(1);
        }
    }

    let format = args.requested_format();

    match args.command {
        Commands::Get {
            url,
            output,
            playlist,
            skip_setup,
            ..
        } => {
            handlers::handle_get(&config_manager, url, output, format, playlist, skip_setup)
                .await?;
        }
        Commands::Info { url, thumbnail } => {
            handlers::handle_info(&config_manager, url, thumbnail).await?;
        }
        Commands::History { limit, clear, yes } => {
            handlers::handle_history(&config_manager, limit, clear, yes).await?;
        }
        Commands::Setup => {
            handlers::handle_setup(&config_manager).await?;
        }
        Commands::Config { action } => {
            handlers::handle_config(&mut config_manager, action).await?;
        }
    }

    Ok(())
}
