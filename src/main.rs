//! docstash - structured documents and a disk-backed content cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use docstash::cli::{commands, Cli, Commands};
use docstash::config::{Config, ConfigManager};
use docstash::error::StashResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> StashResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    debug!("Using config {}", config_manager.path().display());

    match cli.command {
        Commands::Get(args) => commands::get(args, &config).await,
        Commands::Set(args) => commands::set(args, &config).await,
        Commands::Show(args) => commands::show(args, &config).await,
        Commands::Fetch(args) => commands::fetch(args, &config).await,
        Commands::Watch(args) => commands::watch(args, &config).await,
        Commands::Cache(args) => commands::cache(args, &config).await,
        Commands::Config(args) => commands::config(args, &config, &config_manager).await,
    }
}

/// 0 = warn, 1 = info, 2+ = debug; RUST_LOG overrides
fn init_logging(verbose: u8, config: &Config) {
    let level = match verbose {
        0 => "docstash=warn",
        1 => "docstash=info",
        _ => "docstash=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
