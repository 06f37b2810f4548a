//! Recall - file-backed memoization cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use recall::cli::{Cli, Commands};
use recall::config::{Config, ConfigManager};
use recall::error::RecallResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    match run() {
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

fn run() -> RecallResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let mut config = config_manager.load()?;

    init_logging(cli.verbose, &config);

    if let Some(dir) = cli.cache_dir {
        debug!("Cache directory overridden: {}", dir.display());
        config.cache.dir = dir;
    }

    match cli.command {
        Commands::List(args) => recall::cli::commands::list(args, &config),
        Commands::Show(args) => recall::cli::commands::show(args, &config),
        Commands::Config(args) => recall::cli::commands::config(args, &config, &config_manager),
    }
}

/// Initialize logging: 0 = warn, 1 = info, 2+ = debug
fn init_logging(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 => EnvFilter::new("recall=warn"),
        1 => EnvFilter::new("recall=info"),
        _ => EnvFilter::new("recall=debug"),
    };

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
