mod cli;
mod commands;
mod config;
mod error;
mod output;
mod setup;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use clixen_core::paths;
use config::ClixenConfig;
use setup::prepare_core;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = ClixenConfig::load();
    config.apply_api_key_env();

    let log_guard = init_logging(cli.verbose);

    if let Err(err) = run(cli, config).await {
        drop(log_guard);
        error::handle_error(err);
    }
}

async fn run(cli: Cli, config: ClixenConfig) -> Result<()> {
    let format = cli.format;
    let db_path = cli.db_path.or_else(|| config.default.db_path.clone());

    match cli.command {
        Commands::Completions { shell } => {
            Cli::print_completions(shell);
            Ok(())
        }
        Commands::Catalog { type_id } => commands::catalog::run(type_id, format),
        Commands::Validate(args) => commands::validate::run(&config, args, format).await,
        Commands::Generate(args) => {
            let core = prepare_core(db_path)?;
            commands::generate::run(&core, &config, args, format).await
        }
        Commands::History { command } => {
            let core = prepare_core(db_path)?;
            commands::history::run(&core, &config, command, format)
        }
    }
}

/// Log to a daily file under ~/.clixen/logs. Logging is skipped when the
/// directory cannot be created.
fn init_logging(verbose: bool) -> Option<WorkerGuard> {
    let log_dir = paths::logs_dir().ok()?;

    let file_appender = tracing_appender::rolling::daily(log_dir, "clixen.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .init();

    Some(guard)
}
