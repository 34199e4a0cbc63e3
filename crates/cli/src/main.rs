//! attendlog
//!
//! Inspect, export and replay a deployment's change log.

use std::path::PathBuf;
use std::process::ExitCode;

use attendlog_engine::{Engine, EngineConfig, EngineError};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};

/// Exit code when the store could not be brought back to a saved state.
const EXIT_RESTORE_FAILED: u8 = 2;
/// Exit code when a log file was rejected or failed to apply.
const EXIT_APPLY_FAILED: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "attendlog")]
#[command(about = "Offline change-log replication for attendance records")]
#[command(version)]
struct Args {
    /// SQLite database file
    #[arg(short, long, default_value = "./attendlog.db")]
    database: PathBuf,

    /// Identity of this device
    #[arg(short, long)]
    contributor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every captured change as JSON
    Entries,
    /// Save captured changes to a log file
    Output { path: PathBuf },
    /// Replay a log file exported by another device
    Apply { path: PathBuf },
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,attendlog_engine=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let args = Args::parse();
    let config = EngineConfig::builder()
        .database_path(&args.database)
        .contributor_id(args.contributor.as_str())
        .build();
    let mut engine = Engine::new(config);
    if let Err(e) = engine.open() {
        tracing::error!("failed to open database: {e}");
        return ExitCode::FAILURE;
    }

    let code = match args.command {
        Command::Entries => print_entries(&mut engine),
        Command::Output { path } => match engine.output(Some(path.as_path())) {
            Ok(path) => {
                tracing::info!("saved log changes to {}", path.display());
                ExitCode::SUCCESS
            }
            Err(e) => {
                tracing::error!("failed to save log changes: {e}");
                ExitCode::FAILURE
            }
        },
        Command::Apply { path } => apply(&mut engine, path),
    };
    engine.close();
    code
}

fn print_entries(engine: &mut Engine) -> ExitCode {
    let rendered = engine
        .entries()
        .and_then(|entries| serde_json::to_string_pretty(&entries).map_err(EngineError::from));
    match rendered {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("failed to read log entries: {e}");
            ExitCode::FAILURE
        }
    }
}

fn apply(engine: &mut Engine, path: PathBuf) -> ExitCode {
    let records = match engine.read_log_file(&path) {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("invalid log file {}: {e}", path.display());
            return ExitCode::from(EXIT_APPLY_FAILED);
        }
    };

    tracing::info!("restoring system state");
    if let Err(e) = engine.checkout() {
        tracing::error!("system state restoration failed: {e}");
        return ExitCode::from(EXIT_RESTORE_FAILED);
    }

    match engine.apply(&records) {
        Ok(outcome) => {
            tracing::info!(
                applied = outcome.applied,
                skipped = outcome.skipped_stale + outcome.skipped_unknown,
                "applied log changes"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("log changes failed to apply: {e}");
            tracing::info!("restoring system state");
            if let Err(e) = engine.checkout() {
                tracing::error!("system state restoration failed: {e}");
                return ExitCode::from(EXIT_RESTORE_FAILED);
            }
            ExitCode::from(EXIT_APPLY_FAILED)
        }
    }
}
