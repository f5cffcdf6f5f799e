//! FitPro CLI - a command-line front end for the FitPro fitness tracker.
//!
//! Restores the saved session on start, runs one command and prints the
//! screen a graphical client would show afterwards.

mod commands;

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use fitpro_core::{
    ApiClient, Config, FileStore, KeyValueStore, KeyringStore, SessionStore, StorageBackend,
};

/// Subdirectory of the data dir holding the persisted session
const SESSION_DIR: &str = "session";

/// Subdirectory of the data dir holding daily log files
const LOG_DIR: &str = "logs";

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=fitpro_core=debug).
/// The returned guard flushes the file log when dropped.
fn init_tracing(data_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match data_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir.join(LOG_DIR), "fitpro.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

fn open_storage(config: &Config) -> Result<Arc<dyn KeyValueStore>> {
    Ok(match config.storage_backend {
        StorageBackend::File => Arc::new(FileStore::new(config.data_dir()?.join(SESSION_DIR))),
        StorageBackend::Keyring => Arc::new(KeyringStore::new()),
    })
}

fn print_usage() {
    eprintln!(
        "Usage: fitpro <command>

Commands:
  login [email]                     Log in (prompts for the password)
  signup <email> <username>         Create an account
  logout                            Forget the saved session
  status                            Show who is logged in
  profile key=value...              Set up or edit the profile
                                    keys: age weight feet inches gender level goal
  stats record key=value...         Record a measurement (weight height bodyfat)
  stats latest                      Show the latest measurement
  stats history                     List all measurements
  stats progress [weight|bodyfat]   Show progress for one measurement
  workouts                          List logged workouts
  workouts stats                    Show streak and totals
  workouts log <group> <minutes> [exercise=reps...]
                                    Log a completed workout"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let data_dir = config.data_dir().ok();
    let log_guard = init_tracing(data_dir.as_deref());
    info!(api_url = config.api_url(), "FitPro CLI starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() || args[0] == "--help" || args[0] == "-h" {
        print_usage();
        return Ok(());
    }

    let api = Arc::new(ApiClient::from_config(&config)?);
    let store = SessionStore::new(api, open_storage(&config)?);
    store.restore().await;

    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let result = commands::run(&store, &mut config, &args).await;

    info!("FitPro CLI shutting down");
    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        drop(log_guard);
        std::process::exit(1);
    }
    Ok(())
}
