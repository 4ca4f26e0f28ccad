//! Barebone - product impression and click tracking
//!
//! Main entry point for the Barebone CLI.

mod cli;
mod cmd_replay;
mod cmd_user_id;
mod scenario;
mod store;

use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::debug;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use barebone_config::{ConfigLoader, TrackerConfig};

use crate::cli::{Cli, Commands};

/// Get the .barebone directory path.
pub(crate) fn barebone_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".barebone"))
        .unwrap_or_else(|| PathBuf::from(".barebone"))
}

/// Initialize tracing with console output and, when `log_dir` is given,
/// a daily-rotated log file.
fn init_tracing(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix("barebone")
                .filename_suffix("log")
                .max_log_files(14)
                .build(dir)?;
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Keep the writer alive for the whole process.
            static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
                std::sync::OnceLock::new();
            let _ = GUARD.set(guard);

            Some(fmt::layer().with_writer(non_blocking).with_ansi(false))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        // Console goes to stderr so command output stays clean on stdout.
        .with(
            fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .init();

    Ok(())
}

/// Config file when given, defaults otherwise, then the script URL on top.
fn load_config(
    path: Option<&Path>,
    script_src: Option<&str>,
) -> Result<TrackerConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            ConfigLoader::load(path)?
        }
        None => TrackerConfig::default(),
    };
    Ok(match script_src {
        Some(src) => ConfigLoader::from_script_src(src, config)?,
        None => config,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_deref())?;

    match cli.command {
        Commands::Replay {
            scenario,
            script_src,
            dry_run,
        } => {
            let config = load_config(cli.config.as_deref(), script_src.as_deref())?;
            cmd_replay::handle_replay(config, &scenario, dry_run).await
        }
        Commands::UserId => {
            let config = load_config(cli.config.as_deref(), None)?;
            cmd_user_id::handle_user_id(&config)
        }
    }
}
