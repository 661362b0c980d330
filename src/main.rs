//! fm163-rs: incremental NetEase Cloud Music playlist mirror.
//!
//! Each run fetches one playlist, hands every track it has not seen before
//! to an external downloader, and records the track in a local ledger so the
//! next run skips it. Ledger and metadata are replaced atomically, and only
//! after the whole playlist has been processed.

#![warn(clippy::all)]

mod cli;
mod config;
mod download;
mod exit;
mod netease;
mod registry;
pub mod retry;
mod state;
mod sync;
mod types;

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use cli::Mode;
use config::{Config, ConfigError};
use download::CommandDownloader;
use netease::NeteaseClient;
use registry::{LeanCloudRegistry, TrackRegistry};
use state::{StateDir, StateError};
use sync::{DownloadOptions, Syncer};

async fn run(config: Config) -> anyhow::Result<()> {
    let state = StateDir::new(&config.data_dir);
    tracing::debug!(?config, "Using data directory {}", state.root().display());
    let api = NeteaseClient::new(config.retry)?;
    let registry = config
        .leancloud
        .as_ref()
        .map(|lc| LeanCloudRegistry::new(&lc.server_url, &lc.app_id, &lc.app_key))
        .transpose()?;

    let syncer = Syncer {
        state: &state,
        api: &api,
        registry: registry.as_ref().map(|r| r as &dyn TrackRegistry),
    };

    match config.mode {
        Mode::Download { playlist, dry_run } => {
            let downloader = CommandDownloader::new(config.downloader_command.clone());
            let options = DownloadOptions {
                dry_run,
                quality: config.quality,
            };
            syncer.download(playlist, &downloader, options).await?;
        }
        Mode::Export => {
            syncer.export().await?;
        }
        Mode::Migrate => {
            syncer.migrate().await?;
        }
    }
    Ok(())
}

/// Print a failed run to stderr and pick the exit status.
fn report(err: &anyhow::Error) -> ExitCode {
    let code = exit::exit_code(err);
    if err
        .downcast_ref::<StateError>()
        .is_some_and(StateError::is_internal)
    {
        eprintln!("Most likely you have encountered a bug.");
        eprintln!("Please report it together with the message below.\n");
        eprintln!("{err:?}");
    } else {
        eprintln!("Error: {err:#}");
        if matches!(err.downcast_ref::<ConfigError>(), Some(ConfigError::Usage(_))) {
            eprintln!("{}", cli::Cli::command().render_usage());
        }
    }
    ExitCode::from(code)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(exit::EX_USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // stdout carries the per-track SKIP/FAILED lines, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_filter())),
        )
        .init();

    let result = match Config::from_cli(cli) {
        Ok(config) => run(config).await,
        Err(e) => Err(e.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report(&e),
    }
}
