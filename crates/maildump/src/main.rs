//! maildump — incrementally dump an IMAP account to a local directory.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod config;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use maildump_core::{Dumper, MailRepository, RunMode};
use maildump_imap::ImapSession;

use cli::Cli;
use config::Settings;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = cli.logging.as_str();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("maildump={level},maildump_core={level},maildump_imap={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = Settings::default();
    settings.load_files(&cli.config_files)?;
    settings.apply_cli(&cli);

    let config = settings.into_dump_config(cli.mode(), cli.dry_run)?;

    info!(
        user = %config.session.username,
        host = %config.session.host,
        port = config.session.port,
        "dumping account"
    );

    if config.dry_run {
        info!("dry run mode activated, nothing will actually be changed");
    }
    match config.mode {
        RunMode::Recreate => {
            info!("RECREATE MODE ACTIVATED, DUMP FOLDER AND CACHE WILL BE RECREATED!");
        }
        RunMode::Mirror => {
            info!("mirror mode activated, unknown files/folders in the dump folder will be removed");
        }
        RunMode::Incremental => {}
    }

    let session = ImapSession::connect(&config.session)
        .await
        .context("connecting to the IMAP server")?;

    let store = MailRepository::open(
        &config.database_file,
        config.mode.is_recreate(),
        config.dry_run,
    )
    .await
    .context("opening the cache database")?;

    let mut dumper = Dumper::new(session, store, config);

    let outcome = tokio::select! {
        result = dumper.run() => Some(result),
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            None
        }
    };

    // the store is closed whatever the run's outcome was
    dumper.close().await;

    match outcome {
        Some(Ok(summary)) => {
            info!(
                written = summary.written,
                skipped = summary.skipped,
                bytes = summary.bytes_written,
                "run complete"
            );
            Ok(())
        }
        Some(Err(err)) => {
            error!(error = %err, "dump failed");
            Err(err.into())
        }
        None => Ok(()),
    }
}
