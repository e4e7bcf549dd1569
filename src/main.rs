//! smsgw CLI entry point.
//!
//! Provides `receive` (modem daemon hook), `worker` (queue drainer),
//! `enqueue` and `status` subcommands.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use smsgw::config::{DeliveryMode, GatewayConfig};
use smsgw::delivery::{send_direct, TelegramClient};
use smsgw::logging::{self, LoggingGuard};
use smsgw::queue::{FsQueueStore, QueueStore};
use smsgw::sms;
use smsgw::worker::{Worker, WorkerSettings};

/// smsgw: forward SMS from a GSM modem to Telegram.
#[derive(Parser)]
#[command(name = "smsgw", version, about)]
struct Cli {
    /// Config file (default: `$SMSGW_CONFIG_PATH` or /etc/smsgw/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Drain the queue until interrupted.
    Worker,
    /// Handle one inbound SMS from the `SMS_*` environment (RunOnReceive hook).
    Receive,
    /// Put a message on the queue.
    Enqueue {
        /// Sender address.
        #[arg(long)]
        number: String,
        /// Message body.
        #[arg(long)]
        text: String,
    },
    /// Print record counts per queue state.
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config =
        GatewayConfig::load(cli.config.as_deref()).context("failed to load configuration")?;

    match cli.command {
        Command::Worker => handle_worker(&config).await,
        Command::Receive => handle_receive(&config).await,
        Command::Enqueue { number, text } => handle_enqueue(&config, &number, &text),
        Command::Status => handle_status(&config),
    }
}

/// Install logging: JSON file + stderr when a log directory is configured.
/// Replays the diagnostics collected while loading the config.
fn init_logging(config: &GatewayConfig) -> anyhow::Result<Option<LoggingGuard>> {
    let level = logging::parse_level(Some(&config.logging.level));
    let guard = match &config.logging.dir {
        Some(dir) => Some(logging::init_production(dir, level)?),
        None => {
            logging::init_cli(level);
            None
        }
    };
    config.log_notices();
    Ok(guard)
}

/// Stderr-only logging for one-shot commands.
fn init_cli_logging(config: &GatewayConfig) {
    logging::init_cli(logging::parse_level(Some(&config.logging.level)));
    config.log_notices();
}

fn open_store(config: &GatewayConfig) -> anyhow::Result<FsQueueStore> {
    let dir = config.queue.dir();
    FsQueueStore::open(&dir).with_context(|| format!("failed to open queue at {}", dir.display()))
}

/// Run the delivery worker until Ctrl-C or SIGTERM.
async fn handle_worker(config: &GatewayConfig) -> anyhow::Result<()> {
    let _logging_guard = init_logging(config)?;

    let credentials = config.telegram_credentials()?;
    let store = open_store(config)?;
    info!(queue = %store.base().display(), "queue opened");

    let worker = Worker::new(
        Arc::new(store),
        Arc::new(TelegramClient::new(credentials)),
        WorkerSettings::from_config(&config.queue),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => info!("received shutdown signal"),
            Err(e) => warn!(error = %e, "signal handler failed, shutting down"),
        }
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await;
    Ok(())
}

async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;
    Ok(())
}

/// Assemble the SMS from the hook environment, then enqueue or send it.
async fn handle_receive(config: &GatewayConfig) -> anyhow::Result<()> {
    let _logging_guard = init_logging(config)?;

    let inbound = sms::read_inbound(|key| std::env::var(key).ok())?;
    match config.delivery.mode {
        DeliveryMode::Queue => {
            let store = open_store(config)?;
            let handle = store
                .enqueue(&inbound.number, &inbound.text)
                .context("failed to enqueue message")?;
            info!(id = handle.id(), number = %inbound.number, "queued SMS");
        }
        DeliveryMode::Direct => {
            let client = TelegramClient::new(config.telegram_credentials()?);
            send_direct(
                &client,
                &inbound.number,
                &inbound.text,
                config.delivery.direct_policy(),
            )
            .await
            .context("failed to send SMS to Telegram")?;
        }
    }
    Ok(())
}

fn handle_enqueue(config: &GatewayConfig, number: &str, text: &str) -> anyhow::Result<()> {
    init_cli_logging(config);

    let store = open_store(config)?;
    let handle = store
        .enqueue(number, text)
        .context("failed to enqueue message")?;
    println!("{}", handle.id());
    Ok(())
}

fn handle_status(config: &GatewayConfig) -> anyhow::Result<()> {
    init_cli_logging(config);

    let store = open_store(config)?;
    let counts = store.counts().context("failed to read queue")?;
    print!("{counts}");
    Ok(())
}
