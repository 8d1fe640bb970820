//! padlink controller — entry point.
//!
//! Connects to the device side over WebSocket, then reads producer commands
//! from stdin (one per line) and streams them as batched input messages.
//!
//! # Usage
//!
//! ```text
//! padlink-controller [OPTIONS]
//!
//! Options:
//!   --config          <PATH>  TOML configuration file
//!   --url             <URL>   WebSocket URL of the device side
//!   --connect-timeout <SECS>  Handshake timeout, 0 waits forever
//!   --batch-window-ms <MS>    Delay before each batch is drained
//! ```
//!
//! Command-line values override the configuration file; unset values fall
//! back to the file, then to built-in defaults.
//!
//! # Environment variable overrides
//!
//! | Variable                  | Default                | Description           |
//! |---------------------------|------------------------|-----------------------|
//! | `PADLINK_URL`             | `ws://127.0.0.1:8080/` | Device WebSocket URL  |
//! | `PADLINK_CONNECT_TIMEOUT` | `10`                   | Handshake timeout (s) |
//! | `PADLINK_BATCH_WINDOW_MS` | `2`                    | Batching window (ms)  |
//!
//! # Threads
//!
//! ```text
//! main thread        command loop (checks the running/closed flags)
//! stdin reader       forwards lines over a channel
//! tokio runtime      WebSocket session + Ctrl+C listener
//! dispatcher         applies transport notifications to ConnectionState
//! event sender       drains, encodes, and sends batches
//! ```

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{self, RecvTimeoutError},
    Arc,
};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use padlink_controller::application::connection_state::{ConnectionProvider, ConnectionState};
use padlink_controller::application::event_sender::EventSender;
use padlink_controller::application::feed_input::{feed_line, Flow};
use padlink_controller::infrastructure::storage::ControllerConfig;
use padlink_controller::infrastructure::transport::websocket::WsTransport;

/// How often the command loop re-checks the shutdown flags.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// padlink remote controller.
///
/// Streams pointer movement and button events to a device over WebSocket.
#[derive(Debug, Parser)]
#[command(
    name = "padlink-controller",
    about = "Streams batched pointer and button events to a padlink device",
    version
)]
struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "PADLINK_CONFIG")]
    config: Option<PathBuf>,

    /// WebSocket URL of the device side (`ws://` or `wss://`).
    #[arg(long, env = "PADLINK_URL")]
    url: Option<String>,

    /// Handshake timeout in seconds.  `0` waits forever.
    #[arg(long, env = "PADLINK_CONNECT_TIMEOUT")]
    connect_timeout: Option<u64>,

    /// Batching window in milliseconds.
    #[arg(long, env = "PADLINK_BATCH_WINDOW_MS")]
    batch_window_ms: Option<u64>,
}

impl Cli {
    /// Merges the configuration file (if any) with command-line overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` names a file that cannot be read or
    /// parsed.
    fn into_controller_config(self) -> anyhow::Result<ControllerConfig> {
        let mut config = match &self.config {
            Some(path) => ControllerConfig::load(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => ControllerConfig::default(),
        };

        if let Some(url) = self.url {
            config.connection.url = url;
        }
        if let Some(secs) = self.connect_timeout {
            config.connection.connect_timeout_secs = secs;
        }
        if let Some(ms) = self.batch_window_ms {
            config.sender.batch_window_ms = ms;
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Cli::parse().into_controller_config()?;
    info!(
        "padlink controller starting — url={}, batch window={} ms",
        config.connection.url, config.sender.batch_window_ms
    );

    // The runtime only drives I/O; the state machine and the sender run on
    // their own threads.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("padlink-io")
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    // ── Graceful shutdown flags ───────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    runtime.spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });
    let closed = Arc::new(AtomicBool::new(false));

    // ── Connection ────────────────────────────────────────────────────────────
    let transport = WsTransport::new(config.connection.url.clone(), runtime.handle().clone());
    let connection = Arc::new(ConnectionState::new(transport, config.connection_config()));

    connection.set_message_callback(Arc::new(|text| info!("device: {text}")));
    let closed_flag = Arc::clone(&closed);
    connection.set_closed_callback(Arc::new(move || {
        warn!("connection closed by the device side");
        closed_flag.store(true, Ordering::Relaxed);
    }));

    if !connection.connect() {
        bail!(
            "could not connect to {} (state: {:?})",
            config.connection.url,
            connection.status()
        );
    }

    // ── Producer loop ─────────────────────────────────────────────────────────
    let mut sender = EventSender::new(Arc::clone(&connection), config.sender_config());
    let lines = spawn_stdin_reader()?;

    while running.load(Ordering::Relaxed) && !closed.load(Ordering::Relaxed) {
        let line = match lines.recv_timeout(POLL_INTERVAL) {
            Ok(line) => line,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("stdin closed");
                break;
            }
        };

        match feed_line(&sender, &line) {
            Ok(Flow::Continue) => {}
            Ok(Flow::Quit) => break,
            Err(e) => warn!("ignoring line: {e}"),
        }
    }

    // ── Shutdown ──────────────────────────────────────────────────────────────
    sender.stop();
    connection.close();
    info!("padlink controller stopped");
    Ok(())
}

/// Reads stdin on its own thread so the command loop can watch the shutdown
/// flags while no input arrives.
fn spawn_stdin_reader() -> anyhow::Result<mpsc::Receiver<String>> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("padlink-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(rx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
