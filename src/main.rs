//! # LTE Monitor
//!
//! Reads LTE modem AT telemetry from stdin and/or a ttyd WebSocket bridge and
//! serves it over HTTP and WebSocket.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use lte_monitor::broadcast::Broadcaster;
use lte_monitor::config::{Config, LoggingConfig};
use lte_monitor::ingest::{run_line_reader, ClientExit, LineProcessor, ReconnectPolicy, ResilientClient, WsConnector};
use lte_monitor::modem::parser::LineParser;
use lte_monitor::server::{ApiServer, AppState};
use lte_monitor::shutdown;
use lte_monitor::store::TelemetryStore;

/// File name prefix for the daily rolling log
const LOG_FILE_PREFIX: &str = "lte-monitor.log";

/// Blocking work left after shutdown (a pending stdin read) is abandoned after this
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(name = "lte-monitor", version)]
#[command(about = "Monitor LTE modem signal and data usage from AT telemetry")]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// ttyd WebSocket URL; an empty string disables the remote source
    #[arg(long)]
    modem_ws_url: Option<String>,

    /// HTTP listen address (host:port)
    #[arg(short, long)]
    listen: Option<String>,

    /// Also read modem output from stdin
    #[arg(long)]
    stdin: bool,

    /// Maximum consecutive reconnect attempts (0 = unlimited)
    #[arg(long)]
    max_reconnect: Option<u32>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Load the configuration file (or defaults) and apply flag overrides
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            None => Config::default(),
        };

        if let Some(url) = &self.modem_ws_url {
            config.modem.ws_url = url.clone();
        }
        if let Some(listen) = &self.listen {
            config.server.listen_addr = listen.clone();
        }
        if self.stdin {
            config.stdin.enabled = true;
        }
        if let Some(max_reconnect) = self.max_reconnect {
            config.modem.max_reconnect = max_reconnect;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// file writer and must live until exit.
fn init_logging(logging: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let (file_layer, guard) = if logging.log_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    guard
}

/// Resolve on Ctrl+C or SIGTERM
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutting down...");
}

async fn run(config: Config) -> Result<()> {
    info!("LTE Monitor v{} starting...", env!("CARGO_PKG_VERSION"));

    let (trigger, shutdown) = shutdown::channel();
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let store = Arc::new(TelemetryStore::with_events(config.telemetry.history_size, events_tx));
    let broadcaster = Broadcaster::new(config.telemetry.subscriber_write_timeout());
    let processor = LineProcessor::new(LineParser::new(), Arc::clone(&store));

    let mut tasks = JoinSet::new();
    tasks.spawn(broadcaster.clone().run(events_rx, shutdown.clone()));

    if config.stdin.enabled {
        let processor = processor.clone();
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            let recognized = run_line_reader(tokio::io::stdin(), &processor, shutdown).await;
            info!("Stdin source finished ({} recognized lines)", recognized);
        });
    }

    if config.modem.is_enabled() {
        let connector = WsConnector::new(config.modem.ws_url.clone(), config.modem.request_timeout());
        let client = ResilientClient::new(connector, processor.clone(), ReconnectPolicy::from(&config.modem));
        let shutdown = shutdown.clone();
        tasks.spawn(async move {
            if let ClientExit::Exhausted { attempts } = client.run(shutdown).await {
                warn!("Remote modem source stopped after {} failed reconnects", attempts);
            }
        });
    } else {
        info!("Remote modem source disabled");
    }

    if !config.stdin.enabled && !config.modem.is_enabled() {
        warn!("No ingestion source enabled; serving an empty store");
    }

    let state = AppState::new(Arc::clone(&store), broadcaster, config.modem.clone());
    let server = ApiServer::bind(
        config.server.socket_addr()?,
        state,
        config.server.request_timeout(),
        config.server.shutdown_grace(),
    )
    .await
    .with_context(|| format!("Failed to bind {}", config.server.listen_addr))?;
    let server_task = tokio::spawn(server.run(shutdown.clone()));

    wait_for_signal().await;
    trigger.trigger();

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }

    let drain = async { while tasks.join_next().await.is_some() {} };
    if tokio::time::timeout(config.server.shutdown_grace(), drain).await.is_err() {
        warn!("Background tasks did not stop in time, aborting");
        tasks.abort_all();
    }

    info!("LTE Monitor stopped");
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;
    let _log_guard = init_logging(&config.logging);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;
    let result = runtime.block_on(run(config));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_prefix() {
        assert_eq!(LOG_FILE_PREFIX, "lte-monitor.log");
    }

    #[test]
    fn test_cli_defaults_to_default_config() {
        let cli = Cli::try_parse_from(["lte-monitor"]).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.modem.ws_url, "ws://localhost:7681/ws");
        assert!(!config.stdin.enabled);
    }

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "lte-monitor",
            "--modem-ws-url",
            "",
            "--listen",
            "127.0.0.1:9090",
            "--stdin",
            "--max-reconnect",
            "0",
            "--log-level",
            "debug",
        ])
        .unwrap();
        let config = cli.resolve_config().unwrap();

        assert!(!config.modem.is_enabled());
        assert_eq!(config.server.listen_addr, "127.0.0.1:9090");
        assert!(config.stdin.enabled);
        assert_eq!(config.modem.max_reconnect, 0);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_cli_rejects_invalid_override() {
        let cli = Cli::try_parse_from(["lte-monitor", "--listen", "not-an-address"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }
}
