//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Smallest accepted status history capacity
pub const MIN_HISTORY_SIZE: usize = 10;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub modem: ModemConfig,
    #[serde(default)]
    pub stdin: StdinConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote modem terminal bridge
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ModemConfig {
    /// Empty disables the remote source
    #[serde(default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// Dial and handshake timeout, also bounds closing a session
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Keepalive period; the read deadline is twice this
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// 0 = unlimited
    #[serde(default = "default_max_reconnect")]
    pub max_reconnect: u32,
}

/// Local line stream
#[derive(Debug, Deserialize, Clone, Default)]
pub struct StdinConfig {
    #[serde(default)]
    pub enabled: bool,
}

/// HTTP polling API and WebSocket endpoint
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    #[serde(default = "default_shutdown_grace_ms")]
    pub shutdown_grace_ms: u64,

    /// Header read timeout per request
    #[serde(default = "default_server_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// Store and broadcast settings
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    /// Status history capacity; usage history keeps a tenth of it
    #[serde(default = "default_history_size")]
    pub history_size: usize,

    #[serde(default = "default_subscriber_write_timeout_ms")]
    pub subscriber_write_timeout_ms: u64,
}

/// Logger settings
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Empty = stdout only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_ws_url() -> String { "ws://localhost:7681/ws".to_string() }
fn default_reconnect_delay_ms() -> u64 { 5000 }
fn default_request_timeout_ms() -> u64 { 10000 }
fn default_ping_interval_ms() -> u64 { 30000 }
fn default_max_reconnect() -> u32 { 10 }

fn default_listen_addr() -> String { "0.0.0.0:8080".to_string() }
fn default_shutdown_grace_ms() -> u64 { 5000 }
fn default_server_request_timeout_ms() -> u64 { 10000 }

fn default_history_size() -> usize { 1000 }
fn default_subscriber_write_timeout_ms() -> u64 { 2000 }

fn default_log_level() -> String { "info".to_string() }

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            max_reconnect: default_max_reconnect(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            shutdown_grace_ms: default_shutdown_grace_ms(),
            request_timeout_ms: default_server_request_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            history_size: default_history_size(),
            subscriber_write_timeout_ms: default_subscriber_write_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl ModemConfig {
    /// Whether the remote source should run at all
    pub fn is_enabled(&self) -> bool {
        !self.ws_url.trim().is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl ServerConfig {
    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .map_err(|_| invalid(format!("listen_addr '{}' is not a socket address", self.listen_addr)))
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl TelemetryConfig {
    pub fn subscriber_write_timeout(&self) -> Duration {
        Duration::from_millis(self.subscriber_write_timeout_ms)
    }
}

fn invalid(msg: impl std::fmt::Display) -> MonitorError {
    MonitorError::Config(toml::de::Error::custom(msg))
}

fn check_range(name: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(format!("{} must be between {} and {}", name, min, max)));
    }
    Ok(())
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Missing sections and fields take their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lte_monitor::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        let modem = &self.modem;
        if modem.is_enabled()
            && !(modem.ws_url.starts_with("ws://") || modem.ws_url.starts_with("wss://"))
        {
            return Err(invalid("ws_url must start with ws:// or wss://"));
        }
        check_range("reconnect_delay_ms", modem.reconnect_delay_ms, 1, 600_000)?;
        check_range("request_timeout_ms", modem.request_timeout_ms, 1, 120_000)?;
        check_range("ping_interval_ms", modem.ping_interval_ms, 1, 600_000)?;

        self.server.socket_addr()?;
        check_range("shutdown_grace_ms", self.server.shutdown_grace_ms, 0, 600_000)?;
        check_range("server request_timeout_ms", self.server.request_timeout_ms, 1, 120_000)?;

        if self.telemetry.history_size < MIN_HISTORY_SIZE {
            return Err(invalid(format!("history_size must be at least {}", MIN_HISTORY_SIZE)));
        }
        check_range(
            "subscriber_write_timeout_ms",
            self.telemetry.subscriber_write_timeout_ms,
            1,
            60_000,
        )?;

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}
