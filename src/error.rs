//! # Error Types
//!
//! Custom error types for LTE Monitor using `thiserror`.

use std::time::Duration;

use thiserror::Error;

/// Main error type for LTE Monitor
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket transport errors (dial, read, write, probe)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// HTTP server errors
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Dial or handshake did not finish in time
    #[error("Connect to {url} timed out after {timeout:?}")]
    ConnectTimeout { url: String, timeout: Duration },

    /// No frame arrived within the read deadline
    #[error("No data received for {0:?}")]
    ReadTimeout(Duration),

    /// A write to the remote end did not complete in time
    #[error("Write stalled for {0:?}")]
    WriteTimeout(Duration),

    /// The remote end closed the connection
    #[error("Connection closed by peer")]
    PeerClosed,

    /// Writing an event to a subscriber failed or stalled
    #[error("Subscriber write failed: {0}")]
    Subscriber(String),
}

/// Result type alias for LTE Monitor
pub type Result<T> = std::result::Result<T, MonitorError>;
