//! # Ingestion Module
//!
//! Feeds raw modem lines into the telemetry store.
//!
//! This module handles:
//! - Turning one raw line into at most one store mutation
//! - Reading lines from a local stream until end-of-stream
//! - Holding a single remote WebSocket session alive with keepalive probes
//! - Reconnecting after transport failures within a bounded retry budget

pub mod link;
pub mod stdin;
pub mod client;

use std::sync::Arc;

use tracing::{debug, info};

use crate::modem::parser::LineParser;
use crate::modem::protocol::{ModemReport, Source};
use crate::store::{StatusUpdate, TelemetryStore};

pub use client::{ClientExit, ReconnectPolicy, ResilientClient};
pub use link::{Connector, Frame, ModemLink, WsConnector};
pub use stdin::run_line_reader;

/// Parser plus store handle shared by every ingestion source
#[derive(Debug, Clone)]
pub struct LineProcessor {
    parser: LineParser,
    store: Arc<TelemetryStore>,
}

impl LineProcessor {
    pub fn new(parser: LineParser, store: Arc<TelemetryStore>) -> Self {
        Self { parser, store }
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    /// Parse one raw line and apply it to the store
    ///
    /// Returns `true` if the line was recognized. Unrecognized lines are
    /// dropped silently.
    pub fn process_line(&self, line: &str, source: Source) -> bool {
        let line = line.trim();
        if line.is_empty() {
            return false;
        }

        debug!("[{}] {}", source, line);

        let report = match self.parser.parse(line) {
            Some(report) => report,
            None => return false,
        };

        match report {
            ModemReport::Rssi(rssi) => {
                self.store.apply_status_update(StatusUpdate::Rssi(rssi), source);
                info!("[{}] RSSI: {} ({:.1} dBm)", source, rssi.code(), rssi.dbm());
            }
            ModemReport::Radio(radio) => {
                info!(
                    "[{}] {}: RSRP {:.1} dBm, SINR {:.1} dB, RSRQ {:.1} dB, quality {}, health {}",
                    source,
                    radio.system_mode(),
                    radio.rsrp_dbm(),
                    radio.sinr_db(),
                    radio.rsrq_db(),
                    radio.signal_quality(),
                    radio.health_status()
                );
                self.store.apply_status_update(StatusUpdate::Radio(radio), source);
            }
            ModemReport::Usage(record) => {
                info!(
                    "[{}] Data usage {}: up {} B, down {} B, total up {} B, total down {} B",
                    source,
                    record.report_id,
                    record.uplink_bytes,
                    record.downlink_bytes,
                    record.total_uplink,
                    record.total_downlink
                );
                self.store.apply_usage_update(record);
            }
        }

        true
    }
}
