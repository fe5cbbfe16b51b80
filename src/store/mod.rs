//! # Telemetry Store
//!
//! Owns the current signal status, the current data usage record, their
//! bounded histories and the remote link statistics.
//!
//! All mutation happens under one exclusive lock; readers take the shared
//! lock and receive copies, never references into the store. Every mutation
//! that changes a facet enqueues exactly one [`TelemetryEvent`] while the
//! lock is held, so events leave in mutation order.

pub mod history;

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::broadcast::events::TelemetryEvent;
use crate::modem::protocol::{DataUsageRecord, RadioReading, RssiReading, SignalStatus, Source};
use history::BoundedHistory;

/// Usage reports arrive far less often than radio updates
pub const USAGE_HISTORY_DIVISOR: usize = 10;

/// One status facet update
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// RSSI only; merged into the current snapshot
    Rssi(RssiReading),
    /// Radio parameters; replaces the radio facet and is recorded in history
    Radio(RadioReading),
}

/// Remote link statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LinkStats {
    pub connected: bool,
    pub connected_since: Option<DateTime<Utc>>,
    pub last_disconnect: Option<DateTime<Utc>>,
    pub total_reconnects: u64,
    pub bytes_received: u64,
    pub messages_received: u64,
}

impl LinkStats {
    /// Time since the current connection was established
    pub fn uptime(&self, now: DateTime<Utc>) -> Option<Duration> {
        if !self.connected {
            return None;
        }
        self.connected_since
            .and_then(|since| (now - since).to_std().ok())
    }
}

#[derive(Debug)]
struct TelemetryState {
    status: Option<SignalStatus>,
    usage: Option<DataUsageRecord>,
    status_history: BoundedHistory<SignalStatus>,
    usage_history: BoundedHistory<DataUsageRecord>,
}

/// Shared telemetry state
#[derive(Debug)]
pub struct TelemetryStore {
    state: RwLock<TelemetryState>,
    link: RwLock<LinkStats>,
    events: Option<mpsc::UnboundedSender<TelemetryEvent>>,
}

impl TelemetryStore {
    /// Create a store without an event queue
    ///
    /// Status history holds `history_size` entries and usage history
    /// `history_size / 10`.
    pub fn new(history_size: usize) -> Self {
        Self::build(history_size, None)
    }

    /// Create a store that enqueues an event for every change
    pub fn with_events(history_size: usize, events: mpsc::UnboundedSender<TelemetryEvent>) -> Self {
        Self::build(history_size, Some(events))
    }

    fn build(history_size: usize, events: Option<mpsc::UnboundedSender<TelemetryEvent>>) -> Self {
        Self {
            state: RwLock::new(TelemetryState {
                status: None,
                usage: None,
                status_history: BoundedHistory::new(history_size),
                usage_history: BoundedHistory::new(history_size / USAGE_HISTORY_DIVISOR),
            }),
            link: RwLock::new(LinkStats::default()),
            events,
        }
    }

    /// Apply one status facet update and return the resulting snapshot
    ///
    /// An RSSI update keeps the latest radio facet and vice versa.
    pub fn apply_status_update(&self, update: StatusUpdate, source: Source) -> SignalStatus {
        let now = Utc::now();
        let mut state = self.state.write();

        let status = match update {
            StatusUpdate::Rssi(rssi) => SignalStatus {
                timestamp: now,
                source,
                rssi: Some(rssi),
                radio: state.status.as_ref().and_then(|s| s.radio.clone()),
            },
            StatusUpdate::Radio(radio) => {
                let status = SignalStatus {
                    timestamp: now,
                    source,
                    rssi: state.status.as_ref().and_then(|s| s.rssi),
                    radio: Some(radio),
                };
                state.status_history.push(status.clone());
                status
            }
        };

        state.status = Some(status.clone());
        self.enqueue(TelemetryEvent::Status(status.clone()));
        status
    }

    /// Record a new data usage report
    pub fn apply_usage_update(&self, record: DataUsageRecord) {
        let mut state = self.state.write();
        state.usage_history.push(record.clone());
        state.usage = Some(record.clone());
        self.enqueue(TelemetryEvent::DataUsage(record));
    }

    fn enqueue(&self, event: TelemetryEvent) {
        if let Some(events) = &self.events {
            if events.send(event).is_err() {
                debug!("Event queue closed, dropping event");
            }
        }
    }

    pub fn current_status(&self) -> Option<SignalStatus> {
        self.state.read().status.clone()
    }

    pub fn current_usage(&self) -> Option<DataUsageRecord> {
        self.state.read().usage.clone()
    }

    /// Status snapshot and usage record read under one lock
    pub fn current(&self) -> (Option<SignalStatus>, Option<DataUsageRecord>) {
        let state = self.state.read();
        (state.status.clone(), state.usage.clone())
    }

    /// Status history, oldest first
    pub fn status_history(&self) -> Vec<SignalStatus> {
        self.state.read().status_history.to_vec()
    }

    /// Usage history, oldest first
    pub fn usage_history(&self) -> Vec<DataUsageRecord> {
        self.state.read().usage_history.to_vec()
    }

    /// Timestamp of the newest status or usage update
    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        let state = self.state.read();
        let status = state.status.as_ref().map(|s| s.timestamp);
        let usage = state.usage.as_ref().map(|u| u.timestamp);
        status.max(usage)
    }

    pub fn link_stats(&self) -> LinkStats {
        self.link.read().clone()
    }

    /// Handshake succeeded
    pub fn mark_connected(&self) {
        let mut link = self.link.write();
        link.connected = true;
        link.connected_since = Some(Utc::now());
    }

    /// Read or probe failed
    pub fn mark_disconnected(&self) {
        let mut link = self.link.write();
        link.connected = false;
        link.last_disconnect = Some(Utc::now());
    }

    /// A retry attempt finished, successfully or not
    pub fn record_reconnect_attempt(&self) {
        self.link.write().total_reconnects += 1;
    }

    /// A data frame of `bytes` length arrived on the remote link
    pub fn record_frame(&self, bytes: usize) {
        let mut link = self.link.write();
        link.bytes_received += bytes as u64;
        link.messages_received += 1;
    }
}
