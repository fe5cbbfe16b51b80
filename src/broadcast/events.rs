use serde::Serialize;

use crate::modem::protocol::{DataUsageRecord, SignalStatus};

/// State-change events pushed to subscribers
///
/// Serialized as `{"type": "status", "data": {...}}` or
/// `{"type": "data_usage", "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TelemetryEvent {
    /// The signal status snapshot changed
    Status(SignalStatus),

    /// A new data usage report arrived
    DataUsage(DataUsageRecord),
}

impl TelemetryEvent {
    /// Event tag as it appears on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            TelemetryEvent::Status(_) => "status",
            TelemetryEvent::DataUsage(_) => "data_usage",
        }
    }

    /// Serialize to one JSON text frame
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
