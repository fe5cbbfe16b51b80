//! # Modem Telemetry Types
//!
//! Core data definitions for the Huawei-style unsolicited AT reports:
//! `^RSSI`, `^HCSQ` and `^DSFLOWRPT`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::classify::{health_tier, quality_tier};
use super::convert::{lte_primary_to_physical, raw_signal_to_dbm};

/// Prefix of the signal-strength report
pub const RSSI_PREFIX: &str = "^RSSI:";

/// Prefix of the LTE radio-parameter report
pub const HCSQ_PREFIX: &str = "^HCSQ:";

/// Prefix of the data-flow report
pub const DSFLOWRPT_PREFIX: &str = "^DSFLOWRPT:";

/// Number of integer fields following the mode string in `^HCSQ`
pub const HCSQ_CODE_FIELDS: usize = 4;

/// Number of hex counters following the report id in `^DSFLOWRPT`
pub const DSFLOWRPT_COUNTER_FIELDS: usize = 6;

/// Which ingestion source produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Local line stream
    Stdin,
    /// Remote terminal bridge over WebSocket
    Ttyd,
}

impl Source {
    /// Tag used in logs and JSON
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Stdin => "stdin",
            Source::Ttyd => "ttyd",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse classification of the combined LTE signal metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SignalQuality {
    Poor,
    Fair,
    Good,
    Excellent,
}

impl fmt::Display for SignalQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SignalQuality::Excellent => "Excellent",
            SignalQuality::Good => "Good",
            SignalQuality::Fair => "Fair",
            SignalQuality::Poor => "Poor",
        };
        f.write_str(name)
    }
}

/// Coarse classification of the modem operating condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HealthStatus {
    Critical,
    Degraded,
    Stable,
    Optimal,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthStatus::Optimal => "Optimal",
            HealthStatus::Stable => "Stable",
            HealthStatus::Degraded => "Degraded",
            HealthStatus::Critical => "Critical",
        };
        f.write_str(name)
    }
}

/// RSSI facet of the modem status
///
/// Only constructible from a raw code, so `rssi_dbm` always matches `rssi`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RssiReading {
    rssi: i32,
    rssi_dbm: f64,
}

impl RssiReading {
    /// Calibrate a raw `^RSSI` code
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        Self {
            rssi: code,
            rssi_dbm: raw_signal_to_dbm(code),
        }
    }

    /// Raw modem code
    pub fn code(&self) -> i32 {
        self.rssi
    }

    /// Calibrated signal strength in dBm
    pub fn dbm(&self) -> f64 {
        self.rssi_dbm
    }
}

/// Radio-parameter facet of the modem status (`^HCSQ`)
///
/// Calibrated values and both tiers are derived in [`RadioReading::calibrate`]
/// and cannot be set independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RadioReading {
    system_mode: String,
    rsrp: i32,
    rsrp_dbm: f64,
    sinr: i32,
    sinr_db: f64,
    rsrq: i32,
    rsrq_db: f64,
    signal_quality: SignalQuality,
    health_status: HealthStatus,
}

impl RadioReading {
    /// Calibrate raw RSRP/SINR/RSRQ codes and classify the result
    ///
    /// # Examples
    ///
    /// ```
    /// use lte_monitor::modem::protocol::{RadioReading, SignalQuality};
    ///
    /// let radio = RadioReading::calibrate("LTE", 90, 80, 166);
    /// assert_eq!(radio.rsrp_dbm(), -50.0);
    /// assert_eq!(radio.sinr_db(), 20.0);
    /// assert_eq!(radio.signal_quality(), SignalQuality::Excellent);
    /// ```
    #[must_use]
    pub fn calibrate(system_mode: impl Into<String>, rsrp: i32, sinr: i32, rsrq: i32) -> Self {
        let (rsrp_dbm, sinr_db, rsrq_db) = lte_primary_to_physical(rsrp, sinr, rsrq);

        Self {
            system_mode: system_mode.into(),
            rsrp,
            rsrp_dbm,
            sinr,
            sinr_db,
            rsrq,
            rsrq_db,
            signal_quality: quality_tier(rsrp_dbm, sinr_db, rsrq_db),
            health_status: health_tier(rsrp_dbm, sinr_db),
        }
    }

    pub fn system_mode(&self) -> &str {
        &self.system_mode
    }

    pub fn rsrp_code(&self) -> i32 {
        self.rsrp
    }

    pub fn rsrp_dbm(&self) -> f64 {
        self.rsrp_dbm
    }

    pub fn sinr_code(&self) -> i32 {
        self.sinr
    }

    pub fn sinr_db(&self) -> f64 {
        self.sinr_db
    }

    pub fn rsrq_code(&self) -> i32 {
        self.rsrq
    }

    pub fn rsrq_db(&self) -> f64 {
        self.rsrq_db
    }

    pub fn signal_quality(&self) -> SignalQuality {
        self.signal_quality
    }

    pub fn health_status(&self) -> HealthStatus {
        self.health_status
    }
}

/// Current modem radio state
///
/// The RSSI and radio-parameter facets are reported independently by the
/// modem; either may be absent until its first report arrives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalStatus {
    /// Time of the last update to either facet
    pub timestamp: DateTime<Utc>,

    /// Source of the last update
    pub source: Source,

    #[serde(flatten)]
    pub rssi: Option<RssiReading>,

    #[serde(flatten)]
    pub radio: Option<RadioReading>,
}

/// One `^DSFLOWRPT` data usage report
///
/// Records are never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUsageRecord {
    /// Time the report was parsed
    pub timestamp: DateTime<Utc>,

    /// Report identifier as sent by the modem (hex digits)
    pub report_id: String,

    /// Uplink bytes in the reporting interval
    pub uplink_bytes: u64,

    /// Downlink bytes in the reporting interval
    pub downlink_bytes: u64,

    /// Uplink bytes since modem boot
    pub total_uplink: u64,

    /// Downlink bytes since modem boot
    pub total_downlink: u64,
}

/// Result of parsing one recognized line
#[derive(Debug, Clone, PartialEq)]
pub enum ModemReport {
    /// Shape A, `^RSSI:<int>`
    Rssi(RssiReading),
    /// Shape B, `^HCSQ:"<mode>",<int>,<int>,<int>,<int>`
    Radio(RadioReading),
    /// Shape C, `^DSFLOWRPT:<hex>,...`
    Usage(DataUsageRecord),
}
