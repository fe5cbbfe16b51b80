//! # Unit Conversion
//!
//! Maps raw modem integer codes to calibrated physical units.
//!
//! ## RSSI (`^RSSI`, 3GPP 27.007 CSQ scale)
//!
//! | Code | dBm |
//! |------|-----|
//! | 0 | -113 |
//! | 1 | -111 |
//! | 2..=30 | -109 + 2 × (code - 2) |
//! | 31 | -51 |
//! | other | -113 |
//!
//! ## LTE parameters (`^HCSQ`)
//!
//! Each quantity is an affine map `offset + scale × code`:
//!
//! - RSRP: `-140 + code` dBm
//! - SINR: `-20 + 0.5 × code` dB
//! - RSRQ: `-20 + 0.5 × code` dB

/// Weakest defined RSSI value (code 0 and any unknown code)
pub const RSSI_FLOOR_DBM: f64 = -113.0;

/// RSSI value for code 1
pub const RSSI_CODE_1_DBM: f64 = -111.0;

/// RSSI value for code 2, start of the affine range
pub const RSSI_AFFINE_BASE_DBM: f64 = -109.0;

/// dB per code step in the affine RSSI range
pub const RSSI_STEP_DB: f64 = 2.0;

/// Strongest defined RSSI value (code 31)
pub const RSSI_CEILING_DBM: f64 = -51.0;

pub const RSRP_OFFSET_DBM: f64 = -140.0;
pub const RSRP_SCALE: f64 = 1.0;

pub const SINR_OFFSET_DB: f64 = -20.0;
pub const SINR_SCALE: f64 = 0.5;

pub const RSRQ_OFFSET_DB: f64 = -20.0;
pub const RSRQ_SCALE: f64 = 0.5;

/// Convert a coded signal strength to dBm
///
/// Out-of-range codes map to the floor value rather than failing.
///
/// # Examples
///
/// ```
/// use lte_monitor::modem::convert::raw_signal_to_dbm;
///
/// assert_eq!(raw_signal_to_dbm(0), -113.0);
/// assert_eq!(raw_signal_to_dbm(2), -109.0);
/// assert_eq!(raw_signal_to_dbm(31), -51.0);
/// assert_eq!(raw_signal_to_dbm(99), -113.0);
/// ```
pub fn raw_signal_to_dbm(code: i32) -> f64 {
    match code {
        0 => RSSI_FLOOR_DBM,
        1 => RSSI_CODE_1_DBM,
        2..=30 => RSSI_AFFINE_BASE_DBM + RSSI_STEP_DB * f64::from(code - 2),
        31 => RSSI_CEILING_DBM,
        _ => RSSI_FLOOR_DBM,
    }
}

/// Convert raw RSRP, SINR and RSRQ codes to (dBm, dB, dB)
///
/// Total over the integer domain; codes are trusted to lie in the vendor range.
pub fn lte_primary_to_physical(rsrp_code: i32, sinr_code: i32, rsrq_code: i32) -> (f64, f64, f64) {
    let rsrp_dbm = RSRP_OFFSET_DBM + RSRP_SCALE * f64::from(rsrp_code);
    let sinr_db = SINR_OFFSET_DB + SINR_SCALE * f64::from(sinr_code);
    let rsrq_db = RSRQ_OFFSET_DB + RSRQ_SCALE * f64::from(rsrq_code);

    (rsrp_dbm, sinr_db, rsrq_db)
}
