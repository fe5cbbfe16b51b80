//! # Signal Classification
//!
//! Maps calibrated LTE metrics to a quality tier and a health tier.
//!
//! ## Quality score
//!
//! | Metric | 3 pts | 2 pts | 1 pt |
//! |--------|-------|-------|------|
//! | RSRP (dBm) | ≥ -85 | ≥ -95 | ≥ -105 |
//! | SINR (dB) | ≥ 20 | ≥ 13 | ≥ 0 |
//! | RSRQ (dB) | | ≥ -7 | ≥ -10 |
//!
//! Total 7-8 is Excellent, 5-6 Good, 3-4 Fair, anything lower Poor.
//! A value exactly on a threshold scores the higher band.

use super::protocol::{HealthStatus, SignalQuality};

/// RSRP score ladder, best threshold first
const RSRP_LADDER: &[(f64, u8)] = &[(-85.0, 3), (-95.0, 2), (-105.0, 1)];

/// SINR score ladder, best threshold first
const SINR_LADDER: &[(f64, u8)] = &[(20.0, 3), (13.0, 2), (0.0, 1)];

/// RSRQ score ladder, best threshold first
const RSRQ_LADDER: &[(f64, u8)] = &[(-7.0, 2), (-10.0, 1)];

/// Health guards as (RSRP floor dBm, SINR floor dB, tier), most severe first
const HEALTH_GUARDS: &[(f64, f64, HealthStatus)] = &[
    (-120.0, -5.0, HealthStatus::Critical),
    (-110.0, 0.0, HealthStatus::Degraded),
    (-100.0, 10.0, HealthStatus::Stable),
];

fn ladder_score(value: f64, ladder: &[(f64, u8)]) -> u8 {
    ladder
        .iter()
        .find(|(threshold, _)| value >= *threshold)
        .map_or(0, |(_, points)| *points)
}

/// Combined quality score in `0..=8`
pub fn quality_score(rsrp_dbm: f64, sinr_db: f64, rsrq_db: f64) -> u8 {
    ladder_score(rsrp_dbm, RSRP_LADDER)
        + ladder_score(sinr_db, SINR_LADDER)
        + ladder_score(rsrq_db, RSRQ_LADDER)
}

/// Classify overall signal quality
///
/// # Examples
///
/// ```
/// use lte_monitor::modem::classify::quality_tier;
/// use lte_monitor::modem::protocol::SignalQuality;
///
/// assert_eq!(quality_tier(-80.0, 25.0, -5.0), SignalQuality::Excellent);
/// assert_eq!(quality_tier(-110.0, -3.0, -15.0), SignalQuality::Poor);
/// ```
pub fn quality_tier(rsrp_dbm: f64, sinr_db: f64, rsrq_db: f64) -> SignalQuality {
    match quality_score(rsrp_dbm, sinr_db, rsrq_db) {
        7..=u8::MAX => SignalQuality::Excellent,
        5..=6 => SignalQuality::Good,
        3..=4 => SignalQuality::Fair,
        _ => SignalQuality::Poor,
    }
}

/// Classify modem health
///
/// Guards are checked most severe first, so one bad metric cannot be
/// masked by a good one.
pub fn health_tier(rsrp_dbm: f64, sinr_db: f64) -> HealthStatus {
    HEALTH_GUARDS
        .iter()
        .find(|(rsrp_floor, sinr_floor, _)| rsrp_dbm < *rsrp_floor || sinr_db < *sinr_floor)
        .map_or(HealthStatus::Optimal, |(_, _, tier)| *tier)
}
