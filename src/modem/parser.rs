//! # AT Report Parser
//!
//! Recognizes the three unsolicited report shapes emitted by the modem:
//!
//! - `^RSSI:<int>`
//! - `^HCSQ:"<mode>",<rsrp>,<sinr>,<rsrq>,<reserved>`
//! - `^DSFLOWRPT:<id>,<ul>,<dl>,<total_ul>,<total_dl>,<reserved>,<reserved>`
//!
//! Matching is structural: the prefix must start the (trimmed) line and the
//! field count and field syntax must match exactly. Anything else is terminal
//! chatter and yields `None`.

use chrono::{DateTime, Utc};

use super::protocol::*;

/// Longest hex string that fits a `u64`
const MAX_HEX_DIGITS: usize = 16;

/// Stateless parser for modem report lines
///
/// # Usage
///
/// ```
/// use lte_monitor::modem::parser::LineParser;
/// use lte_monitor::modem::protocol::ModemReport;
///
/// let parser = LineParser::new();
///
/// match parser.parse("^RSSI:31") {
///     Some(ModemReport::Rssi(rssi)) => assert_eq!(rssi.dbm(), -51.0),
///     other => panic!("unexpected {:?}", other),
/// }
///
/// assert!(parser.parse("OK").is_none());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser;

impl LineParser {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Parse one line, stamping usage records with the current time
    pub fn parse(&self, line: &str) -> Option<ModemReport> {
        self.parse_at(line, Utc::now())
    }

    /// Parse one line, stamping usage records with `now`
    pub fn parse_at(&self, line: &str, now: DateTime<Utc>) -> Option<ModemReport> {
        let line = line.trim();

        if let Some(rest) = line.strip_prefix(RSSI_PREFIX) {
            return parse_rssi(rest).map(ModemReport::Rssi);
        }

        if let Some(rest) = line.strip_prefix(HCSQ_PREFIX) {
            return parse_hcsq(rest).map(ModemReport::Radio);
        }

        if let Some(rest) = line.strip_prefix(DSFLOWRPT_PREFIX) {
            return parse_dsflowrpt(rest, now).map(ModemReport::Usage);
        }

        None
    }
}

fn parse_rssi(rest: &str) -> Option<RssiReading> {
    parse_signed(rest.trim()).map(RssiReading::from_code)
}

fn parse_hcsq(rest: &str) -> Option<RadioReading> {
    let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
    if fields.len() != 1 + HCSQ_CODE_FIELDS {
        return None;
    }

    let mode = parse_quoted(fields[0])?;
    let rsrp = parse_unsigned(fields[1])?;
    let sinr = parse_unsigned(fields[2])?;
    let rsrq = parse_unsigned(fields[3])?;
    // Placeholder, must be well formed but carries nothing we use
    parse_unsigned(fields[4])?;

    Some(RadioReading::calibrate(mode, rsrp, sinr, rsrq))
}

fn parse_dsflowrpt(rest: &str, now: DateTime<Utc>) -> Option<DataUsageRecord> {
    let fields: Vec<&str> = rest.split(',').map(str::trim).collect();
    if fields.len() != 1 + DSFLOWRPT_COUNTER_FIELDS {
        return None;
    }

    let report_id = fields[0];
    parse_hex(report_id)?;

    let mut counters = [0u64; DSFLOWRPT_COUNTER_FIELDS];
    for (slot, field) in counters.iter_mut().zip(&fields[1..]) {
        *slot = parse_hex(field)?;
    }

    Some(DataUsageRecord {
        timestamp: now,
        report_id: report_id.to_string(),
        uplink_bytes: counters[0],
        downlink_bytes: counters[1],
        total_uplink: counters[2],
        total_downlink: counters[3],
    })
}

/// `"<mode>"` with a non-empty body free of quotes
fn parse_quoted(field: &str) -> Option<&str> {
    let inner = field.strip_prefix('"')?.strip_suffix('"')?;
    if inner.is_empty() || inner.contains('"') {
        return None;
    }
    Some(inner)
}

fn parse_unsigned(field: &str) -> Option<i32> {
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Decimal integer, saturating at the `i32` bounds
fn parse_signed(field: &str) -> Option<i32> {
    let (negative, digits) = match field.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, field),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Only overflow can fail past the digit check
    Some(field.parse().unwrap_or(if negative { i32::MIN } else { i32::MAX }))
}

fn parse_hex(field: &str) -> Option<u64> {
    if field.is_empty()
        || field.len() > MAX_HEX_DIGITS
        || !field.bytes().all(|b| b.is_ascii_hexdigit())
    {
        return None;
    }
    u64::from_str_radix(field, 16).ok()
}
