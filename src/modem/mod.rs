//! # Modem Report Module
//!
//! Parsing and calibration of LTE modem AT telemetry.
//!
//! This module handles:
//! - Recognizing `^RSSI`, `^HCSQ` and `^DSFLOWRPT` report lines
//! - Converting raw codes to dBm / dB
//! - Classifying signal quality and modem health

pub mod protocol;
pub mod convert;
pub mod classify;
pub mod parser;
