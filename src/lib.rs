//! # LTE Monitor Library
//!
//! Parse LTE modem AT telemetry and republish it to live subscribers.
//!
//! Raw `^RSSI`, `^HCSQ` and `^DSFLOWRPT` lines arrive from stdin or a ttyd
//! WebSocket bridge, are calibrated and classified, land in a bounded
//! in-memory store and are pushed to WebSocket subscribers and a polling
//! HTTP API.

pub mod config;
pub mod error;
pub mod modem;
pub mod store;
pub mod broadcast;
pub mod ingest;
pub mod server;
pub mod shutdown;
