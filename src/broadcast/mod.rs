//! # Broadcast Module
//!
//! Best-effort fan-out of telemetry events to WebSocket subscribers.
//!
//! This module handles:
//! - The tagged event envelope sent to subscribers
//! - The subscriber transport abstraction
//! - In-order dispatch with per-subscriber eviction on failure

pub mod events;
pub mod sink;
pub mod broadcaster;

pub use broadcaster::{Broadcaster, SubscriberId};
pub use events::TelemetryEvent;
pub use sink::EventSink;
