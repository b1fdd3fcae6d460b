//! Telemetry Server
//!
//! HTTP/WebSocket gateway in front of [`telemetry_core`]: REST endpoints for
//! ingesting and managing processed telemetry records, and a WebSocket
//! channel that pushes every accepted batch to connected subscribers.

pub mod api;
pub mod config;
