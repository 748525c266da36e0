//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE helpers for the service's event streams.

use axum::response::sse::{Event, KeepAlive};
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Heartbeat interval for every SSE stream
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// Keep-alive comment sent while a stream is idle
pub fn keep_alive() -> KeepAlive {
    KeepAlive::new().interval(HEARTBEAT_INTERVAL).text("heartbeat")
}

/// Serialize `payload` as the data of a named SSE event
///
/// Returns `None` (and logs) if serialization fails so the stream can skip it.
pub fn json_event<T: Serialize>(event_name: &str, payload: &T) -> Option<Event> {
    match serde_json::to_string(payload) {
        Ok(data) => Some(Event::default().event(event_name).data(data)),
        Err(e) => {
            warn!("SSE: Failed to serialize event {}: {}", event_name, e);
            None
        }
    }
}
