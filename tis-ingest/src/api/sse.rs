//! Server-Sent Events for pipeline progress

use crate::AppState;
use axum::{
    extract::State,
    response::sse::{Event, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use tis_common::sse::{json_event, keep_alive, HEARTBEAT_INTERVAL};

/// GET /events - every pipeline event for every file
///
/// Streams events:
/// - FileAccepted
/// - StageCompleted
/// - ReviewRequested / ReviewResolved
/// - FileCompleted / FileFailed
pub async fn event_stream(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("New SSE client connected to pipeline events");

    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    debug!("SSE: Sending heartbeat");
                    yield Ok(Event::default().comment("heartbeat"));
                }

                received = rx.recv() => {
                    match received {
                        Ok(event) => {
                            if let Some(sse_event) = json_event(event.event_type(), &event) {
                                yield Ok(sse_event);
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "SSE: Pipeline event subscriber lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }
    };

    Sse::new(stream).keep_alive(keep_alive())
}
