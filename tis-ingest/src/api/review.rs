//! Review gate HTTP surface
//!
//! - GET /review/events/:file_name - per-file side channel (SSE)
//! - GET /review/flagged/:file_name - flagged degrees awaiting decisions
//! - POST /review/decisions - submit decisions and resume the file

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use tis_common::sse::{json_event, keep_alive, HEARTBEAT_INTERVAL};

use crate::error::{ApiError, ApiResult};
use crate::models::{DecisionSubmission, FlaggedDegree, NoticeStatus, ReviewNotice};
use crate::review::{ReviewError, ReviewRegistry};
use crate::AppState;

/// SSE event name for side-channel notices
const NOTICE_EVENT: &str = "review";

/// GET /review/flagged response
#[derive(Debug, Serialize, Deserialize)]
pub struct FlaggedResponse {
    pub status: String,
    pub file_name: String,
    pub flagged_degrees: Vec<FlaggedDegree>,
}

/// POST /review/decisions response
#[derive(Debug, Serialize, Deserialize)]
pub struct DecisionAck {
    pub status: String,
    pub file_name: String,
    pub decisions_received: usize,
}

impl From<ReviewError> for ApiError {
    fn from(err: ReviewError) -> Self {
        match err {
            ReviewError::NoSession(_) => ApiError::NotFound(err.to_string()),
            ReviewError::EmptyDecisions(_) => ApiError::BadRequest(err.to_string()),
            ReviewError::AlreadyResolved(_) | ReviewError::AlreadyOpen(_) | ReviewError::InProgress(_) => {
                ApiError::Conflict(err.to_string())
            }
        }
    }
}

/// Prunes the file's notice channel once the subscriber goes away
struct ChannelRelease {
    registry: Arc<ReviewRegistry>,
    file_name: String,
}

impl Drop for ChannelRelease {
    fn drop(&mut self) {
        self.registry.release(&self.file_name);
    }
}

/// GET /review/events/:file_name
///
/// Sends `connected`, replays the file's latest notice, then streams new
/// notices with a `ping` on idle. The stream ends after `intentional_closure`.
pub async fn review_event_stream(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(file_name = %file_name, "Review side channel connected");

    let registry = Arc::clone(&state.registry);
    let (mut rx, last) = registry.subscribe(&file_name);

    let stream = async_stream::stream! {
        let _release = ChannelRelease {
            registry,
            file_name: file_name.clone(),
        };

        if let Some(event) = json_event("connected", &json!({ "status": "connected", "file_name": file_name })) {
            yield Ok(event);
        }

        if let Some(notice) = last {
            if let Some(event) = json_event(NOTICE_EVENT, &notice) {
                yield Ok(event);
            }
            if notice.status.is_closing() {
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(HEARTBEAT_INTERVAL) => {
                    let ping = ReviewNotice::new(NoticeStatus::Ping, &file_name);
                    if let Some(event) = json_event(NOTICE_EVENT, &ping) {
                        yield Ok(event);
                    }
                }

                received = rx.recv() => {
                    match received {
                        Ok(notice) => {
                            debug!(file_name = %file_name, status = ?notice.status, "Review notice");
                            let closing = notice.status.is_closing();
                            if let Some(event) = json_event(NOTICE_EVENT, &notice) {
                                yield Ok(event);
                            }
                            if closing {
                                break;
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(file_name = %file_name, skipped, "Review side channel lagged");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }
            }
        }

        debug!(file_name = %file_name, "Review side channel closed");
    };

    Sse::new(stream).keep_alive(keep_alive())
}

/// GET /review/flagged/:file_name
pub async fn get_flagged(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Json<FlaggedResponse>> {
    let flagged_degrees = state
        .registry
        .flagged(&file_name)
        .ok_or_else(|| ApiError::NotFound(format!("No flagged courses pending for {}", file_name)))?;

    Ok(Json(FlaggedResponse {
        status: "ready".to_string(),
        file_name,
        flagged_degrees,
    }))
}

/// POST /review/decisions
pub async fn submit_decisions(
    State(state): State<AppState>,
    Json(submission): Json<DecisionSubmission>,
) -> ApiResult<Json<DecisionAck>> {
    let decisions_received = state
        .registry
        .submit(&submission.file_name, submission.decisions)?;

    Ok(Json(DecisionAck {
        status: "success".to_string(),
        file_name: submission.file_name,
        decisions_received,
    }))
}

/// Build review routes
pub fn review_routes() -> Router<AppState> {
    Router::new()
        .route("/review/events/:file_name", get(review_event_stream))
        .route("/review/flagged/:file_name", get(get_flagged))
        .route("/review/decisions", post(submit_decisions))
}
