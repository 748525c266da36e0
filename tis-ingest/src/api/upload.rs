//! Transcript upload handler
//!
//! POST /upload accepts one or more multipart `files` parts. The whole body
//! is read and staged before any file starts processing, so a rejected
//! request leaves nothing running. Every accepted file then runs through the
//! pipeline as its own task with its own result envelope.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::{ProcessingResult, ResultStatus};
use crate::AppState;

/// Extensions accepted for upload
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png", "csv"];

/// Multipart field carrying transcript files
const FILES_FIELD: &str = "files";

/// POST /upload response
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    /// `success` only when every file succeeded
    pub status: ResultStatus,
    pub processed_files: Vec<ProcessingResult>,
}

enum Slot {
    Done(ProcessingResult),
    Staged {
        file_name: String,
        stored: PathBuf,
    },
    Running {
        file_name: String,
        handle: JoinHandle<ProcessingResult>,
    },
}

/// Reject a file before processing; `None` means accepted
pub fn check_upload(file_name: &str, size: usize, max_size: usize, seen: &HashSet<String>) -> Option<String> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
        return Some(format!(
            "File type not allowed; expected one of: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ));
    }
    if size == 0 {
        return Some("File is empty".to_string());
    }
    if size > max_size {
        return Some(format!("File exceeds the {} byte limit", max_size));
    }
    if seen.contains(file_name) {
        return Some("A file with this name is already part of this upload".to_string());
    }
    None
}

/// Final path component of a client-supplied name
fn sanitize_file_name(raw: Option<&str>) -> Option<String> {
    raw.and_then(|name| Path::new(name).file_name())
        .and_then(|name| name.to_str())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// POST /upload
pub async fn upload_files(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    let upload_dir = state.config.upload_dir.clone();
    tokio::fs::create_dir_all(&upload_dir).await?;

    let mut slots: Vec<Slot> = Vec::new();
    if let Err(e) = stage_parts(
        &mut multipart,
        &upload_dir,
        state.config.max_files,
        state.config.max_file_size_bytes,
        &mut slots,
    )
    .await
    {
        discard_staged(&slots).await;
        return Err(e);
    }

    let slots: Vec<Slot> = slots
        .into_iter()
        .map(|slot| match slot {
            Slot::Staged { file_name, stored } => {
                let handle = spawn_processing(Arc::clone(&state.orchestrator), file_name.clone(), stored);
                Slot::Running { file_name, handle }
            }
            other => other,
        })
        .collect();

    if slots.is_empty() {
        return Err(ApiError::BadRequest(format!(
            "No files provided in the '{}' field",
            FILES_FIELD
        )));
    }

    let mut processed_files = Vec::with_capacity(slots.len());
    for slot in slots {
        let result = match slot {
            Slot::Done(result) => result,
            Slot::Staged { file_name, .. } => ProcessingResult::error(file_name, "File was not processed", None),
            Slot::Running { file_name, handle } => match handle.await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(file_name = %file_name, error = %e, "Processing task aborted");
                    ProcessingResult::error(file_name, "Processing task failed", Some(e.to_string()))
                }
            },
        };
        processed_files.push(result);
    }

    let status = if processed_files.iter().all(ProcessingResult::is_success) {
        ResultStatus::Success
    } else {
        ResultStatus::Error
    };

    Ok(Json(UploadResponse {
        status,
        processed_files,
    }))
}

/// Read every part, writing accepted files under `upload_dir`
///
/// Nothing is spawned here. On error the caller removes what was staged.
async fn stage_parts(
    multipart: &mut Multipart,
    upload_dir: &Path,
    max_files: usize,
    max_size: usize,
    slots: &mut Vec<Slot>,
) -> ApiResult<()> {
    let mut seen: HashSet<String> = HashSet::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some(FILES_FIELD) {
            continue;
        }
        if slots.len() >= max_files {
            return Err(ApiError::PayloadTooLarge(format!(
                "At most {} files may be uploaded at once",
                max_files
            )));
        }

        let Some(file_name) = sanitize_file_name(field.file_name()) else {
            slots.push(Slot::Done(ProcessingResult::error(
                "",
                "File part has no file name",
                None,
            )));
            continue;
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Could not read {}: {}", file_name, e)))?;

        if let Some(reason) = check_upload(&file_name, data.len(), max_size, &seen) {
            tracing::warn!(file_name = %file_name, reason = %reason, "Upload rejected");
            slots.push(Slot::Done(ProcessingResult::error(file_name, reason, None)));
            continue;
        }
        seen.insert(file_name.clone());

        let stored = upload_dir.join(format!("{}_{}", Uuid::new_v4(), file_name));
        tokio::fs::write(&stored, &data).await?;
        slots.push(Slot::Staged { file_name, stored });
    }

    Ok(())
}

/// Remove files staged by a request that is being rejected
async fn discard_staged(slots: &[Slot]) {
    for slot in slots {
        if let Slot::Staged { stored, .. } = slot {
            if let Err(e) = tokio::fs::remove_file(stored).await {
                tracing::warn!(path = %stored.display(), error = %e, "Failed to remove staged upload");
            }
        }
    }
}

fn spawn_processing(
    orchestrator: Arc<crate::pipeline::PipelineOrchestrator>,
    file_name: String,
    stored: PathBuf,
) -> JoinHandle<ProcessingResult> {
    tokio::spawn(async move {
        let result = orchestrator.process_file(&file_name, &stored).await;
        if let Err(e) = tokio::fs::remove_file(&stored).await {
            tracing::warn!(path = %stored.display(), error = %e, "Failed to remove uploaded file");
        }
        result
    })
}

/// Build upload routes
///
/// The body limit admits `max_files` files of `max_file_size` each; per-file
/// limits are checked in the handler.
pub fn upload_routes(max_files: usize, max_file_size: usize) -> Router<AppState> {
    let body_limit = max_files.saturating_mul(max_file_size).saturating_add(1024 * 1024);
    Router::new()
        .route("/upload", post(upload_files))
        .layer(DefaultBodyLimit::max(body_limit))
}
