//! Per-file work artifacts
//!
//! Every artifact is named `{stem}{suffix}` inside the work directory and is
//! removed when the file's run ends, whatever the outcome.

use std::path::PathBuf;

use super::PipelineOrchestrator;
use crate::models::{file_stem, TranscriptRecord};

/// Raw OCR text dump
pub const EXTRACTED_TEXT_SUFFIX: &str = "_extracted_text.txt";

/// JSON snapshot of the structured record
pub const SNAPSHOT_SUFFIX: &str = "_structured.json";

/// Names of all artifacts a run for `file_name` may leave behind
pub fn artifact_names(file_name: &str) -> Vec<String> {
    let stem = file_stem(file_name);
    [EXTRACTED_TEXT_SUFFIX, SNAPSHOT_SUFFIX]
        .iter()
        .map(|suffix| format!("{}{}", stem, suffix))
        .collect()
}

impl PipelineOrchestrator {
    fn artifact_path(&self, file_name: &str, suffix: &str) -> PathBuf {
        self.settings
            .work_dir
            .join(format!("{}{}", file_stem(file_name), suffix))
    }

    pub(super) async fn write_extracted_text(&self, file_name: &str, text: &str) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.settings.work_dir).await?;
        tokio::fs::write(self.artifact_path(file_name, EXTRACTED_TEXT_SUFFIX), text).await
    }

    pub(super) async fn write_snapshot(&self, record: &TranscriptRecord) -> std::io::Result<()> {
        let json = serde_json::to_vec_pretty(record)?;
        tokio::fs::create_dir_all(&self.settings.work_dir).await?;
        tokio::fs::write(self.artifact_path(&record.file_name, SNAPSHOT_SUFFIX), json).await
    }

    /// Delete every artifact for `file_name`; missing files are fine
    pub(super) async fn remove_artifacts(&self, file_name: &str) {
        for name in artifact_names(file_name) {
            let path = self.settings.work_dir.join(&name);
            match tokio::fs::remove_file(&path).await {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed work artifact"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove work artifact"),
            }
        }
    }
}
