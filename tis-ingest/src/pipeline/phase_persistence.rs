//! Phase 5: PERSISTING

use super::PipelineOrchestrator;
use crate::db;
use crate::error::StageError;
use crate::models::{PersistSummary, TranscriptRecord};

impl PipelineOrchestrator {
    pub(super) async fn phase_persistence(&self, record: &TranscriptRecord) -> Result<PersistSummary, StageError> {
        tracing::info!(
            file_name = %record.file_name,
            courses = record.course_count(),
            "Phase 5: PERSISTING"
        );

        db::persist_transcript(&self.db, record).await.map_err(|e| {
            StageError::storage(format!("could not store {}; no rows were kept", record.file_name)).with_source(&e)
        })
    }
}
