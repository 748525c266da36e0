//! Phase 2: VALIDATING

use super::PipelineOrchestrator;
use crate::error::StageError;
use crate::models::TranscriptRecord;

impl PipelineOrchestrator {
    /// Correct fields and annotate rule findings; halts only on an empty record
    pub(super) async fn phase_validation(&self, record: TranscriptRecord) -> Result<TranscriptRecord, StageError> {
        let file_name = record.file_name.clone();
        tracing::info!(file_name = %file_name, "Phase 2: VALIDATING");

        let record = self
            .components
            .validator
            .validate(record)
            .await
            .map_err(|e| StageError::validation(e.to_string()))?;

        if !record.warnings.is_empty() {
            tracing::warn!(
                file_name = %file_name,
                findings = record.warnings.len(),
                "Validation findings recorded as warnings"
            );
        }

        Ok(record)
    }
}
