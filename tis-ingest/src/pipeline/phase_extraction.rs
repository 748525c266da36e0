//! Phase 1: EXTRACTING
//!
//! CSV uploads are parsed directly. Scans go through OCR, then structured
//! extraction by the model.

use std::path::Path;

use super::PipelineOrchestrator;
use crate::error::StageError;
use crate::models::TranscriptRecord;
use crate::services::csv_reader::read_transcript_csv;
use crate::services::text_extractor::extension_of;

impl PipelineOrchestrator {
    pub(super) async fn phase_extraction(&self, file_name: &str, path: &Path) -> Result<TranscriptRecord, StageError> {
        tracing::info!(file_name = %file_name, "Phase 1: EXTRACTING");

        let record = if extension_of(path) == "csv" {
            let data = tokio::fs::read(path).await.map_err(|e| {
                StageError::extraction(format!("could not read {}", file_name)).with_source(&e)
            })?;
            read_transcript_csv(file_name, &data).map_err(|e| {
                StageError::extraction(format!("could not parse {}", file_name)).with_source(&e)
            })?
        } else {
            let text = self
                .components
                .text_extractor
                .extract_text(path)
                .await
                .map_err(|e| {
                    StageError::extraction(format!("could not read text from {}", file_name)).with_source(&e)
                })?;

            if text.trim().is_empty() {
                return Err(StageError::extraction(format!("no text found in {}", file_name)));
            }

            if let Err(e) = self.write_extracted_text(file_name, &text).await {
                tracing::warn!(file_name = %file_name, error = %e, "Could not write extracted text dump");
            }

            self.components
                .record_extractor
                .extract(file_name, &text)
                .await
                .map_err(|e| {
                    StageError::extraction(format!("could not structure the text of {}", file_name)).with_source(&e)
                })?
        };

        tracing::info!(
            file_name = %file_name,
            degrees = record.degrees.len(),
            courses = record.course_count(),
            "Extraction complete"
        );

        Ok(record)
    }
}
