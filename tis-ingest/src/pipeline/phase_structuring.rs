//! Phase 3: STRUCTURING
//!
//! Derives degree levels, pass status and adjusted credits, then assigns a
//! category to every course through the classifier chain.

use super::PipelineOrchestrator;
use crate::error::StageError;
use crate::models::TranscriptRecord;
use crate::rules;

impl PipelineOrchestrator {
    pub(super) async fn phase_structuring(&self, mut record: TranscriptRecord) -> Result<TranscriptRecord, StageError> {
        tracing::info!(file_name = %record.file_name, "Phase 3: STRUCTURING");

        rules::assess(&mut record);

        let categories = &self.components.categories;
        let mut degree_warnings = Vec::new();

        for degree in &mut record.degrees {
            let course_names: Vec<String> = degree.courses.iter().map(|c| c.course_name.clone()).collect();
            let outcome = self.components.classifier.classify(&course_names, categories).await;

            if outcome.exhausted() {
                tracing::warn!(
                    file_name = %record.file_name,
                    degree = %degree.degree,
                    major = %degree.major,
                    "No classifier could categorize this degree's courses"
                );
                degree_warnings.push(format!(
                    "Courses of degree '{}' ({}) at {} could not be categorized",
                    degree.degree, degree.major, degree.institution_name
                ));
            } else {
                tracing::debug!(
                    file_name = %record.file_name,
                    degree = %degree.degree,
                    strategy = outcome.strategy.unwrap_or_default(),
                    "Courses categorized"
                );
            }

            for (course, label) in degree.courses.iter_mut().zip(outcome.labels) {
                course.should_be_category = label;
            }
        }
        record.warnings.extend(degree_warnings);

        self.write_snapshot(&record).await.map_err(|e| {
            StageError::structuring(format!("could not write snapshot for {}", record.file_name)).with_source(&e)
        })?;

        Ok(record)
    }
}
