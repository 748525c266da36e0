//! Phase 4: REVIEW
//!
//! Runs with the critical section released. A flagged file waits for
//! reviewer decisions up to the configured timeout.

use chrono::Utc;
use uuid::Uuid;

use tis_common::events::ServiceEvent;

use super::PipelineOrchestrator;
use crate::error::StageError;
use crate::models::{FlaggedDegree, TranscriptRecord};
use crate::review::apply_decisions;

impl PipelineOrchestrator {
    /// Returns whether the file went through human review
    pub(super) async fn phase_review(
        &self,
        run_id: Uuid,
        record: &mut TranscriptRecord,
        flagged: Vec<FlaggedDegree>,
    ) -> Result<bool, StageError> {
        let file_name = record.file_name.clone();

        if flagged.is_empty() {
            self.registry.skip(&file_name);
            return Ok(false);
        }

        let flagged_degrees = flagged.len();
        tracing::info!(
            run_id = %run_id,
            file_name = %file_name,
            flagged_degrees,
            "Phase 4: REVIEW - awaiting decisions"
        );

        let waiter = self
            .registry
            .open(&file_name, flagged)
            .map_err(|e| StageError::review(e.to_string()))?;

        self.event_bus.emit_lossy(ServiceEvent::ReviewRequested {
            run_id,
            file_name: file_name.clone(),
            flagged_degrees,
            timestamp: Utc::now(),
        });

        let decisions = match tokio::time::timeout(self.settings.review_timeout, waiter).await {
            Ok(Ok(decisions)) => decisions,
            Ok(Err(_)) => {
                return Err(StageError::review(format!(
                    "review session for {} closed before decisions arrived",
                    file_name
                )))
            }
            Err(_) => {
                return Err(StageError::review(format!(
                    "no decisions for {} within {} seconds",
                    file_name,
                    self.settings.review_timeout.as_secs()
                )))
            }
        };

        let applied = apply_decisions(record, &decisions);
        if applied.unmatched > 0 {
            record.warnings.push(format!(
                "{} reviewer decision(s) matched no course",
                applied.unmatched
            ));
        }

        tracing::info!(
            run_id = %run_id,
            file_name = %file_name,
            applied = applied.applied,
            unmatched = applied.unmatched,
            "Review resolved"
        );
        self.event_bus.emit_lossy(ServiceEvent::ReviewResolved {
            run_id,
            file_name,
            decisions: decisions.len(),
            timestamp: Utc::now(),
        });

        Ok(true)
    }
}
