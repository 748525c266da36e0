//! Per-file ingestion pipeline
//!
//! # State Progression
//! UPLOADED → EXTRACTED → VALIDATED → STRUCTURED → (REVIEWED) → PERSISTED → DONE,
//! with ERROR reachable from any stage.
//!
//! # Locking
//! A single critical section serializes pipeline work across files, held in
//! two phases: extract/validate/structure, then finalize/persist. The review
//! wait sits between them with the lock released, so a file awaiting a human
//! never blocks other files.
//!
//! Each stage lives in its own `phase_*` module as an `impl` block on
//! [`PipelineOrchestrator`].

use chrono::Utc;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use tis_common::config::ServiceConfig;
use tis_common::events::{EventBus, ProcessingStage, ServiceEvent};

use crate::error::StageError;
use crate::models::{ProcessingData, ProcessingResult};
use crate::review::{detect_flags, ReviewRegistry};
use crate::rules;
use crate::services::categories::CourseCategories;
use crate::services::classifier::ClassifierChain;
use crate::services::{RecordExtractor, TextExtractor, Validator};

mod artifacts;
mod phase_extraction;
mod phase_persistence;
mod phase_review;
mod phase_structuring;
mod phase_validation;

pub use artifacts::{artifact_names, EXTRACTED_TEXT_SUFFIX, SNAPSHOT_SUFFIX};

/// Settings the pipeline reads from service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Directory for per-file intermediate artifacts
    pub work_dir: PathBuf,
    pub credit_tolerance: f64,
    /// How long a file may wait for reviewer decisions
    pub review_timeout: Duration,
}

impl PipelineSettings {
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self {
            work_dir: config.work_dir.clone(),
            credit_tolerance: config.credit_tolerance,
            review_timeout: Duration::from_secs(config.review_timeout_secs),
        }
    }
}

/// External capabilities and rule inputs used by the stages
pub struct PipelineComponents {
    pub text_extractor: Arc<dyn TextExtractor>,
    pub record_extractor: Arc<dyn RecordExtractor>,
    pub validator: Validator,
    pub classifier: ClassifierChain,
    pub categories: Arc<CourseCategories>,
}

/// Pipeline orchestrator service
pub struct PipelineOrchestrator {
    db: SqlitePool,
    event_bus: EventBus,
    registry: Arc<ReviewRegistry>,
    components: PipelineComponents,
    settings: PipelineSettings,
    critical_section: Mutex<()>,
    last_error: Arc<RwLock<Option<String>>>,
}

impl PipelineOrchestrator {
    /// Create new pipeline orchestrator
    ///
    /// # Arguments
    /// * `db` - Database connection pool
    /// * `event_bus` - Event bus for progress updates
    /// * `registry` - Review sessions shared with the HTTP handlers
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        registry: Arc<ReviewRegistry>,
        components: PipelineComponents,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry,
            components,
            settings,
            critical_section: Mutex::new(()),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    pub fn registry(&self) -> &Arc<ReviewRegistry> {
        &self.registry
    }

    pub fn categories(&self) -> &Arc<CourseCategories> {
        &self.components.categories
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Most recent stage failure, shared with the health endpoint
    pub fn last_error(&self) -> Arc<RwLock<Option<String>>> {
        Arc::clone(&self.last_error)
    }

    /// Run one uploaded file through every stage
    ///
    /// Never fails: stage errors become an error envelope. Review state and
    /// work artifacts for `file_name` are gone when this returns.
    pub async fn process_file(&self, file_name: &str, path: &Path) -> ProcessingResult {
        let run_id = Uuid::new_v4();
        // A second run under a live name must not touch the first run's review state
        let _review_guard = match self.registry.claim(file_name) {
            Ok(guard) => guard,
            Err(e) => {
                let err = StageError::review(format!("could not start {}", file_name)).with_source(&e);
                tracing::warn!(run_id = %run_id, file_name = %file_name, error = %err, "Pipeline: file rejected");
                return ProcessingResult::from_stage_error(file_name, &err);
            }
        };

        tracing::info!(run_id = %run_id, file_name = %file_name, "Pipeline: file accepted");
        self.event_bus.emit_lossy(ServiceEvent::FileAccepted {
            run_id,
            file_name: file_name.to_string(),
            timestamp: Utc::now(),
        });

        let outcome = self.run_stages(run_id, file_name, path).await;
        self.remove_artifacts(file_name).await;

        match outcome {
            Ok(data) => {
                self.emit_stage(run_id, file_name, ProcessingStage::Done);
                self.event_bus.emit_lossy(ServiceEvent::FileCompleted {
                    run_id,
                    file_name: file_name.to_string(),
                    inserted: data.inserted_count,
                    duplicates: data.duplicate_row_identifiers.len(),
                    timestamp: Utc::now(),
                });
                tracing::info!(
                    run_id = %run_id,
                    file_name = %file_name,
                    inserted = data.inserted_count,
                    duplicates = data.duplicate_row_identifiers.len(),
                    reviewed = data.reviewed,
                    "Pipeline: file complete"
                );
                ProcessingResult::success(file_name, data)
            }
            Err(err) => {
                tracing::error!(
                    run_id = %run_id,
                    file_name = %file_name,
                    stage = ?err.stage(),
                    error = %err,
                    details = err.details().unwrap_or(""),
                    "Pipeline: file failed"
                );
                *self.last_error.write().await = Some(format!("{}: {}", file_name, err));
                self.event_bus.emit_lossy(ServiceEvent::FileFailed {
                    run_id,
                    file_name: file_name.to_string(),
                    stage: err.stage(),
                    message: err.to_string(),
                    timestamp: Utc::now(),
                });
                ProcessingResult::from_stage_error(file_name, &err)
            }
        }
    }

    async fn run_stages(&self, run_id: Uuid, file_name: &str, path: &Path) -> Result<ProcessingData, StageError> {
        // Phase 1: extract, validate, structure
        let (mut record, flagged) = {
            let _critical = self.critical_section.lock().await;

            let record = self.phase_extraction(file_name, path).await?;
            self.emit_stage(run_id, file_name, ProcessingStage::Extracted);

            let record = self.phase_validation(record).await?;
            self.emit_stage(run_id, file_name, ProcessingStage::Validated);

            let record = self.phase_structuring(record).await?;
            self.emit_stage(run_id, file_name, ProcessingStage::Structured);

            let flagged = detect_flags(&record, self.settings.credit_tolerance);
            (record, flagged)
        };

        // Review wait runs outside the critical section
        let reviewed = self.phase_review(run_id, &mut record, flagged).await?;
        if reviewed {
            self.emit_stage(run_id, file_name, ProcessingStage::Reviewed);
        }

        // Phase 2: finalize and persist
        let summary = {
            let _critical = self.critical_section.lock().await;
            rules::finalize(&mut record);
            self.phase_persistence(&record).await?
        };
        self.emit_stage(run_id, file_name, ProcessingStage::Persisted);

        Ok(ProcessingData {
            inserted_count: summary.inserted_count,
            duplicate_row_identifiers: summary.duplicate_row_identifiers,
            reviewed,
            warnings: record.warnings,
        })
    }

    fn emit_stage(&self, run_id: Uuid, file_name: &str, stage: ProcessingStage) {
        tracing::debug!(run_id = %run_id, file_name = %file_name, stage = ?stage, "Pipeline: stage complete");
        self.event_bus.emit_lossy(ServiceEvent::StageCompleted {
            run_id,
            file_name: file_name.to_string(),
            stage,
            timestamp: Utc::now(),
        });
    }
}
