//! Shared test harness
//!
//! Builds an orchestrator over a temporary database with in-process fakes
//! for OCR, structured extraction and classification.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use tis_common::config::ServiceConfig;
use tis_common::events::EventBus;
use tis_ingest::models::{CourseRecord, DegreeRecord, Student, TranscriptRecord, UNCATEGORIZED};
use tis_ingest::pipeline::{PipelineComponents, PipelineOrchestrator, PipelineSettings};
use tis_ingest::review::ReviewRegistry;
use tis_ingest::services::categories::CourseCategories;
use tis_ingest::services::classifier::{
    Classification, ClassificationStrategy, ClassifierChain, SimilarityClassifier,
};
use tis_ingest::services::{ExtractionError, RecordExtractor, TextExtractor, Validator};

pub const CSV_HEADER: &str = "first_name,middle_name,last_name,institution_name,degree,major,minor,awarded_date,overall_credits_earned,overall_gpa,course_name,credits_earned,grade";

/// Three passing 3-credit courses whose names contain a category label
pub fn clean_csv(overall_credits: f64) -> String {
    let prefix = format!(
        "Jane,,Doe,State University,Bachelor of Science,Biology,,2020-05-15,{},3.5",
        overall_credits
    );
    format!(
        "{header}\n{p},General Biology,3,A\n{p},Organic Chemistry,3,B\n{p},Mathematics for Scientists,3,C\n",
        header = CSV_HEADER,
        p = prefix
    )
}

/// Courses no strategy can place
pub fn uncategorizable_csv() -> String {
    let prefix = "Jane,,Doe,State University,Bachelor of Arts,Studio Art,,2019-05-15,6,3.2";
    format!(
        "{header}\n{p},Underwater Basket Weaving,3,A\n{p},Kite Design,3,B\n",
        header = CSV_HEADER,
        p = prefix
    )
}

pub fn test_categories() -> CourseCategories {
    CourseCategories::from_labels(["Biology", "Chemistry", "Mathematics", "History"])
}

/// Returns the same text for every file
pub struct FixedText(pub String);

#[async_trait]
impl TextExtractor for FixedText {
    async fn extract_text(&self, _path: &Path) -> Result<String, ExtractionError> {
        Ok(self.0.clone())
    }
}

/// Returns a copy of one record, renamed to the file being processed
pub struct FixedRecord(pub TranscriptRecord);

#[async_trait]
impl RecordExtractor for FixedRecord {
    async fn extract(&self, file_name: &str, _text: &str) -> Result<TranscriptRecord, ExtractionError> {
        let mut record = self.0.clone();
        record.file_name = file_name.to_string();
        Ok(record)
    }
}

/// Reports success while labelling everything `Uncategorized`
pub struct SentinelStrategy;

#[async_trait]
impl ClassificationStrategy for SentinelStrategy {
    fn name(&self) -> &'static str {
        "sentinel"
    }

    async fn classify(&self, course_names: &[String], _categories: &CourseCategories) -> Classification {
        Classification {
            labels: vec![UNCATEGORIZED.to_string(); course_names.len()],
            success: true,
        }
    }
}

/// A scanned-transcript record equivalent to `clean_csv(9.0)`
pub fn scanned_record() -> TranscriptRecord {
    let mut record = TranscriptRecord::new(
        "scan.pdf",
        Student {
            first_name: "John".to_string(),
            middle_name: Some("Q".to_string()),
            last_name: "Public".to_string(),
        },
    );
    record.degrees.push(DegreeRecord {
        institution_name: "City College".to_string(),
        degree: "Master of Science".to_string(),
        major: "Chemistry".to_string(),
        awarded_date: "2018-12-20".to_string(),
        overall_credits_earned: Some(6.0),
        overall_gpa: Some(3.8),
        courses: vec![
            CourseRecord::new("Advanced Chemistry", Some(3.0), "A"),
            CourseRecord::new("History of Science", Some(3.0), "B+"),
        ],
        ..Default::default()
    });
    record
}

pub struct Harness {
    pub dir: TempDir,
    pub pool: SqlitePool,
    pub event_bus: EventBus,
    pub orchestrator: Arc<PipelineOrchestrator>,
    pub config: ServiceConfig,
}

pub struct HarnessOptions {
    pub strategies: Vec<Arc<dyn ClassificationStrategy>>,
    pub review_timeout: Duration,
    pub text: String,
    pub record: TranscriptRecord,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            strategies: vec![Arc::new(SentinelStrategy), Arc::new(SimilarityClassifier::default())],
            review_timeout: Duration::from_secs(30),
            text: "OFFICIAL TRANSCRIPT".to_string(),
            record: scanned_record(),
        }
    }
}

impl Harness {
    pub async fn new() -> Self {
        Self::with_options(HarnessOptions::default()).await
    }

    pub async fn with_options(options: HarnessOptions) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let config = ServiceConfig::defaults_in(dir.path());
        config.ensure_directories().expect("directories");

        let pool = tis_ingest::db::init_database_pool(&config.database_path)
            .await
            .expect("database");
        let event_bus = EventBus::new(100);

        let components = PipelineComponents {
            text_extractor: Arc::new(FixedText(options.text)),
            record_extractor: Arc::new(FixedRecord(options.record)),
            validator: Validator::new(None),
            classifier: ClassifierChain::new(options.strategies),
            categories: Arc::new(test_categories()),
        };
        let settings = PipelineSettings {
            work_dir: config.work_dir.clone(),
            credit_tolerance: config.credit_tolerance,
            review_timeout: options.review_timeout,
        };

        let orchestrator = Arc::new(PipelineOrchestrator::new(
            pool.clone(),
            event_bus.clone(),
            Arc::new(ReviewRegistry::new()),
            components,
            settings,
        ));

        Self {
            dir,
            pool,
            event_bus,
            orchestrator,
            config,
        }
    }

    /// Write an upload into the upload directory
    pub fn write_upload(&self, stored_name: &str, contents: &str) -> PathBuf {
        let path = self.config.upload_dir.join(stored_name);
        std::fs::write(&path, contents).expect("write upload");
        path
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("count")
    }

    /// File names currently in the work directory
    pub fn work_files(&self) -> Vec<String> {
        std::fs::read_dir(&self.config.work_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }
}
