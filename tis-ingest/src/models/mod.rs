//! Data models for tis-ingest
//!
//! - transcript: the per-file record flowing through the pipeline
//! - review: flagged entries, decisions and side-channel notices
//! - envelope: the uniform per-file result
//! - search: search criteria and grouped summaries

pub mod envelope;
pub mod review;
pub mod search;
pub mod transcript;

pub use envelope::{PersistSummary, ProcessingData, ProcessingResult, ResultStatus};
pub use review::{
    CourseDecision, CreditMismatch, DecisionSubmission, FlaggedCourseEntry, FlaggedDegree,
    NoticeStatus, ReviewNotice, ReviewState,
};
pub use search::{CategorySummary, CourseMatch, SearchCriteria, SearchResponse};
pub use transcript::{
    display_name, file_stem, CourseRecord, DegreeKey, DegreeLevel, DegreeRecord, PassStatus,
    Student, TranscriptRecord, UNCATEGORIZED,
};
