//! Review round-trip models
//!
//! Flagged entries are projections of `CourseRecord`s sent to a reviewer;
//! decisions are the reviewer's field-level corrections coming back.

use serde::{Deserialize, Serialize};

use super::transcript::PassStatus;

/// Review session state for one file
///
/// NONE → PENDING_REVIEW → RESOLVED → CLOSED, or NONE → CLOSED when nothing
/// needs review. A closed session is removed from the registry, so CLOSED
/// reads back as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewState {
    None,
    PendingReview,
    Resolved,
}

/// Credit totals that disagree, or a missing degree total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreditMismatch {
    pub overall_credits_earned: Option<f64>,
    pub credits_sum: f64,
}

/// One degree with at least one ambiguous course
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedDegree {
    pub institution_name: String,
    pub degree: String,
    pub major: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credit_mismatch: Option<CreditMismatch>,
    pub courses: Vec<FlaggedCourseEntry>,
}

/// Only the fields in question are present
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlaggedCourseEntry {
    pub course_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub should_be_category: Option<String>,
    /// `Some(None)` serializes as `null`: the credits are in question but unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_earned: Option<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grade: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_passed: Option<PassStatus>,
}

impl FlaggedCourseEntry {
    pub fn is_empty(&self) -> bool {
        self.should_be_category.is_none()
            && self.credits_earned.is_none()
            && self.grade.is_none()
            && self.is_passed.is_none()
    }
}

/// Reviewer correction for one course
///
/// Keyed by `(degree, major, course_name)` within the submission's file.
/// Absent or null fields leave the record untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CourseDecision {
    pub degree: String,
    pub major: String,
    pub course_name: String,
    #[serde(default)]
    pub should_be_category: Option<String>,
    #[serde(default)]
    pub credits_earned: Option<f64>,
    #[serde(default)]
    pub is_passed: Option<bool>,
    /// Applies to the course's degree
    #[serde(default)]
    pub overall_credits_earned: Option<f64>,
}

/// Body of a decision submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionSubmission {
    pub file_name: String,
    #[serde(default)]
    pub decisions: Vec<CourseDecision>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeStatus {
    Ready,
    NoFlaggedCourses,
    IntentionalClosure,
    Ping,
}

impl NoticeStatus {
    /// Whether the side channel closes after this notice
    pub fn is_closing(&self) -> bool {
        matches!(self, NoticeStatus::IntentionalClosure)
    }
}

/// Event published on a file's review side channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewNotice {
    pub status: NoticeStatus,
    pub file_name: String,
}

impl ReviewNotice {
    pub fn new(status: NoticeStatus, file_name: impl Into<String>) -> Self {
        Self {
            status,
            file_name: file_name.into(),
        }
    }
}
