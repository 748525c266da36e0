//! Transcript record model
//!
//! One `TranscriptRecord` per uploaded file. Degrees are created during
//! extraction and mutated in place during structuring; they are never
//! reordered.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Category label given to courses no classifier could place
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Root unit of work for one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub file_name: String,
    pub student: Student,
    pub degrees: Vec<DegreeRecord>,
    /// Non-blocking findings accumulated while processing
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl TranscriptRecord {
    pub fn new(file_name: impl Into<String>, student: Student) -> Self {
        Self {
            file_name: file_name.into(),
            student,
            degrees: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn course_count(&self) -> usize {
        self.degrees.iter().map(|d| d.courses.len()).sum()
    }

    /// File name without its extension; prefix of every work artifact
    pub fn file_stem(&self) -> &str {
        file_stem(&self.file_name)
    }
}

/// Strip the final extension from an upload name
pub fn file_stem(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
}

impl Student {
    /// "First [Middle ]Last"
    pub fn display_name(&self) -> String {
        display_name(&self.first_name, self.middle_name.as_deref(), &self.last_name)
    }
}

pub fn display_name(first: &str, middle: Option<&str>, last: &str) -> String {
    match middle.map(str::trim).filter(|m| !m.is_empty()) {
        Some(middle) => format!("{} {} {}", first.trim(), middle, last.trim()),
        None => format!("{} {}", first.trim(), last.trim()),
    }
}

/// Degree level derived from the degree title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DegreeLevel {
    Doctorate,
    Master,
    Bachelor,
    #[default]
    Unknown,
}

impl DegreeLevel {
    pub const ALL: [DegreeLevel; 4] = [
        DegreeLevel::Doctorate,
        DegreeLevel::Master,
        DegreeLevel::Bachelor,
        DegreeLevel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DegreeLevel::Doctorate => "Doctorate",
            DegreeLevel::Master => "Master",
            DegreeLevel::Bachelor => "Bachelor",
            DegreeLevel::Unknown => "Unknown",
        }
    }

    /// Parse a stored label; unrecognized text is `Unknown`
    pub fn from_label(label: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(label.trim()))
            .unwrap_or(DegreeLevel::Unknown)
    }
}

impl fmt::Display for DegreeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized `(institution, degree, major, minor, awarded_date)`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DegreeKey(pub [String; 5]);

impl DegreeKey {
    pub fn new(institution: &str, degree: &str, major: &str, minor: &str, awarded: &str) -> Self {
        let norm = |s: &str| s.trim().to_lowercase();
        DegreeKey([
            norm(institution),
            norm(degree),
            norm(major),
            norm(minor),
            norm(awarded),
        ])
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegreeRecord {
    pub institution_name: String,
    pub degree: String,
    pub major: String,
    #[serde(default)]
    pub minor: String,
    #[serde(default)]
    pub awarded_date: String,
    pub overall_credits_earned: Option<f64>,
    pub overall_gpa: Option<f64>,
    #[serde(default)]
    pub degree_level: DegreeLevel,
    #[serde(default)]
    pub courses: Vec<CourseRecord>,
}

impl DegreeRecord {
    pub fn natural_key(&self) -> DegreeKey {
        DegreeKey::new(
            &self.institution_name,
            &self.degree,
            &self.major,
            &self.minor,
            &self.awarded_date,
        )
    }

    /// Sum of raw course credits; missing credits count as zero
    pub fn credits_sum(&self) -> f64 {
        self.courses.iter().filter_map(|c| c.credits_earned).sum()
    }
}

/// Pass/fail status of a course
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    Passed,
    Failed,
    #[default]
    Undetermined,
}

impl PassStatus {
    pub fn is_passed(&self) -> bool {
        matches!(self, PassStatus::Passed)
    }

    /// Stored column value
    pub fn as_str(&self) -> &'static str {
        match self {
            PassStatus::Passed => "passed",
            PassStatus::Failed => "failed",
            PassStatus::Undetermined => "undetermined",
        }
    }
}

impl From<bool> for PassStatus {
    fn from(passed: bool) -> Self {
        if passed {
            PassStatus::Passed
        } else {
            PassStatus::Failed
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseRecord {
    pub course_name: String,
    pub credits_earned: Option<f64>,
    #[serde(default)]
    pub grade: String,
    #[serde(default = "uncategorized")]
    pub should_be_category: String,
    #[serde(default)]
    pub is_passed: PassStatus,
    #[serde(default)]
    pub adjusted_credits_earned: f64,
    #[serde(default)]
    row_hash: Option<String>,
}

fn uncategorized() -> String {
    UNCATEGORIZED.to_string()
}

impl CourseRecord {
    pub fn new(course_name: impl Into<String>, credits_earned: Option<f64>, grade: impl Into<String>) -> Self {
        Self {
            course_name: course_name.into(),
            credits_earned,
            grade: grade.into(),
            should_be_category: uncategorized(),
            is_passed: PassStatus::Undetermined,
            adjusted_credits_earned: 0.0,
            row_hash: None,
        }
    }

    pub fn is_uncategorized(&self) -> bool {
        let category = self.should_be_category.trim();
        category.is_empty() || category.eq_ignore_ascii_case(UNCATEGORIZED)
    }

    pub fn row_hash(&self) -> Option<&str> {
        self.row_hash.as_deref()
    }

    /// Set the content fingerprint; a hash already present is kept
    pub(crate) fn seal(&mut self, hash: String) -> &str {
        self.row_hash.get_or_insert(hash)
    }
}
