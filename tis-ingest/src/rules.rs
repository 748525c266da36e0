//! Degree and grade rules
//!
//! Pure functions with no I/O: degree-level categorization, pass/fail
//! determination, adjusted credits, credit reconciliation and the course
//! content fingerprint used for deduplication.

use sha2::{Digest, Sha256};

use crate::models::{DegreeLevel, DegreeRecord, PassStatus, Student, TranscriptRecord};

/// Checked in order; first match wins
const DOCTORATE_KEYWORDS: &[&str] = &[
    "phd", "doctor", "md", "dnp", "dr", "dphil", "edd", "dsc", "psyd", "pharmd", "dba",
];
const MASTER_KEYWORDS: &[&str] = &[
    "master", "ms", "ma", "mba", "m.ed", "mph", "msc", "msn", "msw", "mphil", "mfa", "mpa",
    "mpp", "meng", "mres", "mat", "llm",
];
const BACHELOR_KEYWORDS: &[&str] = &[
    "bachelor", "bs", "ba", "b.ed", "bba", "bsc", "bsn", "bsw", "bfa", "beng", "bcom", "bsba",
    "llb",
];

/// Keywords at least this long match anywhere in the title; shorter ones
/// must match a whole token so "ma" does not fire on "Mathematics"
const SUBSTRING_KEYWORD_LEN: usize = 5;

/// Letter grades from highest to lowest
const GRADE_SCALE: [&str; 13] = [
    "A+", "A", "A-", "B+", "B", "B-", "C+", "C", "C-", "D+", "D", "D-", "F",
];

/// Minimum passing grade for a degree level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassingThreshold {
    pub letter: &'static str,
    pub numeric: f64,
}

/// Categorize a degree title into a level
pub fn categorize_degree(degree_text: &str) -> DegreeLevel {
    let lower = degree_text.to_lowercase();
    let tokens: Vec<String> = lower
        .split(|c: char| !(c.is_alphanumeric() || c == '.'))
        .map(|t| t.replace('.', ""))
        .filter(|t| !t.is_empty())
        .collect();

    let matches = |keywords: &[&str]| {
        keywords.iter().any(|kw| {
            if kw.len() >= SUBSTRING_KEYWORD_LEN {
                lower.contains(kw)
            } else {
                let kw = kw.replace('.', "");
                tokens.iter().any(|t| *t == kw)
            }
        })
    };

    if matches(DOCTORATE_KEYWORDS) {
        DegreeLevel::Doctorate
    } else if matches(MASTER_KEYWORDS) {
        DegreeLevel::Master
    } else if matches(BACHELOR_KEYWORDS) {
        DegreeLevel::Bachelor
    } else {
        DegreeLevel::Unknown
    }
}

/// Passing threshold for a level; `Unknown` uses the Bachelor threshold
pub fn passing_threshold(level: DegreeLevel) -> PassingThreshold {
    match level {
        DegreeLevel::Doctorate | DegreeLevel::Master => PassingThreshold {
            letter: "C",
            numeric: 70.0,
        },
        DegreeLevel::Bachelor | DegreeLevel::Unknown => PassingThreshold {
            letter: "D",
            numeric: 60.0,
        },
    }
}

/// Rank on the 13-point scale (A+ = 13 … F = 1)
pub fn grade_rank(letter: &str) -> Option<usize> {
    let letter = letter.trim().to_uppercase();
    GRADE_SCALE
        .iter()
        .position(|g| *g == letter)
        .map(|idx| GRADE_SCALE.len() - idx)
}

/// Decide whether a grade passes at the given level
pub fn is_passed(grade: &str, level: DegreeLevel) -> PassStatus {
    let grade = grade.trim();
    if grade.is_empty() {
        return PassStatus::Undetermined;
    }

    let threshold = passing_threshold(level);

    if let Ok(score) = grade.parse::<f64>() {
        if score.is_finite() {
            return PassStatus::from(score >= threshold.numeric);
        }
        return PassStatus::Undetermined;
    }

    match (grade_rank(grade), grade_rank(threshold.letter)) {
        (Some(rank), Some(minimum)) => PassStatus::from(rank >= minimum),
        _ => PassStatus::Undetermined,
    }
}

/// Credits that count toward the degree: all of them if passed, else none
pub fn adjusted_credits(credits_earned: Option<f64>, status: PassStatus) -> f64 {
    match status {
        PassStatus::Passed => credits_earned.unwrap_or(0.0),
        PassStatus::Failed | PassStatus::Undetermined => 0.0,
    }
}

/// Whether summed course credits agree with the degree total
///
/// A missing degree total never matches.
pub fn credits_match(degree: &DegreeRecord, tolerance: f64) -> bool {
    match degree.overall_credits_earned {
        Some(overall) => (degree.credits_sum() - overall).abs() <= tolerance,
        None => false,
    }
}

/// Fields that identify one course row across uploads
///
/// The upload's file name is deliberately absent so a re-submitted file
/// hashes to the same rows.
#[derive(Debug, Clone, Copy)]
pub struct RowHashInput<'a> {
    pub first_name: &'a str,
    pub last_name: &'a str,
    pub institution_name: &'a str,
    pub degree: &'a str,
    pub major: &'a str,
    pub minor: &'a str,
    pub awarded_date: &'a str,
    pub course_name: &'a str,
    pub credits_earned: Option<f64>,
    pub grade: &'a str,
}

impl<'a> RowHashInput<'a> {
    pub fn new(
        student: &'a Student,
        degree: &'a DegreeRecord,
        course_name: &'a str,
        credits_earned: Option<f64>,
        grade: &'a str,
    ) -> Self {
        Self {
            first_name: &student.first_name,
            last_name: &student.last_name,
            institution_name: &degree.institution_name,
            degree: &degree.degree,
            major: &degree.major,
            minor: &degree.minor,
            awarded_date: &degree.awarded_date,
            course_name,
            credits_earned,
            grade,
        }
    }
}

/// SHA-256 over the trimmed, `|`-joined fields, hex encoded
pub fn row_hash(input: &RowHashInput<'_>) -> String {
    let credits = input
        .credits_earned
        .map(|c| c.to_string())
        .unwrap_or_default();

    let joined = [
        input.first_name.trim(),
        input.last_name.trim(),
        input.institution_name.trim(),
        input.degree.trim(),
        input.major.trim(),
        input.minor.trim(),
        input.awarded_date.trim(),
        input.course_name.trim(),
        credits.as_str(),
        input.grade.trim(),
    ]
    .join("|");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Derive degree levels, pass status and adjusted credits from raw fields
pub fn assess(record: &mut TranscriptRecord) {
    for degree in &mut record.degrees {
        degree.degree_level = categorize_degree(&degree.degree);
        for course in &mut degree.courses {
            course.is_passed = is_passed(&course.grade, degree.degree_level);
            course.adjusted_credits_earned = adjusted_credits(course.credits_earned, course.is_passed);
        }
    }
}

/// Recompute adjusted credits from the current pass status and seal row hashes
///
/// Runs after reviewer decisions are applied; pass status set by a reviewer
/// is not re-derived from the grade.
pub fn finalize(record: &mut TranscriptRecord) {
    let student = &record.student;
    for degree in &mut record.degrees {
        let hashes: Vec<String> = degree
            .courses
            .iter()
            .map(|c| {
                row_hash(&RowHashInput::new(
                    student,
                    degree,
                    &c.course_name,
                    c.credits_earned,
                    &c.grade,
                ))
            })
            .collect();

        for (course, hash) in degree.courses.iter_mut().zip(hashes) {
            course.adjusted_credits_earned = adjusted_credits(course.credits_earned, course.is_passed);
            course.seal(hash);
        }
    }
}
