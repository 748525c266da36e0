//! Application of reviewer decisions to a record

use tracing::{debug, warn};

use crate::models::{CourseDecision, PassStatus, TranscriptRecord};

/// Counts from one application pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppliedDecisions {
    pub applied: usize,
    pub unmatched: usize,
}

/// Apply decisions by exact `(degree, major, course_name)` match
///
/// Only fields present in a decision overwrite the record.
pub fn apply_decisions(record: &mut TranscriptRecord, decisions: &[CourseDecision]) -> AppliedDecisions {
    let mut outcome = AppliedDecisions::default();

    for decision in decisions {
        let mut matched = false;

        for degree in record
            .degrees
            .iter_mut()
            .filter(|d| d.degree.trim() == decision.degree.trim() && d.major.trim() == decision.major.trim())
        {
            let mut degree_touched = false;
            for course in degree
                .courses
                .iter_mut()
                .filter(|c| c.course_name.trim() == decision.course_name.trim())
            {
                if let Some(category) = decision
                    .should_be_category
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                {
                    course.should_be_category = category.to_string();
                }
                if let Some(credits) = decision.credits_earned {
                    course.credits_earned = Some(credits);
                }
                if let Some(passed) = decision.is_passed {
                    course.is_passed = PassStatus::from(passed);
                }
                degree_touched = true;
            }

            if degree_touched {
                if let Some(overall) = decision.overall_credits_earned {
                    degree.overall_credits_earned = Some(overall);
                }
                matched = true;
            }
        }

        if matched {
            outcome.applied += 1;
        } else {
            outcome.unmatched += 1;
            warn!(
                file_name = %record.file_name,
                degree = %decision.degree,
                major = %decision.major,
                course_name = %decision.course_name,
                "Review: decision matched no course"
            );
        }
    }

    debug!(file_name = %record.file_name, applied = outcome.applied, unmatched = outcome.unmatched, "Review: decisions applied");
    outcome
}
