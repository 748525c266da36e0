//! Detection of courses that need a reviewer

use crate::models::{CreditMismatch, FlaggedCourseEntry, FlaggedDegree, PassStatus, TranscriptRecord};
use crate::rules::credits_match;

/// Build flagged entries for every ambiguous course
///
/// A course is flagged when its category is the sentinel, when its degree's
/// credits do not add up (or the degree total is missing), or when its pass
/// status is undetermined. Only the fields in question are included; degrees
/// without a flagged course are omitted.
pub fn detect_flags(record: &TranscriptRecord, tolerance: f64) -> Vec<FlaggedDegree> {
    let mut flagged = Vec::new();

    for degree in &record.degrees {
        let credit_mismatch = (!credits_match(degree, tolerance)).then(|| CreditMismatch {
            overall_credits_earned: degree.overall_credits_earned,
            credits_sum: degree.credits_sum(),
        });

        let courses: Vec<FlaggedCourseEntry> = degree
            .courses
            .iter()
            .map(|course| {
                let undetermined = course.is_passed == PassStatus::Undetermined;
                FlaggedCourseEntry {
                    course_name: course.course_name.clone(),
                    should_be_category: course
                        .is_uncategorized()
                        .then(|| course.should_be_category.clone()),
                    credits_earned: credit_mismatch.as_ref().map(|_| course.credits_earned),
                    grade: undetermined.then(|| course.grade.clone()),
                    is_passed: undetermined.then_some(PassStatus::Undetermined),
                }
            })
            .filter(|entry| !entry.is_empty())
            .collect();

        if !courses.is_empty() {
            flagged.push(FlaggedDegree {
                institution_name: degree.institution_name.clone(),
                degree: degree.degree.clone(),
                major: degree.major.clone(),
                credit_mismatch,
                courses,
            });
        }
    }

    flagged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CourseRecord, DegreeRecord, Student};

    fn course(name: &str, credits: f64, category: &str, status: PassStatus) -> CourseRecord {
        let mut course = CourseRecord::new(name, Some(credits), "A");
        course.should_be_category = category.to_string();
        course.is_passed = status;
        course
    }

    fn record(overall: Option<f64>, courses: Vec<CourseRecord>) -> TranscriptRecord {
        let mut record = TranscriptRecord::new("jane.pdf", Student::default());
        record.degrees.push(DegreeRecord {
            institution_name: "State".into(),
            degree: "BS".into(),
            major: "Biology".into(),
            overall_credits_earned: overall,
            courses,
            ..Default::default()
        });
        record
    }

    #[test]
    fn test_clean_degree_is_not_flagged() {
        let record = record(
            Some(6.0),
            vec![
                course("Genetics", 3.0, "Biology", PassStatus::Passed),
                course("Calculus", 3.0, "Mathematics", PassStatus::Failed),
            ],
        );
        assert!(detect_flags(&record, 0.01).is_empty());
    }

    #[test]
    fn test_credit_mismatch_flags_every_course_with_credits_only() {
        let record = record(
            Some(30.0),
            vec![
                course("Genetics", 12.0, "Biology", PassStatus::Passed),
                course("Ecology", 12.0, "Biology", PassStatus::Passed),
            ],
        );

        let flagged = detect_flags(&record, 0.01);
        assert_eq!(flagged.len(), 1);
        let mismatch = flagged[0].credit_mismatch.as_ref().unwrap();
        assert_eq!(mismatch.overall_credits_earned, Some(30.0));
        assert_eq!(mismatch.credits_sum, 24.0);
        assert_eq!(flagged[0].courses.len(), 2);
        assert_eq!(flagged[0].courses[0].credits_earned, Some(Some(12.0)));
        assert!(flagged[0].courses[0].should_be_category.is_none());
        assert!(flagged[0].courses[0].is_passed.is_none());
    }

    #[test]
    fn test_missing_total_is_a_mismatch() {
        let record = record(None, vec![course("Genetics", 3.0, "Biology", PassStatus::Passed)]);
        let flagged = detect_flags(&record, 0.01);
        assert_eq!(flagged[0].credit_mismatch.as_ref().unwrap().overall_credits_earned, None);
    }

    #[test]
    fn test_only_ambiguous_courses_are_listed() {
        let record = record(
            Some(9.0),
            vec![
                course("Genetics", 3.0, "Biology", PassStatus::Passed),
                course("Pottery", 3.0, "Uncategorized", PassStatus::Passed),
                course("Lab", 3.0, "Biology", PassStatus::Undetermined),
            ],
        );

        let flagged = detect_flags(&record, 0.01);
        let courses = &flagged[0].courses;
        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].course_name, "Pottery");
        assert_eq!(courses[0].should_be_category.as_deref(), Some("Uncategorized"));
        assert!(courses[0].is_passed.is_none());
        assert_eq!(courses[1].course_name, "Lab");
        assert_eq!(courses[1].is_passed, Some(PassStatus::Undetermined));
        assert!(courses[1].credits_earned.is_none());
    }
}
