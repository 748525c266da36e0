//! Flat transcript tables
//!
//! One row per course. Rows are grouped into degrees by the normalized degree
//! natural key, in first-seen order.

use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::warn;

use crate::models::{CourseRecord, DegreeKey, DegreeRecord, Student, TranscriptRecord};

use super::ExtractionError;

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    middle_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    institution_name: String,
    #[serde(default)]
    degree: String,
    #[serde(default)]
    major: String,
    #[serde(default)]
    minor: String,
    #[serde(default)]
    awarded_date: String,
    #[serde(default)]
    overall_credits_earned: String,
    #[serde(default)]
    overall_gpa: String,
    #[serde(default)]
    course_name: String,
    #[serde(default)]
    credits_earned: String,
    #[serde(default)]
    grade: String,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

/// Parse CSV bytes into a transcript record
pub fn read_transcript_csv(file_name: &str, data: &[u8]) -> Result<TranscriptRecord, ExtractionError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(data);

    let mut student: Option<Student> = None;
    let mut degrees: Vec<DegreeRecord> = Vec::new();
    let mut index: HashMap<DegreeKey, usize> = HashMap::new();
    let mut warnings = Vec::new();

    for (line, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.map_err(|e| ExtractionError::Csv(e.to_string()))?;

        let row_student = Student {
            first_name: row.first_name.clone(),
            middle_name: Some(row.middle_name.clone()).filter(|m| !m.is_empty()),
            last_name: row.last_name.clone(),
        };
        match &student {
            None => student = Some(row_student),
            Some(existing) if *existing != row_student => {
                warn!(file_name = %file_name, row = line + 2, "CSV: row names a different student; using the first");
                warnings.push(format!(
                    "Row {} names {} but the file belongs to {}",
                    line + 2,
                    row_student.display_name(),
                    existing.display_name()
                ));
            }
            Some(_) => {}
        }

        let key = DegreeKey::new(
            &row.institution_name,
            &row.degree,
            &row.major,
            &row.minor,
            &row.awarded_date,
        );
        let slot = *index.entry(key).or_insert_with(|| {
            degrees.push(DegreeRecord {
                institution_name: row.institution_name.clone(),
                degree: row.degree.clone(),
                major: row.major.clone(),
                minor: row.minor.clone(),
                awarded_date: row.awarded_date.clone(),
                overall_credits_earned: parse_number(&row.overall_credits_earned),
                overall_gpa: parse_number(&row.overall_gpa),
                ..Default::default()
            });
            degrees.len() - 1
        });

        if row.course_name.is_empty() {
            continue;
        }
        degrees[slot].courses.push(CourseRecord::new(
            row.course_name,
            parse_number(&row.credits_earned),
            row.grade,
        ));
    }

    let student = student.ok_or(ExtractionError::EmptyText)?;
    let mut record = TranscriptRecord::new(file_name, student);
    record.degrees = degrees;
    record.warnings = warnings;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "first_name,middle_name,last_name,institution_name,degree,major,minor,awarded_date,overall_credits_earned,overall_gpa,course_name,credits_earned,grade\n";

    #[test]
    fn test_rows_group_into_degrees_in_order() {
        let data = format!(
            "{HEADER}\
             Jane,,Doe,State University,BS,Biology,,2019-05-15,7,3.5,Genetics,3,A\n\
             Jane,,Doe,State University,MS,Ecology,,2021-05-15,4,3.9,Field Methods,4,B+\n\
             Jane,,Doe,state university ,bs,BIOLOGY,,2019-05-15,7,3.5,Ecology,4,B\n"
        );

        let record = read_transcript_csv("jane.csv", data.as_bytes()).unwrap();
        assert_eq!(record.student.first_name, "Jane");
        assert_eq!(record.student.middle_name, None);
        assert_eq!(record.degrees.len(), 2);
        assert_eq!(record.degrees[0].degree, "BS");
        assert_eq!(record.degrees[0].courses.len(), 2);
        assert_eq!(record.degrees[0].overall_credits_earned, Some(7.0));
        assert_eq!(record.degrees[1].courses[0].course_name, "Field Methods");
        assert!(record.warnings.is_empty());
    }

    #[test]
    fn test_blank_numbers_are_missing() {
        let data = format!("{HEADER}Jane,Q,Doe,State,BA,Art,,,,,Drawing,,\n");
        let record = read_transcript_csv("jane.csv", data.as_bytes()).unwrap();
        let degree = &record.degrees[0];
        assert_eq!(record.student.middle_name.as_deref(), Some("Q"));
        assert_eq!(degree.overall_credits_earned, None);
        assert_eq!(degree.courses[0].credits_earned, None);
        assert_eq!(degree.courses[0].grade, "");
    }

    #[test]
    fn test_header_only_file_is_empty() {
        let result = read_transcript_csv("empty.csv", HEADER.as_bytes());
        assert!(matches!(result, Err(ExtractionError::EmptyText)));
    }

    #[test]
    fn test_second_student_is_warned() {
        let data = format!(
            "{HEADER}Jane,,Doe,State,BA,Art,,,3,,Drawing,3,A\nJohn,,Roe,State,BA,Art,,,3,,Painting,3,A\n"
        );
        let record = read_transcript_csv("mixed.csv", data.as_bytes()).unwrap();
        assert_eq!(record.warnings.len(), 1);
        assert_eq!(record.course_count(), 2);
    }
}
