//! Structured record extraction from raw transcript text
//!
//! The model answers with a columnar JSON object: one list per field. Student
//! and degree fields use their first element; course lists are zipped and
//! padded to the longest list.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{CourseRecord, DegreeRecord, Student, TranscriptRecord};

use super::llm::{parse_json_reply, ChatRequest, LlmProvider};
use super::ExtractionError;

const SYSTEM_PROMPT: &str =
    "You are an expert in extracting structured academic transcript data and returning valid JSON.";

const EXTRACTION_RULES: &str = r#"Extract and organize the transcript below into a valid JSON object with exactly these keys,
each mapping to a list of strings or numbers:
{"student_firstName": [], "student_middleName": [], "student_lastName": [],
 "institution_name": [], "degree": [], "major": [], "minor": [], "awarded_date": [],
 "overall_credits_earned": [], "overall_gpa": [],
 "course_name": [], "credits_earned": [], "grade": []}
Rules:
- Return only JSON, no explanations or markdown.
- If the student name is missing, use the "record of" field. Put a name prefix with the first name.
- If the degree awarded date is missing, use the program graduation date.
- Format awarded_date as yyyy-mm-dd; if only a year is given use yyyy-12-31.
- Discard course codes and keep course names; expand abbreviations but not special characters.
- If credits earned is missing for a course, use credits attempted.
- Prefer the letter grade; numeric grades are returned as strings.
- course_name, credits_earned and grade must have the same number of items.
- Credits and GPA are numbers (e.g. 3.0, 3.33).
- If a field is not found, leave its list empty."#;

#[async_trait]
pub trait RecordExtractor: Send + Sync {
    async fn extract(&self, file_name: &str, text: &str) -> Result<TranscriptRecord, ExtractionError>;
}

/// Model-backed extractor
pub struct LlmRecordExtractor {
    llm: Arc<dyn LlmProvider>,
}

impl LlmRecordExtractor {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl RecordExtractor for LlmRecordExtractor {
    async fn extract(&self, file_name: &str, text: &str) -> Result<TranscriptRecord, ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyText);
        }

        let prompt = format!("{}\n\nTranscript:\n```\n{}\n```", EXTRACTION_RULES, text);
        let reply = self.llm.chat(ChatRequest::new(SYSTEM_PROMPT, prompt)).await?;
        debug!(file_name = %file_name, chars = reply.text.len(), "Extraction: model replied");

        let columns: ColumnarTranscript = parse_json_reply(&reply.text)
            .map_err(|e| ExtractionError::MalformedOutput(e.to_string()))?;

        columnar_to_record(file_name, columns)
    }
}

/// Raw columnar model output
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ColumnarTranscript {
    #[serde(rename = "student_firstName")]
    pub student_first_name: Vec<Value>,
    #[serde(rename = "student_middleName")]
    pub student_middle_name: Vec<Value>,
    #[serde(rename = "student_lastName")]
    pub student_last_name: Vec<Value>,
    pub institution_name: Vec<Value>,
    pub degree: Vec<Value>,
    pub major: Vec<Value>,
    pub minor: Vec<Value>,
    pub awarded_date: Vec<Value>,
    pub overall_credits_earned: Vec<Value>,
    pub overall_gpa: Vec<Value>,
    pub course_name: Vec<Value>,
    pub credits_earned: Vec<Value>,
    pub grade: Vec<Value>,
}

/// Build a one-degree record from columnar lists
pub fn columnar_to_record(
    file_name: &str,
    columns: ColumnarTranscript,
) -> Result<TranscriptRecord, ExtractionError> {
    let student = Student {
        first_name: first_text(&columns.student_first_name),
        middle_name: Some(first_text(&columns.student_middle_name)).filter(|m| !m.is_empty()),
        last_name: first_text(&columns.student_last_name),
    };

    let course_count = columns
        .course_name
        .len()
        .max(columns.credits_earned.len())
        .max(columns.grade.len());

    if student.first_name.is_empty() && student.last_name.is_empty() && course_count == 0 {
        return Err(ExtractionError::MalformedOutput(
            "model output contained no transcript fields".to_string(),
        ));
    }

    let courses = (0..course_count)
        .map(|i| {
            CourseRecord::new(
                columns.course_name.get(i).map(value_text).unwrap_or_default(),
                columns.credits_earned.get(i).and_then(value_number),
                columns.grade.get(i).map(value_text).unwrap_or_default(),
            )
        })
        .filter(|c| !c.course_name.is_empty())
        .collect::<Vec<_>>();

    if courses.len() < course_count {
        warn!(
            file_name = %file_name,
            dropped = course_count - courses.len(),
            "Extraction: dropped course rows without a name"
        );
    }

    let degree = DegreeRecord {
        institution_name: first_text(&columns.institution_name),
        degree: first_text(&columns.degree),
        major: first_text(&columns.major),
        minor: first_text(&columns.minor),
        awarded_date: first_text(&columns.awarded_date),
        overall_credits_earned: columns.overall_credits_earned.first().and_then(value_number),
        overall_gpa: columns.overall_gpa.first().and_then(value_number),
        courses,
        ..Default::default()
    };

    let mut record = TranscriptRecord::new(file_name, student);
    record.degrees.push(degree);
    Ok(record)
}

fn first_text(values: &[Value]) -> String {
    values.first().map(value_text).unwrap_or_default()
}

/// String form of a scalar; null becomes empty
pub fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    }
}

/// Number from a JSON number or numeric string
pub fn value_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::llm::{ChatResponse, LlmError};
    use serde_json::json;

    struct ScriptedLlm(String);

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat(&self, _req: ChatRequest) -> Result<ChatResponse, LlmError> {
            Ok(ChatResponse {
                text: self.0.clone(),
            })
        }
    }

    #[test]
    fn test_value_number_accepts_strings_and_numbers() {
        assert_eq!(value_number(&json!(3)), Some(3.0));
        assert_eq!(value_number(&json!("4.5")), Some(4.5));
        assert_eq!(value_number(&json!("")), None);
        assert_eq!(value_number(&json!(null)), None);
    }

    #[test]
    fn test_columnar_lists_are_padded() {
        let columns: ColumnarTranscript = serde_json::from_value(json!({
            "student_firstName": ["Jane"],
            "student_lastName": ["Doe"],
            "degree": ["Bachelor of Science"],
            "major": ["Biology"],
            "overall_credits_earned": ["7"],
            "course_name": ["Genetics", "Ecology"],
            "credits_earned": [3],
            "grade": ["A", "B", "C"]
        }))
        .unwrap();

        let record = columnar_to_record("jane.pdf", columns).unwrap();
        let degree = &record.degrees[0];
        assert_eq!(record.student.middle_name, None);
        assert_eq!(degree.overall_credits_earned, Some(7.0));
        // third row has a grade but no name and is dropped
        assert_eq!(degree.courses.len(), 2);
        assert_eq!(degree.courses[1].credits_earned, None);
        assert_eq!(degree.courses[1].grade, "B");
    }

    #[test]
    fn test_empty_columns_are_malformed() {
        let result = columnar_to_record("x.pdf", ColumnarTranscript::default());
        assert!(matches!(result, Err(ExtractionError::MalformedOutput(_))));
    }

    #[tokio::test]
    async fn test_extract_strips_fences() {
        let reply = "```json\n{\"student_firstName\":[\"Ana\"],\"student_lastName\":[\"Lee\"],\"course_name\":[\"Art\"],\"credits_earned\":[\"3\"],\"grade\":[\"A\"]}\n```";
        let extractor = LlmRecordExtractor::new(Arc::new(ScriptedLlm(reply.to_string())));

        let record = extractor.extract("ana.png", "raw text").await.unwrap();
        assert_eq!(record.student.first_name, "Ana");
        assert_eq!(record.course_count(), 1);
    }

    #[tokio::test]
    async fn test_extract_rejects_empty_text() {
        let extractor = LlmRecordExtractor::new(Arc::new(ScriptedLlm("{}".to_string())));
        let result = extractor.extract("blank.png", "   ").await;
        assert!(matches!(result, Err(ExtractionError::EmptyText)));
    }
}
