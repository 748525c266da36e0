//! Record validation
//!
//! Two passes: per-field format rules that only produce warnings, then an
//! optional correction pass through an external [`FieldCorrector`] in five
//! groups. A group whose correction fails keeps its original values.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::{DegreeRecord, TranscriptRecord};

use super::llm::{parse_json_reply, ChatRequest, LlmError, LlmProvider};
use super::record_extractor::{value_number, value_text};

static NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}\s\-.'’]+$").unwrap());
static INSTITUTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{L}0-9\s.'’,&\-]+$").unwrap());
static DEGREE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s\-&.,'’/()]*$").unwrap());
static PROGRAM: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z\s\-&.,'’/():]*$").unwrap());
static AWARDED_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());
static OVERALL_CREDITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{1,4})?$").unwrap());
static GPA: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}(\.\d{1,4})?$").unwrap());
static COURSE_NAME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9\s\-&.,'’/():]+$").unwrap());
static CREDITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}(\.\d{1,4})?$").unwrap());
static GRADE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-D][+-]?|F|[A-Z]{1,3}|\d{1,3}(\.\d{1,4})?)$").unwrap());

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("record has no degrees")]
    NoDegrees,
    #[error("record has no courses")]
    NoCourses,
}

/// Field group sent to the corrector in one call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorrectionGroup {
    Names,
    AcademicInfo,
    AwardedDate,
    Performance,
    Course,
}

impl CorrectionGroup {
    fn instructions(&self) -> &'static str {
        match self {
            CorrectionGroup::Names => {
                "Check the student name for OCR errors. Keep prefixes with the first name. \
                 Return {\"first_name\": \"\", \"middle_name\": \"\", \"last_name\": \"\"}."
            }
            CorrectionGroup::AcademicInfo => {
                "Check the institution, degree, major and minor for OCR errors and spelling. \
                 Return {\"institution_name\": \"\", \"degree\": \"\", \"major\": \"\", \"minor\": \"\"}."
            }
            CorrectionGroup::AwardedDate => {
                "Normalize the awarded date to yyyy-mm-dd; a bare year becomes yyyy-12-31. \
                 Return {\"awarded_date\": \"\"}."
            }
            CorrectionGroup::Performance => {
                "Check that overall credits and GPA are plausible numbers. \
                 Return {\"overall_credits_earned\": 0.0, \"overall_gpa\": 0.0}."
            }
            CorrectionGroup::Course => {
                "Check the course name, credits and grade. Do not convert between numeric and \
                 letter grades; return the grade as a string. \
                 Return {\"course_name\": \"\", \"credits_earned\": 0.0, \"grade\": \"\"}."
            }
        }
    }
}

#[async_trait]
pub trait FieldCorrector: Send + Sync {
    /// Return corrected values for `fields`; keys not returned are kept
    async fn correct(&self, group: CorrectionGroup, fields: Value) -> Result<Value, LlmError>;
}

/// Model-backed corrector
pub struct LlmFieldCorrector {
    llm: Arc<dyn LlmProvider>,
}

impl LlmFieldCorrector {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl FieldCorrector for LlmFieldCorrector {
    async fn correct(&self, group: CorrectionGroup, fields: Value) -> Result<Value, LlmError> {
        let prompt = format!(
            "{}\nIf a field is empty leave it empty. If unsure, return the original value in the \
             correct format. Return only JSON.\n\nInput:\n{}",
            group.instructions(),
            fields
        );
        let reply = self
            .llm
            .chat(ChatRequest::new(
                "You validate OCR-extracted academic transcript fields and return JSON.",
                prompt,
            ))
            .await?;
        let value: Value = parse_json_reply(&reply.text)?;
        if !value.is_object() {
            return Err(LlmError::InvalidResponse("expected a JSON object".to_string()));
        }
        Ok(value)
    }
}

pub struct Validator {
    corrector: Option<Arc<dyn FieldCorrector>>,
}

impl Validator {
    pub fn new(corrector: Option<Arc<dyn FieldCorrector>>) -> Self {
        Self { corrector }
    }

    /// Validate and correct a record; halts only when it has nothing to store
    pub async fn validate(&self, mut record: TranscriptRecord) -> Result<TranscriptRecord, ValidationError> {
        if record.degrees.is_empty() {
            return Err(ValidationError::NoDegrees);
        }
        if record.course_count() == 0 {
            return Err(ValidationError::NoCourses);
        }

        if let Some(corrector) = &self.corrector {
            self.apply_corrections(corrector.as_ref(), &mut record).await;
        }

        let findings = rule_violations(&record);
        for finding in &findings {
            warn!(file_name = %record.file_name, "Validation: {}", finding);
        }
        record.warnings.extend(findings);

        Ok(record)
    }

    async fn apply_corrections(&self, corrector: &dyn FieldCorrector, record: &mut TranscriptRecord) {
        let file_name = record.file_name.clone();

        let student = &mut record.student;
        let names = json!({
            "first_name": student.first_name,
            "middle_name": student.middle_name.clone().unwrap_or_default(),
            "last_name": student.last_name,
        });
        if let Some(fixed) = run_group(corrector, CorrectionGroup::Names, names, &file_name).await {
            take_text(&fixed, "first_name", &mut student.first_name);
            take_text(&fixed, "last_name", &mut student.last_name);
            if student.middle_name.is_some() {
                let mut middle = student.middle_name.clone().unwrap_or_default();
                take_text(&fixed, "middle_name", &mut middle);
                student.middle_name = Some(middle);
            }
        }

        for degree in &mut record.degrees {
            self.correct_degree(corrector, degree, &file_name).await;
        }
    }

    async fn correct_degree(&self, corrector: &dyn FieldCorrector, degree: &mut DegreeRecord, file_name: &str) {
        let info = json!({
            "institution_name": degree.institution_name,
            "degree": degree.degree,
            "major": degree.major,
            "minor": degree.minor,
        });
        if let Some(fixed) = run_group(corrector, CorrectionGroup::AcademicInfo, info, file_name).await {
            take_text(&fixed, "institution_name", &mut degree.institution_name);
            take_text(&fixed, "degree", &mut degree.degree);
            take_text(&fixed, "major", &mut degree.major);
            take_text(&fixed, "minor", &mut degree.minor);
        }

        if !degree.awarded_date.is_empty() {
            let date = json!({ "awarded_date": degree.awarded_date });
            if let Some(fixed) = run_group(corrector, CorrectionGroup::AwardedDate, date, file_name).await {
                take_text(&fixed, "awarded_date", &mut degree.awarded_date);
            }
        }

        let performance = json!({
            "overall_credits_earned": degree.overall_credits_earned,
            "overall_gpa": degree.overall_gpa,
        });
        if let Some(fixed) = run_group(corrector, CorrectionGroup::Performance, performance, file_name).await {
            take_number(&fixed, "overall_credits_earned", &mut degree.overall_credits_earned);
            take_number(&fixed, "overall_gpa", &mut degree.overall_gpa);
        }

        let requests = degree.courses.iter().map(|course| {
            let fields = json!({
                "course_name": course.course_name,
                "credits_earned": course.credits_earned,
                "grade": course.grade,
            });
            run_group(corrector, CorrectionGroup::Course, fields, file_name)
        });
        let fixes = futures::future::join_all(requests).await;

        for (course, fixed) in degree.courses.iter_mut().zip(fixes) {
            if let Some(fixed) = fixed {
                take_text(&fixed, "course_name", &mut course.course_name);
                take_number(&fixed, "credits_earned", &mut course.credits_earned);
                take_text(&fixed, "grade", &mut course.grade);
            }
        }
    }
}

async fn run_group(
    corrector: &dyn FieldCorrector,
    group: CorrectionGroup,
    fields: Value,
    file_name: &str,
) -> Option<Map<String, Value>> {
    match corrector.correct(group, fields).await {
        Ok(Value::Object(map)) => {
            debug!(file_name = %file_name, group = ?group, "Validation: correction applied");
            Some(map)
        }
        Ok(_) => {
            warn!(file_name = %file_name, group = ?group, "Validation: correction was not an object; keeping originals");
            None
        }
        Err(e) => {
            warn!(file_name = %file_name, group = ?group, error = %e, "Validation: correction failed; keeping originals");
            None
        }
    }
}

/// Non-empty strings replace the target
fn take_text(fixed: &Map<String, Value>, key: &str, target: &mut String) {
    if let Some(value) = fixed.get(key) {
        let text = value_text(value);
        if !text.is_empty() {
            *target = text;
        }
    }
}

/// Numbers (or numeric strings) replace the target
fn take_number(fixed: &Map<String, Value>, key: &str, target: &mut Option<f64>) {
    if let Some(number) = fixed.get(key).and_then(value_number) {
        *target = Some(number);
    }
}

/// Format-rule findings; empty fields are not checked
pub fn rule_violations(record: &TranscriptRecord) -> Vec<String> {
    let mut findings = Vec::new();
    let mut check = |field: &str, item: usize, value: &str, pattern: &Regex| {
        let value = value.trim();
        if !value.is_empty() && !pattern.is_match(value) {
            findings.push(format!("Field '{}', item {}: invalid format '{}'", field, item, value));
        }
    };

    let student = &record.student;
    check("first_name", 1, &student.first_name, &*NAME);
    check("middle_name", 1, student.middle_name.as_deref().unwrap_or(""), &*NAME);
    check("last_name", 1, &student.last_name, &*NAME);

    let mut course_item = 0;
    for (i, degree) in record.degrees.iter().enumerate() {
        let item = i + 1;
        check("institution_name", item, &degree.institution_name, &*INSTITUTION);
        check("degree", item, &degree.degree, &*DEGREE);
        check("major", item, &degree.major, &*PROGRAM);
        check("minor", item, &degree.minor, &*PROGRAM);
        check("awarded_date", item, &degree.awarded_date, &*AWARDED_DATE);
        if let Some(credits) = degree.overall_credits_earned {
            check("overall_credits_earned", item, &credits.to_string(), &*OVERALL_CREDITS);
        }
        if let Some(gpa) = degree.overall_gpa {
            check("overall_gpa", item, &gpa.to_string(), &*GPA);
        }

        for course in &degree.courses {
            course_item += 1;
            check("course_name", course_item, &course.course_name, &*COURSE_NAME);
            if let Some(credits) = course.credits_earned {
                check("credits_earned", course_item, &credits.to_string(), &*CREDITS);
            }
            check("grade", course_item, &course.grade, &*GRADE);
        }
    }

    findings
}
