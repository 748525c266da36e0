//! Uniform per-file result envelope

use serde::{Deserialize, Serialize};

use crate::error::StageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// Persistence outcome for one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistSummary {
    pub inserted_count: usize,
    /// `row_hash` of every course skipped as already stored
    pub duplicate_row_identifiers: Vec<String>,
}

/// Payload of a successful run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingData {
    pub inserted_count: usize,
    pub duplicate_row_identifiers: Vec<String>,
    pub reviewed: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// `{status, message, file, data?, details?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub status: ResultStatus,
    pub message: String,
    pub file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ProcessingData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ProcessingResult {
    pub fn success(file: impl Into<String>, data: ProcessingData) -> Self {
        let message = if data.inserted_count == 0 && !data.duplicate_row_identifiers.is_empty() {
            "All rows were already stored".to_string()
        } else {
            format!("Processed successfully, {} rows inserted", data.inserted_count)
        };
        Self {
            status: ResultStatus::Success,
            message,
            file: file.into(),
            data: Some(data),
            details: None,
        }
    }

    pub fn error(file: impl Into<String>, message: impl Into<String>, details: Option<String>) -> Self {
        Self {
            status: ResultStatus::Error,
            message: message.into(),
            file: file.into(),
            data: None,
            details,
        }
    }

    pub fn from_stage_error(file: impl Into<String>, err: &StageError) -> Self {
        Self::error(file, err.to_string(), err.details().map(str::to_string))
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}
