//! Search request and response models

use serde::{Deserialize, Serialize};

use super::transcript::DegreeLevel;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub educator_first_name: Option<String>,
    #[serde(default)]
    pub educator_last_name: Option<String>,
    #[serde(default)]
    pub course_category: Option<String>,
    /// Empty means every level
    #[serde(default)]
    pub education_level: Vec<DegreeLevel>,
}

/// One matching course row as read from storage
#[derive(Debug, Clone, PartialEq)]
pub struct CourseMatch {
    pub first_name: String,
    pub middle_name: Option<String>,
    pub last_name: String,
    pub degree: String,
    pub course_name: String,
    pub should_be_category: String,
    pub adjusted_credits_earned: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySummary {
    pub category: String,
    /// Formatted course details, or `["N/A"]` when nothing matched
    pub course_details: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub educator_name: Option<String>,
    pub results: Vec<CategorySummary>,
}
