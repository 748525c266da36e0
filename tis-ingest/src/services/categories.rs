//! Course category label set
//!
//! Loaded from `{"course_categories": {label: description}}` or
//! `{"course_categories": [label, ...]}`. The `Uncategorized` sentinel is
//! never a classifier target.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use tis_common::{Error, Result};

use crate::models::UNCATEGORIZED;

const BUNDLED_CATEGORIES: &str = include_str!("../../data/course_categories.json");

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CategoryList {
    Described(BTreeMap<String, String>),
    Labels(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    course_categories: CategoryList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseCategories {
    categories: Vec<Category>,
}

impl CourseCategories {
    pub fn new(categories: Vec<Category>) -> Self {
        let categories = categories
            .into_iter()
            .filter(|c| {
                let label = c.label.trim();
                !label.is_empty() && !label.eq_ignore_ascii_case(UNCATEGORIZED)
            })
            .collect();
        Self { categories }
    }

    /// Labels without descriptions
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            labels
                .into_iter()
                .map(|label| Category {
                    label: label.into(),
                    description: None,
                })
                .collect(),
        )
    }

    pub fn parse(json: &str) -> Result<Self> {
        let file: CategoryFile = serde_json::from_str(json)
            .map_err(|e| Error::Config(format!("Invalid course categories: {}", e)))?;

        let categories = match file.course_categories {
            CategoryList::Described(map) => map
                .into_iter()
                .map(|(label, description)| Category {
                    label,
                    description: Some(description).filter(|d| !d.trim().is_empty()),
                })
                .collect(),
            CategoryList::Labels(labels) => labels
                .into_iter()
                .map(|label| Category {
                    label,
                    description: None,
                })
                .collect(),
        };

        Ok(Self::new(categories))
    }

    /// Load the configured file, falling back to the bundled set if it is absent
    pub fn load_or_bundled(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let categories = Self::parse(&content)?;
            info!(path = %path.display(), count = categories.len(), "Loaded course categories");
            Ok(categories)
        } else {
            warn!(path = %path.display(), "Course categories file not found, using bundled set");
            Self::parse(BUNDLED_CATEGORIES)
        }
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn labels(&self) -> Vec<String> {
        self.categories.iter().map(|c| c.label.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Canonical label for `candidate`, matched case-insensitively
    pub fn canonical(&self, candidate: &str) -> Option<&str> {
        let candidate = candidate.trim();
        self.categories
            .iter()
            .find(|c| c.label.eq_ignore_ascii_case(candidate))
            .map(|c| c.label.as_str())
    }

    /// Every label plus the sentinel, in display order
    pub fn grouping_labels(&self) -> Vec<String> {
        let mut labels = self.labels();
        labels.push(UNCATEGORIZED.to_string());
        labels
    }
}
