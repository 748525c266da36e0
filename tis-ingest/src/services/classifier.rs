//! Course classification
//!
//! A ranked chain of strategies. Each returns labels aligned by index with the
//! course names plus a success flag; the chain stops at the first success.
//! When every strategy fails, all courses get the `Uncategorized` sentinel.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::models::UNCATEGORIZED;

use super::categories::CourseCategories;
use super::llm::{parse_json_reply, ChatRequest, LlmProvider};

/// Minimum similarity for the fallback matcher to accept a label
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub labels: Vec<String>,
    pub success: bool,
}

impl Classification {
    pub fn failed() -> Self {
        Self {
            labels: Vec::new(),
            success: false,
        }
    }

    /// Success requires one label per course and at least one real category
    pub fn from_labels(labels: Vec<String>, expected: usize) -> Self {
        let aligned = labels.len() == expected;
        let degenerate = labels.iter().all(|l| is_sentinel(l));
        Self {
            success: aligned && (expected == 0 || !degenerate),
            labels,
        }
    }
}

fn is_sentinel(label: &str) -> bool {
    let label = label.trim();
    label.is_empty() || label.eq_ignore_ascii_case(UNCATEGORIZED)
}

#[async_trait]
pub trait ClassificationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn classify(&self, course_names: &[String], categories: &CourseCategories) -> Classification;
}

/// Result of running the chain over one degree's courses
#[derive(Debug, Clone, PartialEq)]
pub struct ChainOutcome {
    pub labels: Vec<String>,
    /// Strategy that succeeded; `None` when the chain was exhausted
    pub strategy: Option<&'static str>,
}

impl ChainOutcome {
    pub fn exhausted(&self) -> bool {
        self.strategy.is_none()
    }
}

#[derive(Clone)]
pub struct ClassifierChain {
    strategies: Vec<Arc<dyn ClassificationStrategy>>,
}

impl ClassifierChain {
    pub fn new(strategies: Vec<Arc<dyn ClassificationStrategy>>) -> Self {
        Self { strategies }
    }

    pub async fn classify(&self, course_names: &[String], categories: &CourseCategories) -> ChainOutcome {
        if course_names.is_empty() {
            return ChainOutcome {
                labels: Vec::new(),
                strategy: Some("none"),
            };
        }

        for strategy in &self.strategies {
            let result = strategy.classify(course_names, categories).await;
            let checked = Classification::from_labels(result.labels, course_names.len());
            if result.success && checked.success {
                debug!(strategy = strategy.name(), courses = course_names.len(), "Classification succeeded");
                return ChainOutcome {
                    labels: checked
                        .labels
                        .into_iter()
                        .map(|label| {
                            categories
                                .canonical(&label)
                                .map(str::to_string)
                                .unwrap_or_else(|| UNCATEGORIZED.to_string())
                        })
                        .collect(),
                    strategy: Some(strategy.name()),
                };
            }
            warn!(strategy = strategy.name(), "Classification strategy failed, trying next");
        }

        ChainOutcome {
            labels: vec![UNCATEGORIZED.to_string(); course_names.len()],
            strategy: None,
        }
    }
}

/// Primary strategy: ask the model, giving it label descriptions
pub struct LlmCategoryClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl LlmCategoryClassifier {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    fn prompt(course_names: &[String], categories: &CourseCategories) -> String {
        let listing = categories
            .categories()
            .iter()
            .map(|c| match &c.description {
                Some(description) => format!("- {}: {}", c.label, description),
                None => format!("- {}", c.label),
            })
            .collect::<Vec<_>>()
            .join("\n");

        format!(
            "Match each course name to the closest category from the list. If several fit, \
             choose the most specific. Return ONLY a JSON list of category labels where each \
             index corresponds to the course at the same index.\n\nCourses: {}\n\nCategories:\n{}",
            serde_json::to_string(course_names).unwrap_or_default(),
            listing
        )
    }
}

#[async_trait]
impl ClassificationStrategy for LlmCategoryClassifier {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn classify(&self, course_names: &[String], categories: &CourseCategories) -> Classification {
        if categories.is_empty() {
            return Classification::failed();
        }

        let request = ChatRequest::new(
            "You categorize academic courses into predefined categories and return a JSON list.",
            Self::prompt(course_names, categories),
        );

        let reply = match self.llm.chat(request).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Classifier: model call failed");
                return Classification::failed();
            }
        };

        match parse_json_reply::<Vec<String>>(&reply.text) {
            Ok(labels) => Classification::from_labels(labels, course_names.len()),
            Err(e) => {
                warn!(error = %e, "Classifier: unparseable model reply");
                Classification::failed()
            }
        }
    }
}

/// Fallback strategy: string similarity against bare labels
pub struct SimilarityClassifier {
    threshold: f64,
}

impl SimilarityClassifier {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Similarity in [0, 1]; a label appearing as whole words in the course name scores 1
    pub fn score(course_name: &str, label: &str) -> f64 {
        let course = normalize(course_name);
        let label = normalize(label);
        if course.is_empty() || label.is_empty() {
            return 0.0;
        }
        if format!(" {} ", course).contains(&format!(" {} ", label)) {
            return 1.0;
        }
        strsim::sorensen_dice(&course, &label).max(strsim::jaro_winkler(&course, &label) - 0.15)
    }

    fn best_label(&self, course_name: &str, labels: &[String]) -> String {
        labels
            .iter()
            .map(|label| (label, Self::score(course_name, label)))
            .filter(|(_, score)| *score >= self.threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(label, _)| label.clone())
            .unwrap_or_else(|| UNCATEGORIZED.to_string())
    }
}

impl Default for SimilarityClassifier {
    fn default() -> Self {
        Self::new(SIMILARITY_THRESHOLD)
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl ClassificationStrategy for SimilarityClassifier {
    fn name(&self) -> &'static str {
        "similarity"
    }

    async fn classify(&self, course_names: &[String], categories: &CourseCategories) -> Classification {
        let labels = categories.labels();
        if labels.is_empty() {
            return Classification::failed();
        }
        let matched = course_names
            .iter()
            .map(|name| self.best_label(name, &labels))
            .collect();
        Classification::from_labels(matched, course_names.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Returns fixed labels and records the names it was given
    struct Fixed {
        name: &'static str,
        labels: Vec<String>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Fixed {
        fn new(name: &'static str, labels: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                name,
                labels: labels.iter().map(|l| l.to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ClassificationStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn classify(&self, course_names: &[String], _categories: &CourseCategories) -> Classification {
            self.seen.lock().unwrap().push(course_names.to_vec());
            Classification::from_labels(self.labels.clone(), course_names.len())
        }
    }

    fn chain_of(strategies: &[&Arc<Fixed>]) -> ClassifierChain {
        ClassifierChain::new(
            strategies
                .iter()
                .map(|s| Arc::clone(s) as Arc<dyn ClassificationStrategy>)
                .collect(),
        )
    }

    fn names() -> Vec<String> {
        vec!["Calculus I".into(), "Genetics".into(), "Poetry".into()]
    }

    fn categories() -> CourseCategories {
        CourseCategories::from_labels(["Mathematics", "Biology", "English"])
    }

    #[test]
    fn test_from_labels_detects_degenerate_output() {
        assert!(!Classification::from_labels(vec!["Uncategorized".into(); 2], 2).success);
        assert!(!Classification::from_labels(vec!["Biology".into()], 2).success);
        assert!(Classification::from_labels(vec!["Biology".into(), "".into()], 2).success);
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let primary = Fixed::new("primary", &["mathematics", "Biology", "English"]);
        let fallback = Fixed::new("fallback", &["Biology", "Biology", "Biology"]);
        let chain = chain_of(&[&primary, &fallback]);

        let outcome = chain.classify(&names(), &categories()).await;
        assert_eq!(outcome.strategy, Some("primary"));
        assert_eq!(outcome.labels, vec!["Mathematics", "Biology", "English"]);
        assert!(fallback.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_all_sentinel_primary_falls_back_with_same_names() {
        let primary = Fixed::new("primary", &["Uncategorized"; 3]);
        let fallback = Fixed::new("fallback", &["Uncategorized"; 3]);
        let chain = chain_of(&[&primary, &fallback]);

        let outcome = chain.classify(&names(), &categories()).await;
        assert!(outcome.exhausted());
        assert_eq!(outcome.labels, vec![UNCATEGORIZED; 3]);
        assert_eq!(fallback.seen.lock().unwrap()[0], names());
    }

    #[tokio::test]
    async fn test_misaligned_output_is_a_failure() {
        let primary = Fixed::new("primary", &["Mathematics"]);
        let chain = chain_of(&[&primary]);

        let outcome = chain.classify(&names(), &categories()).await;
        assert!(outcome.exhausted());
        assert_eq!(outcome.labels.len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_labels_become_sentinel() {
        let primary = Fixed::new("primary", &["Mathematics", "Astrology", "English"]);
        let chain = chain_of(&[&primary]);

        let outcome = chain.classify(&names(), &categories()).await;
        assert_eq!(outcome.labels[1], UNCATEGORIZED);
    }

    #[tokio::test]
    async fn test_similarity_matches_contained_labels() {
        let classifier = SimilarityClassifier::default();
        let result = classifier
            .classify(
                &["Intro to Biology".to_string(), "Underwater Basket Weaving".to_string()],
                &categories(),
            )
            .await;
        assert!(result.success);
        assert_eq!(result.labels, vec!["Biology", UNCATEGORIZED]);
    }

    #[test]
    fn test_similarity_score_bounds() {
        assert_eq!(SimilarityClassifier::score("Mathematics", "mathematics"), 1.0);
        assert!(SimilarityClassifier::score("Mathematic", "Mathematics") >= SIMILARITY_THRESHOLD);
        assert!(SimilarityClassifier::score("Poetry", "Chemistry") < SIMILARITY_THRESHOLD);
    }
}
