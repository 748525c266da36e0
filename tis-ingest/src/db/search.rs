//! Course search across stored transcripts

use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use tis_common::Result;

use crate::models::{display_name, CategorySummary, CourseMatch, SearchCriteria};

/// Placeholder detail for a category with no matching courses
pub const NO_MATCHES: &str = "N/A";

type MatchRow = (String, String, String, String, String, String, f64);

/// Fetch every stored course matching the criteria
///
/// Name and category filters compare case-insensitively; blank filters are
/// ignored. An empty level list matches every level.
pub async fn search_courses(pool: &SqlitePool, criteria: &SearchCriteria) -> Result<Vec<CourseMatch>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT e.first_name, e.middle_name, e.last_name, t.degree,
               c.course_name, c.should_be_category, c.adjusted_credits_earned
        FROM courses c
        JOIN transcripts t ON t.transcript_id = c.transcript_id
        JOIN educators e ON e.educator_id = t.educator_id
        WHERE 1 = 1
        "#,
    );

    if let Some(first) = non_blank(&criteria.educator_first_name) {
        query.push(" AND LOWER(e.first_name) = LOWER(").push_bind(first).push(")");
    }
    if let Some(last) = non_blank(&criteria.educator_last_name) {
        query.push(" AND LOWER(e.last_name) = LOWER(").push_bind(last).push(")");
    }
    if let Some(category) = non_blank(&criteria.course_category) {
        query
            .push(" AND LOWER(c.should_be_category) = LOWER(")
            .push_bind(category)
            .push(")");
    }
    if !criteria.education_level.is_empty() {
        query.push(" AND t.degree_level IN (");
        let mut separated = query.separated(", ");
        for level in &criteria.education_level {
            separated.push_bind(level.as_str());
        }
        separated.push_unseparated(")");
    }
    query.push(" ORDER BY c.course_id");

    let rows: Vec<MatchRow> = query.build_query_as::<MatchRow>().fetch_all(pool).await?;

    tracing::debug!(matches = rows.len(), "Course search complete");

    Ok(rows
        .into_iter()
        .map(
            |(first_name, middle_name, last_name, degree, course_name, should_be_category, adjusted)| CourseMatch {
                first_name,
                middle_name: Some(middle_name).filter(|m| !m.is_empty()),
                last_name,
                degree,
                course_name,
                should_be_category,
                adjusted_credits_earned: adjusted,
            },
        )
        .collect())
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `"{course} ({degree} - {adjusted} credits - {first [middle ]last})"`
pub fn format_course_detail(m: &CourseMatch) -> String {
    format!(
        "{} ({} - {} credits - {})",
        m.course_name,
        m.degree,
        m.adjusted_credits_earned,
        display_name(&m.first_name, m.middle_name.as_deref(), &m.last_name)
    )
}

/// Group matches into one summary per label
///
/// Every grouping label appears in order; an empty group holds `"N/A"`.
/// Categories outside the grouping labels are appended after them. Details
/// are de-duplicated and sorted case-insensitively.
pub fn summarize_by_category(matches: &[CourseMatch], grouping_labels: &[String]) -> Vec<CategorySummary> {
    let mut groups: Vec<(String, Vec<String>)> = grouping_labels
        .iter()
        .map(|label| (label.clone(), Vec::new()))
        .collect();
    let mut extra: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for m in matches {
        let detail = format_course_detail(m);
        let category = m.should_be_category.trim();
        match groups
            .iter_mut()
            .find(|(label, _)| label.eq_ignore_ascii_case(category))
        {
            Some((_, details)) => details.push(detail),
            None => extra.entry(category.to_string()).or_default().push(detail),
        }
    }

    groups
        .into_iter()
        .chain(extra)
        .map(|(category, mut details)| {
            details.sort_by_key(|d| d.to_lowercase());
            details.dedup_by(|a, b| a.eq_ignore_ascii_case(b));
            if details.is_empty() {
                details.push(NO_MATCHES.to_string());
            }
            CategorySummary {
                category,
                course_details: details,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(name: &str, category: &str, adjusted: f64) -> CourseMatch {
        CourseMatch {
            first_name: "Jane".to_string(),
            middle_name: None,
            last_name: "Doe".to_string(),
            degree: "BS Biology".to_string(),
            course_name: name.to_string(),
            should_be_category: category.to_string(),
            adjusted_credits_earned: adjusted,
        }
    }

    #[test]
    fn test_detail_format() {
        let mut m = course("Genetics", "Biology", 3.0);
        assert_eq!(format_course_detail(&m), "Genetics (BS Biology - 3 credits - Jane Doe)");

        m.middle_name = Some("Q".to_string());
        m.adjusted_credits_earned = 2.5;
        assert_eq!(format_course_detail(&m), "Genetics (BS Biology - 2.5 credits - Jane Q Doe)");
    }

    #[test]
    fn test_empty_groups_show_placeholder() {
        let labels = vec!["Biology".to_string(), "Physics".to_string()];
        let summary = summarize_by_category(&[course("Genetics", "biology", 3.0)], &labels);

        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].category, "Biology");
        assert_eq!(summary[0].course_details.len(), 1);
        assert_eq!(summary[1].course_details, vec![NO_MATCHES.to_string()]);
    }

    #[test]
    fn test_details_deduplicated_and_sorted() {
        let labels = vec!["Biology".to_string()];
        let matches = vec![
            course("zoology", "Biology", 3.0),
            course("Anatomy", "Biology", 4.0),
            course("zoology", "Biology", 3.0),
        ];
        let summary = summarize_by_category(&matches, &labels);
        assert_eq!(
            summary[0].course_details,
            vec![
                "Anatomy (BS Biology - 4 credits - Jane Doe)".to_string(),
                "zoology (BS Biology - 3 credits - Jane Doe)".to_string(),
            ]
        );
    }

    #[test]
    fn test_unknown_category_is_appended() {
        let labels = vec!["Biology".to_string()];
        let summary = summarize_by_category(&[course("Pottery", "Ceramics", 2.0)], &labels);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[1].category, "Ceramics");
    }
}
