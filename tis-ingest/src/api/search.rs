//! Course search handler

use axum::{extract::State, routing::post, Json, Router};

use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::models::{display_name, SearchCriteria, SearchResponse};
use crate::AppState;

/// POST /search
///
/// Groups matching courses per category. With a category filter only that
/// category is listed; otherwise every known category plus `Uncategorized`.
pub async fn search(
    State(state): State<AppState>,
    Json(criteria): Json<SearchCriteria>,
) -> ApiResult<Json<SearchResponse>> {
    let matches = db::search_courses(&state.db, &criteria).await?;
    if matches.is_empty() {
        return Err(ApiError::NotFound("No courses match the search criteria".to_string()));
    }

    let grouping_labels = match criteria
        .course_category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
    {
        Some(category) => vec![state
            .categories
            .canonical(category)
            .unwrap_or(category)
            .to_string()],
        None => state.categories.grouping_labels(),
    };

    let educator_name = match (&criteria.educator_first_name, &criteria.educator_last_name) {
        (Some(first), Some(last)) if !first.trim().is_empty() && !last.trim().is_empty() => {
            Some(display_name(first, None, last))
        }
        _ => None,
    };

    tracing::info!(matches = matches.len(), educator = ?educator_name, "Search served");

    Ok(Json(SearchResponse {
        status: "success".to_string(),
        educator_name,
        results: db::summarize_by_category(&matches, &grouping_labels),
    }))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/search", post(search))
}
