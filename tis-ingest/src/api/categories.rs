//! Course category listing

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::services::categories::Category;
use crate::AppState;

/// GET /categories response
#[derive(Debug, Serialize, Deserialize)]
pub struct CategoriesResponse {
    pub status: String,
    /// Classifier targets with their descriptions
    pub course_categories: Vec<Category>,
    /// Labels used to group search results, `Uncategorized` included
    pub grouping_labels: Vec<String>,
}

/// GET /categories
pub async fn list_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        status: "success".to_string(),
        course_categories: state.categories.categories().to_vec(),
        grouping_labels: state.categories.grouping_labels(),
    })
}

/// Build category routes
pub fn category_routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories))
}
