//! HTTP API handlers for tis-ingest
//!
//! REST endpoints for upload, review, search and categories, plus SSE for
//! pipeline progress and per-file review notices.

pub mod categories;
pub mod health;
pub mod review;
pub mod search;
pub mod sse;
pub mod upload;

pub use categories::category_routes;
pub use health::health_routes;
pub use review::review_routes;
pub use search::search_routes;
pub use sse::event_stream;
pub use upload::upload_routes;
