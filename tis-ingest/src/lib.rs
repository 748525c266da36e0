//! tis-ingest library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod review;
pub mod rules;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;

use tis_common::config::ServiceConfig;
use tis_common::events::EventBus;

use crate::pipeline::{PipelineComponents, PipelineOrchestrator, PipelineSettings};
use crate::review::ReviewRegistry;
use crate::services::categories::CourseCategories;
use crate::services::classifier::{
    ClassificationStrategy, ClassifierChain, LlmCategoryClassifier, SimilarityClassifier,
};
use crate::services::{
    CommandTextExtractor, FieldCorrector, LlmFieldCorrector, LlmProvider, LlmRecordExtractor,
    OpenAiCompatibleProvider, Validator,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    pub orchestrator: Arc<PipelineOrchestrator>,
    /// Review sessions, shared with the orchestrator
    pub registry: Arc<ReviewRegistry>,
    pub categories: Arc<CourseCategories>,
    pub config: Arc<ServiceConfig>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        event_bus: EventBus,
        orchestrator: Arc<PipelineOrchestrator>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            db,
            event_bus,
            registry: Arc::clone(orchestrator.registry()),
            categories: Arc::clone(orchestrator.categories()),
            last_error: orchestrator.last_error(),
            orchestrator,
            config: Arc::new(config),
            startup_time: Utc::now(),
        }
    }
}

/// Wire the production adapters: OCR commands and the configured model
///
/// Without an API key the model-backed steps fail per call; the similarity
/// classifier still runs and CSV uploads are unaffected.
pub fn build_components(config: &ServiceConfig) -> tis_common::Result<PipelineComponents> {
    let provider = OpenAiCompatibleProvider::new(&config.llm)
        .map_err(|e| tis_common::Error::Config(format!("LLM client: {}", e)))?;
    let llm_configured = provider.is_configured();
    if !llm_configured {
        tracing::warn!("No LLM API key configured; scanned transcripts cannot be structured");
    }
    let llm: Arc<dyn LlmProvider> = Arc::new(provider);

    let categories = CourseCategories::load_or_bundled(&config.categories_file)?;

    let corrector: Option<Arc<dyn FieldCorrector>> = if llm_configured {
        Some(Arc::new(LlmFieldCorrector::new(Arc::clone(&llm))))
    } else {
        None
    };
    let strategies: Vec<Arc<dyn ClassificationStrategy>> = vec![
        Arc::new(LlmCategoryClassifier::new(Arc::clone(&llm))),
        Arc::new(SimilarityClassifier::default()),
    ];

    Ok(PipelineComponents {
        text_extractor: Arc::new(CommandTextExtractor::new(&config.ocr)),
        record_extractor: Arc::new(LlmRecordExtractor::new(Arc::clone(&llm))),
        validator: Validator::new(corrector),
        classifier: ClassifierChain::new(strategies),
        categories: Arc::new(categories),
    })
}

/// Assemble the orchestrator around `components`
pub fn build_orchestrator(
    db: SqlitePool,
    event_bus: EventBus,
    components: PipelineComponents,
    config: &ServiceConfig,
) -> PipelineOrchestrator {
    PipelineOrchestrator::new(
        db,
        event_bus,
        Arc::new(ReviewRegistry::new()),
        components,
        PipelineSettings::from_config(config),
    )
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    let (max_files, max_file_size) = (state.config.max_files, state.config.max_file_size_bytes);

    Router::new()
        .merge(api::upload_routes(max_files, max_file_size))
        .merge(api::review_routes())
        .merge(api::search_routes())
        .merge(api::category_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
