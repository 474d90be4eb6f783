use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use cohort_orchestrator::CohortService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with every pipeline endpoint.
pub fn build_router(service: Arc<CohortService>) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/orchestration/process", post(handler::process_file))
        .route("/v1/orchestration/files/:file_id", get(handler::file_status))
        .route(
            "/v1/orchestration/files/:file_id/records/:key",
            get(handler::record_status),
        )
        .route("/v1/validation/participant", post(handler::validate_participant))
        .route("/v1/validation/batch", post(handler::validate_batch))
        .route(
            "/v1/transformation/participant",
            post(handler::transform_participant),
        )
        .route("/v1/transformation/batch", post(handler::transform_batch))
        .route("/v1/distribution/records", post(handler::create_distribution))
        .route("/v1/distribution/extract", post(handler::extract))
        .route("/v1/distribution/replay", post(handler::replay))
        .route("/v1/exceptions", post(handler::create_exceptions))
        .route("/v1/exceptions/resolve", post(handler::resolve_exceptions))
        .route("/v1/exceptions/:key", get(handler::list_exceptions))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(service))
}

/// [`build_router`] answering cross-origin requests from any origin.
pub fn build_permissive_router(service: Arc<CohortService>) -> Router {
    build_router(service).layer(CorsLayer::permissive())
}
