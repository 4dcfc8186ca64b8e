//! HTTP surface for `JuriFlow`.
//!
//! A thin translation layer: request validation happens here, then work is
//! either answered from the in-process stores or admitted as a background
//! job. Handlers never await background jobs.

pub mod error;
pub mod routes;
pub mod state;
pub mod validate;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::ApiError;
pub use state::AppState;

/// Assemble the full application router.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.cors_origins);
    // Leave headroom above the documented upload limit so our own 413
    // check, not the body-limit middleware, reports oversized files.
    let body_limit =
        DefaultBodyLimit::max(state.settings.upload_max_bytes() as usize + 1024 * 1024);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/api/usage", get(routes::health::usage))
        .route(
            "/api/documents/start-upload",
            post(routes::documents::start_upload),
        )
        .route(
            "/api/documents/upload-status/:upload_id",
            get(routes::documents::upload_status),
        )
        .route(
            "/api/documents/upload-result/:upload_id",
            get(routes::documents::upload_result),
        )
        .route("/api/documents/uploads", get(routes::documents::list_uploads))
        .route(
            "/api/documents/:document_id",
            axum::routing::delete(routes::documents::delete_document),
        )
        .route("/api/analysis/start", post(routes::analysis::start))
        .route(
            "/api/analysis/status/:analysis_id",
            get(routes::analysis::status),
        )
        .route(
            "/api/analysis/result/:analysis_id",
            get(routes::analysis::result),
        )
        .route("/api/analysis/experts", get(routes::analysis::experts))
        .route("/api/analysis/attorneys", get(routes::analysis::attorneys))
        .route("/api/analysis/multi-agent", post(routes::analysis::multi_agent))
        .route("/api/petitions", get(routes::petitions::list))
        .route("/api/petitions/start", post(routes::petitions::start))
        .route(
            "/api/petitions/status/:petition_id",
            get(routes::petitions::status),
        )
        .route(
            "/api/petitions/:petition_id/analyze-documents",
            post(routes::petitions::analyze_documents),
        )
        .route(
            "/api/petitions/:petition_id/add-document",
            post(routes::petitions::add_document),
        )
        .route(
            "/api/petitions/:petition_id/analyze",
            post(routes::petitions::analyze),
        )
        .layer(body_limit)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS from configuration: explicit origins in production, permissive only
/// when nothing is configured.
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        warn!("CORS_ORIGINS not set; allowing all origins (development mode)");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    info!(origins = origins.len(), "CORS restricted to configured origins");
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(parsed))
        .allow_methods(Any)
        .allow_headers(Any)
}
