//! fieldwatch-api library - field reporting backend
//!
//! Agent registration, Form 34A intake with duplicate-serial flagging, and
//! the reconciliation/tally reporting endpoints.

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use fieldwatch_common::store::SqliteStore;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod extraction;
pub mod intake;

use extraction::FormExtractor;

/// Upper bound on request bodies; form uploads carry a base64 image
pub const MAX_BODY_BYTES: usize = 20 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
    pub extractor: Arc<dyn FormExtractor>,
    pub max_videos_per_agent: u32,
}

impl AppState {
    /// Create new application state
    pub fn new(
        store: SqliteStore,
        extractor: Arc<dyn FormExtractor>,
        max_videos_per_agent: u32,
    ) -> Self {
        Self {
            store,
            extractor,
            max_videos_per_agent,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let write_routes = Router::new()
        .route("/api/agents", post(api::register_agent))
        .route("/api/agents/:code", get(api::get_agent).delete(api::delete_agent))
        .route("/api/agents/:code/submission", get(api::get_agent_submission))
        .route(
            "/api/agents/:code/videos",
            get(api::list_videos).post(api::add_video),
        )
        .route("/api/forms", post(api::submit_form))
        .route("/api/submissions", get(api::list_submissions))
        .route("/api/submissions/:id", get(api::get_submission))
        .route("/api/stations", get(api::list_stations))
        .route("/api/stations/import", post(api::import_stations));

    let report_routes = Router::new()
        .route("/api/reports/tally", get(api::candidate_tally))
        .route("/api/reports/missing-submissions", get(api::missing_submissions))
        .route("/api/reports/extra-submissions", get(api::extra_submissions))
        .route("/api/reports/duplicate-submissions", get(api::duplicate_submissions))
        .route("/api/discrepancies", get(api::list_discrepancies));

    Router::new()
        .merge(write_routes)
        .merge(report_routes)
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
