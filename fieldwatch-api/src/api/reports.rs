//! Reporting endpoints
//!
//! Each request loads its working set and recomputes the report; nothing is cached.

use axum::{
    extract::{Query, State},
    Json,
};
use fieldwatch_common::db::{Discrepancy, LocationFilter};
use fieldwatch_common::reconcile::{
    self, DuplicateReport, ExtraSubmissions, MissingSubmissions, TallyReport,
};
use fieldwatch_common::store::DiscrepancyRecorder;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct TallyQuery {
    pub county: Option<String>,
}

/// GET /api/reports/tally?county=
pub async fn candidate_tally(
    State(state): State<AppState>,
    Query(query): Query<TallyQuery>,
) -> ApiResult<Json<TallyReport>> {
    Ok(Json(
        reconcile::tally_report(&state.store, query.county.as_deref()).await?,
    ))
}

/// GET /api/reports/missing-submissions?county=&constituency=&ward=
pub async fn missing_submissions(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> ApiResult<Json<MissingSubmissions>> {
    Ok(Json(
        reconcile::missing_submissions_report(&state.store, &filter).await?,
    ))
}

/// GET /api/reports/extra-submissions?county=&constituency=&ward=
pub async fn extra_submissions(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> ApiResult<Json<ExtraSubmissions>> {
    Ok(Json(
        reconcile::extra_submissions_report(&state.store, &filter).await?,
    ))
}

/// GET /api/reports/duplicate-submissions?county=&constituency=&ward=
pub async fn duplicate_submissions(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> ApiResult<Json<DuplicateReport>> {
    Ok(Json(
        reconcile::duplicate_submissions_report(&state.store, &filter).await?,
    ))
}

/// GET /api/discrepancies
pub async fn list_discrepancies(
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<Discrepancy>>> {
    Ok(Json(state.store.list_discrepancies().await?))
}
