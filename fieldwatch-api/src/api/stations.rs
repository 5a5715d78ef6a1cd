//! Polling station reference data

use axum::{
    extract::{Query, State},
    Json,
};
use fieldwatch_common::db::{LocationFilter, PollingStation};
use fieldwatch_common::store::StationProvider;
use serde::Serialize;
use tracing::info;

use crate::error::{ApiJson, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

/// POST /api/stations/import
///
/// Upserts a batch of station records by station code. The whole batch is
/// rejected if any record is invalid.
pub async fn import_stations(
    State(state): State<AppState>,
    ApiJson(stations): ApiJson<Vec<PollingStation>>,
) -> ApiResult<Json<ImportResponse>> {
    let imported = state.store.upsert_stations(&stations).await?;
    info!(imported, "Polling stations imported");
    Ok(Json(ImportResponse { imported }))
}

/// GET /api/stations?county=&constituency=&ward=
pub async fn list_stations(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> ApiResult<Json<Vec<PollingStation>>> {
    Ok(Json(state.store.list_stations(&filter).await?))
}
