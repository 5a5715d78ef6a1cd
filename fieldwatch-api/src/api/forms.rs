//! Form 34A upload and submission lookup

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use fieldwatch_common::db::{LocationFilter, Submission, SubmissionRecord};
use fieldwatch_common::store::SubmissionProvider;
use serde::Deserialize;

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::intake::{self, FormSubmission, FormUpload};
use crate::AppState;

/// Body of POST /api/forms
#[derive(Debug, Deserialize)]
pub struct FormRequest {
    #[serde(default)]
    pub agent_code: String,
    /// Scanned form image, standard base64
    #[serde(default)]
    pub image_base64: String,
    #[serde(default)]
    pub polling_station_code: Option<String>,
    #[serde(default)]
    pub polling_station_name: Option<String>,
}

/// POST /api/forms
///
/// Returns 201 with the stored submission. A duplicate serial number does not
/// fail the request; it is reported in the `duplicate` field instead.
pub async fn submit_form(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<FormRequest>,
) -> ApiResult<(StatusCode, Json<FormSubmission>)> {
    let upload = FormUpload {
        agent_code: request.agent_code,
        image_base64: request.image_base64,
        polling_station_code: request.polling_station_code,
        polling_station_name: request.polling_station_name,
    };

    let outcome = intake::submit_form(&state.store, state.extractor.as_ref(), upload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// GET /api/submissions?county=&constituency=&ward=
pub async fn list_submissions(
    State(state): State<AppState>,
    Query(filter): Query<LocationFilter>,
) -> ApiResult<Json<Vec<Submission>>> {
    Ok(Json(state.store.list_submissions(&filter).await?))
}

/// GET /api/submissions/:id
pub async fn get_submission(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmissionRecord>> {
    state
        .store
        .find_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Submission not found: {}", id)))
}
