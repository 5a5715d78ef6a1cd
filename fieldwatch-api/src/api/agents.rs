//! Agent registration, lookup, deletion, and incident videos

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use fieldwatch_common::db::{Agent, IncidentVideo, NewAgent, SubmissionRecord};
use fieldwatch_common::store::{AgentDirectory, SubmissionProvider};
use serde::Deserialize;
use tracing::info;

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::AppState;

/// POST /api/agents
pub async fn register_agent(
    State(state): State<AppState>,
    ApiJson(new): ApiJson<NewAgent>,
) -> ApiResult<(StatusCode, Json<Agent>)> {
    let agent = state.store.register(new).await?;

    info!(
        agent_code = %agent.agent_code,
        ward_code = %agent.ward_code,
        "Agent registered"
    );

    Ok((StatusCode::CREATED, Json(agent)))
}

/// GET /api/agents/:code
pub async fn get_agent(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Agent>> {
    let agent = load_agent(&state, &code).await?;
    Ok(Json(agent))
}

/// DELETE /api/agents/:code
///
/// Removes the agent together with its submission, candidate rows, and videos.
pub async fn delete_agent(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<StatusCode> {
    if !state.store.delete(&code).await? {
        return Err(ApiError::NotFound(format!("Agent not found: {}", code)));
    }

    info!(agent_code = %code, "Agent deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/agents/:code/submission
pub async fn get_agent_submission(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<SubmissionRecord>> {
    load_agent(&state, &code).await?;

    let submission = state
        .store
        .find_by_agent_code(&code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No submission for agent {}", code)))?;

    let record = state
        .store
        .find_by_id(&submission.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Submission not found: {}", submission.id)))?;

    Ok(Json(record))
}

/// Body of POST /api/agents/:code/videos
#[derive(Debug, Deserialize)]
pub struct VideoRequest {
    pub video_url: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// POST /api/agents/:code/videos
pub async fn add_video(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ApiJson(request): ApiJson<VideoRequest>,
) -> ApiResult<(StatusCode, Json<IncidentVideo>)> {
    load_agent(&state, &code).await?;

    let video = state
        .store
        .add_video(
            &code,
            &request.video_url,
            request.description,
            state.max_videos_per_agent,
        )
        .await?;

    info!(agent_code = %code, video_id = %video.id, "Incident video recorded");
    Ok((StatusCode::CREATED, Json(video)))
}

/// GET /api/agents/:code/videos
pub async fn list_videos(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Vec<IncidentVideo>>> {
    load_agent(&state, &code).await?;
    Ok(Json(state.store.list_videos(&code).await?))
}

async fn load_agent(state: &AppState, code: &str) -> ApiResult<Agent> {
    state
        .store
        .find_by_code(code)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Agent not found: {}", code)))
}
