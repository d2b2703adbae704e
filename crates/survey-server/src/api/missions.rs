//! Mission planning, lifecycle and progress endpoints.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use survey_core::models::{
    Boundary, FlightParameters, Mission, MissionDraft, MissionStatus, PatternType, PlanUpdate,
    ProgressUpdate, Waypoint,
};
use survey_core::spatial::PlanSummary;

use crate::api::error::{caller_from_headers, ApiError};
use crate::orchestrator::PlanPreview;
use crate::state::AppState;

type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    status: Option<MissionStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    boundary: Boundary,
    #[serde(default)]
    pattern_type: PatternType,
    parameters: FlightParameters,
    #[serde(default)]
    waypoints: Option<Vec<Waypoint>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AbortRequest {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FailRequest {
    reason: String,
}

pub async fn list_missions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Vec<Mission>>> {
    let caller = caller_from_headers(&headers)?;
    let missions = state.orchestrator().list_missions(&caller, query.status).await?;
    Ok(Json(missions))
}

pub async fn plan_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(draft): Json<MissionDraft>,
) -> ApiResult<impl IntoResponse> {
    let caller = caller_from_headers(&headers)?;
    let mission = state.orchestrator().plan_mission(&caller, draft).await?;
    Ok((StatusCode::CREATED, Json(mission)))
}

pub async fn preview_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<Json<PlanPreview>> {
    caller_from_headers(&headers)?;
    let preview = state.orchestrator().preview_plan(
        &request.boundary,
        request.pattern_type,
        &request.parameters,
        request.waypoints.as_deref(),
    )?;
    Ok(Json(preview))
}

pub async fn get_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().get_mission(&caller, &mission_id).await?))
}

pub async fn update_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
    Json(update): Json<PlanUpdate>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(
        state
            .orchestrator()
            .update_plan(&caller, &mission_id, update)
            .await?,
    ))
}

pub async fn delete_plan(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<StatusCode> {
    let caller = caller_from_headers(&headers)?;
    state.orchestrator().delete_plan(&caller, &mission_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn plan_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<Json<PlanSummary>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().plan_summary(&caller, &mission_id).await?))
}

pub async fn start_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().start(&caller, &mission_id).await?))
}

pub async fn pause_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().pause(&caller, &mission_id).await?))
}

pub async fn resume_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().resume(&caller, &mission_id).await?))
}

/// Abort accepts an empty body; the reason then defaults.
pub async fn abort_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    let request: AbortRequest = optional_json(&body)?;
    Ok(Json(
        state
            .orchestrator()
            .abort(&caller, &mission_id, request.reason)
            .await?,
    ))
}

pub async fn complete_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().complete(&caller, &mission_id).await?))
}

pub async fn fail_mission(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
    Json(request): Json<FailRequest>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(
        state
            .orchestrator()
            .fail(&caller, &mission_id, request.reason)
            .await?,
    ))
}

pub async fn ingest_progress(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(mission_id): Path<String>,
    Json(update): Json<ProgressUpdate>,
) -> ApiResult<Json<Mission>> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(
        state
            .orchestrator()
            .ingest_progress(&caller, &mission_id, update)
            .await?,
    ))
}

fn optional_json<T: DeserializeOwned + Default>(body: &[u8]) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {}", e)))
}
