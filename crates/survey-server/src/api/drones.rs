//! Drone registry endpoints.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use survey_core::models::{Drone, RegisterDroneRequest};

use crate::api::error::{caller_from_headers, ApiError};
use crate::state::AppState;

pub async fn list_drones(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Vec<Drone>>, ApiError> {
    let caller = caller_from_headers(&headers)?;
    Ok(Json(state.orchestrator().list_drones(&caller).await?))
}

pub async fn register_drone(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterDroneRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let caller = caller_from_headers(&headers)?;
    let drone = state.orchestrator().register_drone(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(drone)))
}
