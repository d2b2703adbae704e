//! REST API routes.

use std::sync::Arc;

use axum::{
    routing::{get, patch, post},
    Router,
};

use crate::api::{drones, missions, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        // Missions
        .route("/v1/missions", get(missions::list_missions).post(missions::plan_mission))
        .route("/v1/missions/preview", post(missions::preview_plan))
        .route(
            "/v1/missions/:id",
            get(missions::get_mission)
                .patch(missions::update_plan)
                .delete(missions::delete_plan),
        )
        .route("/v1/missions/:id/summary", get(missions::plan_summary))
        // Lifecycle
        .route("/v1/missions/:id/start", post(missions::start_mission))
        .route("/v1/missions/:id/pause", post(missions::pause_mission))
        .route("/v1/missions/:id/resume", post(missions::resume_mission))
        .route("/v1/missions/:id/abort", post(missions::abort_mission))
        .route("/v1/missions/:id/complete", post(missions::complete_mission))
        .route("/v1/missions/:id/fail", post(missions::fail_mission))
        .route("/v1/missions/:id/progress", patch(missions::ingest_progress))
        // Drones
        .route("/v1/drones", get(drones::list_drones).post(drones::register_drone))
        // WebSocket streaming
        .route("/v1/stream", get(ws::ws_handler))
}
