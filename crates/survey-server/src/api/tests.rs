use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::{
    api,
    config::Config,
    notify::EventBus,
    persistence::{init_database, MemoryStore, SqliteStore, StoreBackend},
    state::AppState,
};

async fn setup_app() -> (axum::Router, Arc<AppState>) {
    let db = init_database(":memory:", 1).await.expect("init db");
    let state = Arc::new(AppState::new(
        StoreBackend::Sqlite(SqliteStore::new(db)),
        Arc::new(EventBus::new(64)),
        Config::default(),
    ));
    let app = api::routes().with_state(state.clone());
    (app, state)
}

fn memory_app() -> axum::Router {
    let state = Arc::new(AppState::new(
        StoreBackend::Memory(MemoryStore::new()),
        Arc::new(EventBus::new(64)),
        Config::default(),
    ));
    api::routes().with_state(state)
}

fn request(method: &str, uri: &str, role: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .header("X-Organization-Id", "org-1")
        .header("X-User-Id", "user-1")
        .header("X-User-Role", role);
    let body = match body {
        Some(value) => Body::from(value.to_string()),
        None => Body::empty(),
    };
    builder.body(body).unwrap()
}

async fn read_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("parse json")
}

async fn register_drone(app: &axum::Router) -> String {
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/drones",
            "admin",
            Some(json!({"name": "Scout", "serial_number": "SN-1", "model": "Quad"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    read_json(res).await["drone_id"].as_str().unwrap().to_string()
}

fn mission_body(drone_id: &str) -> Value {
    json!({
        "name": "Vineyard",
        "drone_id": drone_id,
        "pattern_type": "grid",
        "parameters": {"altitude_m": 40.0, "speed_mps": 5.0, "overlap_percent": 30.0},
        "boundary": {"coordinates": [[0.0, 0.0], [0.0, 0.001], [0.001, 0.001], [0.001, 0.0], [0.0, 0.0]]}
    })
}

async fn plan(app: &axum::Router, drone_id: &str) -> Value {
    let res = app
        .clone()
        .oneshot(request("POST", "/v1/missions", "operator", Some(mission_body(drone_id))))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    read_json(res).await
}

#[tokio::test]
async fn health_is_public() {
    let (app, _state) = setup_app().await;
    let res = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_identity_is_unauthorized() {
    let (app, _state) = setup_app().await;
    let res = app
        .oneshot(Request::builder().uri("/v1/missions").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(read_json(res).await["kind"], "unauthorized");
}

#[tokio::test]
async fn plan_and_run_mission() {
    let (app, _state) = setup_app().await;
    let drone_id = register_drone(&app).await;
    let mission = plan(&app, &drone_id).await;
    let id = mission["mission_id"].as_str().unwrap();
    assert_eq!(mission["status"], "planned");
    assert_eq!(mission["waypoints"][0]["action"], "takeoff");

    let res = app
        .clone()
        .oneshot(request("POST", &format!("/v1/missions/{}/start", id), "operator", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(read_json(res).await["status"], "in-progress");

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/v1/missions/{}/progress", id),
            "operator",
            Some(json!({
                "percent_complete": 55.0,
                "current_waypoint": 3,
                "telemetry": {"position": {"latitude": 0.0004, "longitude": 0.0002, "altitude": 40.0}, "battery_level": 72.0}
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["progress"]["percent_complete"], 55.0);
    assert_eq!(body["telemetry"].as_array().unwrap().len(), 1);

    let res = app
        .clone()
        .oneshot(request("POST", &format!("/v1/missions/{}/abort", id), "operator", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body = read_json(res).await;
    assert_eq!(body["status"], "aborted");
    assert_eq!(
        body["logs"].as_array().unwrap().last().unwrap()["message"],
        "Mission aborted by operator: No reason provided"
    );

    let res = app
        .clone()
        .oneshot(request("POST", &format!("/v1/missions/{}/complete", id), "operator", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(read_json(res).await["kind"], "invalid_state_transition");

    let res = app
        .oneshot(request("GET", "/v1/drones", "viewer", None))
        .await
        .unwrap();
    let drones = read_json(res).await;
    assert_eq!(drones[0]["status"], "available");
}

#[tokio::test]
async fn invalid_boundary_is_unprocessable() {
    let app = memory_app();
    let drone_id = register_drone(&app).await;
    let mut body = mission_body(&drone_id);
    body["boundary"] = json!({"coordinates": [[0.0, 0.0], [0.0, 1.0], [0.0, 0.0]]});

    let res = app
        .oneshot(request("POST", "/v1/missions", "operator", Some(body)))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(res).await["kind"], "invalid_boundary");
}

#[tokio::test]
async fn viewer_cannot_start() {
    let app = memory_app();
    let drone_id = register_drone(&app).await;
    let mission = plan(&app, &drone_id).await;
    let id = mission["mission_id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request("POST", &format!("/v1/missions/{}/start", id), "viewer", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = app
        .oneshot(request("GET", &format!("/v1/missions/{}", id), "viewer", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn other_organizations_see_not_found() {
    let app = memory_app();
    let drone_id = register_drone(&app).await;
    let mission = plan(&app, &drone_id).await;
    let id = mission["mission_id"].as_str().unwrap();

    let req = Request::builder()
        .method("GET")
        .uri(format!("/v1/missions/{}", id))
        .header("X-Organization-Id", "org-2")
        .header("X-User-Id", "intruder")
        .header("X-User-Role", "admin")
        .body(Body::empty())
        .unwrap();
    let res = app.oneshot(req).await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn preview_and_summary() {
    let app = memory_app();
    let res = app
        .clone()
        .oneshot(request(
            "POST",
            "/v1/missions/preview",
            "viewer",
            Some(json!({
                "pattern_type": "perimeter",
                "parameters": {"altitude_m": 40.0, "speed_mps": 5.0},
                "boundary": {"coordinates": [[0.0, 0.0], [0.0, 0.001], [0.001, 0.001], [0.001, 0.0], [0.0, 0.0]]}
            })),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let preview = read_json(res).await;
    assert_eq!(preview["waypoints"].as_array().unwrap().len(), 8);
    assert_eq!(preview["summary"]["waypoint_count"], 8);

    let drone_id = register_drone(&app).await;
    let mission = plan(&app, &drone_id).await;
    let id = mission["mission_id"].as_str().unwrap();
    let res = app
        .oneshot(request("GET", &format!("/v1/missions/{}/summary", id), "viewer", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        read_json(res).await["waypoint_count"].as_u64().unwrap() as usize,
        mission["waypoints"].as_array().unwrap().len()
    );
}

#[tokio::test]
async fn update_and_delete_plan() {
    let app = memory_app();
    let drone_id = register_drone(&app).await;
    let mission = plan(&app, &drone_id).await;
    let id = mission["mission_id"].as_str().unwrap();

    let res = app
        .clone()
        .oneshot(request(
            "PATCH",
            &format!("/v1/missions/{}", id),
            "operator",
            Some(json!({"name": "Vineyard north"})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated = read_json(res).await;
    assert_eq!(updated["name"], "Vineyard north");
    assert_eq!(updated["waypoints"], mission["waypoints"]);

    let res = app
        .clone()
        .oneshot(request("DELETE", &format!("/v1/missions/{}", id), "operator", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = app
        .oneshot(request("GET", &format!("/v1/missions/{}", id), "operator", None))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn progress_validation_errors_are_unprocessable() {
    let app = memory_app();
    let drone_id = register_drone(&app).await;
    let mission = plan(&app, &drone_id).await;
    let id = mission["mission_id"].as_str().unwrap();
    app.clone()
        .oneshot(request("POST", &format!("/v1/missions/{}/start", id), "operator", None))
        .await
        .unwrap();

    let res = app
        .oneshot(request(
            "PATCH",
            &format!("/v1/missions/{}/progress", id),
            "operator",
            Some(json!({"percent_complete": 150.0})),
        ))
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(read_json(res).await["kind"], "invalid_progress");
}
