pub mod error;
pub mod events;
pub mod lifecycle;
pub mod models;
pub mod path_generator;
pub mod rules;
pub mod spatial;

pub use error::{EntityKind, ErrorKind, MissionError, MissionOperation, PlanError};
pub use events::{mission_topic, MissionEvent, MissionEventKind};
pub use lifecycle::{apply, apply_update, ensure_deletable, plan_mission, MissionCommand, Transition};
pub use models::{
    Boundary, Caller, Drone, DroneStatus, DroneStatusChange, FlightParameters, LogLevel, Mission,
    MissionDraft, MissionLogEntry, MissionProgress, MissionStatus, MissionType, PatternType,
    PlanUpdate, Position, ProgressUpdate, RegisterDroneRequest, Role, TelemetryReport,
    TelemetrySample, Waypoint, WaypointAction,
};
pub use path_generator::{generate, plan_waypoints, validate_custom_path, MAX_GENERATED_WAYPOINTS};
pub use rules::LifecycleRules;
pub use spatial::{haversine_distance, summarize, PlanSummary};
