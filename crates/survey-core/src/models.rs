//! Core data models for survey missions.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default overlap between adjacent capture rows, in percent.
pub const DEFAULT_OVERLAP_PERCENT: f64 = 30.0;
/// Default interval between sensor captures, in seconds.
pub const DEFAULT_CAPTURE_INTERVAL_S: f64 = 2.0;

// ========== PLAN INPUTS ==========

/// Closed survey polygon.
///
/// Vertices are `[longitude, latitude]` pairs (GeoJSON order). The ring is
/// closed: the first point is repeated as the last one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub coordinates: Vec<[f64; 2]>,
}

impl Boundary {
    pub fn new(coordinates: Vec<[f64; 2]>) -> Self {
        Self { coordinates }
    }

    /// Build a closed ring from open vertices, appending the first vertex.
    pub fn closed(mut vertices: Vec<[f64; 2]>) -> Self {
        if let Some(first) = vertices.first().copied() {
            if vertices.last() != Some(&first) || vertices.len() == 1 {
                vertices.push(first);
            }
        }
        Self {
            coordinates: vertices,
        }
    }

    /// Number of distinct vertices (the closing point is not counted twice).
    pub fn distinct_vertices(&self) -> usize {
        self.coordinates
            .iter()
            .map(|[lng, lat]| (coordinate_key(*lng), coordinate_key(*lat)))
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn is_closed(&self) -> bool {
        match (self.coordinates.first(), self.coordinates.last()) {
            (Some(first), Some(last)) => self.coordinates.len() > 1 && first == last,
            _ => false,
        }
    }
}

/// Hashable form of a coordinate; `-0.0` and `0.0` compare equal, as with `==`.
fn coordinate_key(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else {
        value.to_bits()
    }
}

/// Sensors a survey drone can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    Rgb,
    Thermal,
    Lidar,
    Multispectral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSettings {
    #[serde(default = "default_capture_interval")]
    pub capture_interval_s: f64,
    #[serde(default)]
    pub active_sensors: Vec<Sensor>,
}

fn default_capture_interval() -> f64 {
    DEFAULT_CAPTURE_INTERVAL_S
}

fn default_overlap() -> f64 {
    DEFAULT_OVERLAP_PERCENT
}

/// Flight parameters shared by every waypoint of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlightParameters {
    pub altitude_m: f64,
    pub speed_mps: f64,
    /// Overlap between adjacent rows, 0 <= overlap < 100
    #[serde(default = "default_overlap")]
    pub overlap_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_settings: Option<SensorSettings>,
}

impl FlightParameters {
    pub fn new(altitude_m: f64, speed_mps: f64) -> Self {
        Self {
            altitude_m,
            speed_mps,
            overlap_percent: DEFAULT_OVERLAP_PERCENT,
            sensor_settings: None,
        }
    }

    pub fn with_overlap(mut self, overlap_percent: f64) -> Self {
        self.overlap_percent = overlap_percent;
        self
    }
}

/// Coverage pattern used to lay out waypoints over the boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
    #[default]
    Grid,
    Crosshatch,
    Perimeter,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointAction {
    Takeoff,
    Capture,
    Hover,
    Turn,
    Land,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub order: u32,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub action: WaypointAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hover_time_s: Option<f64>,
}

impl Waypoint {
    pub fn new(order: u32, latitude: f64, longitude: f64, altitude: f64, action: WaypointAction) -> Self {
        Self {
            order,
            latitude,
            longitude,
            altitude,
            action,
            hover_time_s: None,
        }
    }
}

// ========== MISSION ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissionStatus {
    #[default]
    Planned,
    InProgress,
    Completed,
    Aborted,
    Failed,
}

impl MissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planned => "planned",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        }
    }

    /// No lifecycle transition leaves a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(Self::Planned),
            "in-progress" => Some(Self::InProgress),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for MissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissionType {
    Inspection,
    #[default]
    Mapping,
    Security,
    Custom,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionLocation {
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurrenceFrequency {
    Daily,
    Weekly,
    Monthly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    /// 0 = Sunday
    #[serde(default)]
    pub days_of_week: Vec<u8>,
    #[serde(default)]
    pub end_date: Option<DateTime<Utc>>,
}

fn default_interval() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence: Option<Recurrence>,
}

/// Execution progress of a mission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MissionProgress {
    pub percent_complete: f64,
    pub current_waypoint: u32,
    pub estimated_time_remaining_s: f64,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

/// Telemetry as reported by the drone or its ground station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub position: Position,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
}

/// Telemetry sample stored in the mission history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    #[serde(default)]
    pub battery_level: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
    #[serde(default)]
    pub heading: Option<f64>,
}

impl TelemetrySample {
    pub fn from_report(report: &TelemetryReport, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            position: report.position,
            battery_level: report.battery_level,
            speed: report.speed,
            heading: report.heading,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionLogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}

/// A survey mission and its full execution record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub mission_id: String,
    pub organization_id: String,
    pub drone_id: String,
    pub created_by: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mission_type: MissionType,
    #[serde(default)]
    pub location: Option<MissionLocation>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    pub boundary: Boundary,
    pub pattern_type: PatternType,
    pub parameters: FlightParameters,
    pub waypoints: Vec<Waypoint>,
    pub status: MissionStatus,
    pub progress: MissionProgress,
    #[serde(default)]
    pub telemetry: Vec<TelemetrySample>,
    #[serde(default)]
    pub logs: Vec<MissionLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Mission {
    pub fn push_log(&mut self, level: LogLevel, message: impl Into<String>, timestamp: DateTime<Utc>) {
        self.logs.push(MissionLogEntry {
            timestamp,
            level,
            message: message.into(),
        });
    }
}

/// Request to plan a new mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissionDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub drone_id: String,
    #[serde(default)]
    pub mission_type: MissionType,
    #[serde(default)]
    pub pattern_type: PatternType,
    pub parameters: FlightParameters,
    pub boundary: Boundary,
    #[serde(default)]
    pub location: Option<MissionLocation>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Explicit flight path, only accepted for the custom pattern.
    #[serde(default)]
    pub waypoints: Option<Vec<Waypoint>>,
}

/// Partial update of a planned mission. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub mission_type: Option<MissionType>,
    #[serde(default)]
    pub pattern_type: Option<PatternType>,
    #[serde(default)]
    pub parameters: Option<FlightParameters>,
    #[serde(default)]
    pub boundary: Option<Boundary>,
    #[serde(default)]
    pub location: Option<MissionLocation>,
    #[serde(default)]
    pub schedule: Option<Schedule>,
    #[serde(default)]
    pub waypoints: Option<Vec<Waypoint>>,
}

impl PlanUpdate {
    /// Whether the update touches the inputs the flight path is derived from.
    pub fn changes_geometry(&self) -> bool {
        self.boundary.is_some()
            || self.pattern_type.is_some()
            || self.parameters.is_some()
            || self.waypoints.is_some()
    }
}

/// Progress report folded into an in-progress mission.
///
/// Each field is applied only when present; a present zero is a real value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    #[serde(default)]
    pub percent_complete: Option<f64>,
    #[serde(default)]
    pub current_waypoint: Option<u32>,
    #[serde(default)]
    pub estimated_time_remaining_s: Option<f64>,
    #[serde(default)]
    pub telemetry: Option<TelemetryReport>,
}

// ========== DRONES ==========

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DroneStatus {
    #[default]
    Available,
    InMission,
    Maintenance,
    Offline,
}

impl DroneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::InMission => "in-mission",
            Self::Maintenance => "maintenance",
            Self::Offline => "offline",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "available" => Some(Self::Available),
            "in-mission" => Some(Self::InMission),
            "maintenance" => Some(Self::Maintenance),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }
}

/// A drone registered to an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drone {
    pub drone_id: String,
    pub organization_id: String,
    pub name: String,
    pub serial_number: String,
    pub model: String,
    pub status: DroneStatus,
    /// Battery percentage
    pub battery_level: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterDroneRequest {
    pub name: String,
    pub serial_number: String,
    pub model: String,
}

/// Drone status change that commits together with a mission transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroneStatusChange {
    pub drone_id: String,
    pub status: DroneStatus,
}

// ========== CALLERS ==========

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Operator,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Operator => "operator",
            Self::Viewer => "viewer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "operator" => Some(Self::Operator),
            "viewer" => Some(Self::Viewer),
            _ => None,
        }
    }

    pub fn can_mutate(&self) -> bool {
        !matches!(self, Self::Viewer)
    }
}

/// Already-authenticated identity of whoever issues an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub organization_id: String,
    pub user_id: String,
    pub role: Role,
}

impl Caller {
    pub fn new(organization_id: impl Into<String>, user_id: impl Into<String>, role: Role) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: user_id.into(),
            role,
        }
    }
}
