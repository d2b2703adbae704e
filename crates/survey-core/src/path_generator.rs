//! Survey path generation.
//!
//! Turns a boundary polygon, a coverage pattern and flight parameters into an
//! ordered flight path. Generation is pure and deterministic: the same inputs
//! always produce the same waypoints.
//!
//! Row and column spacing use a fixed angular step of `BASE_STEP_DEG` scaled by
//! the overlap factor, identical on both axes. The step is not corrected for
//! latitude and ignores the camera footprint; plans depend on this exact
//! spacing, so it is kept as is.

use crate::error::PlanError;
use crate::models::{Boundary, FlightParameters, PatternType, Waypoint, WaypointAction};
use crate::spatial::{bounding_box, BoundingBox};

/// Roughly 10 m of ground distance at the equator.
pub const BASE_STEP_DEG: f64 = 0.0001;

/// Upper bound on the size of a generated plan.
pub const MAX_GENERATED_WAYPOINTS: usize = 200_000;

/// Absorbs floating-point error so that a sweep reaching the far edge exactly
/// still emits the edge point.
const SWEEP_TOLERANCE_DEG: f64 = 1e-12;

/// Angular spacing between adjacent rows/columns for an overlap percentage.
pub fn step_deg(overlap_percent: f64) -> f64 {
    BASE_STEP_DEG * (100.0 - overlap_percent) / 100.0
}

/// Generate the flight path for `pattern` over `boundary`.
///
/// Every generated path starts with one `takeoff` at the bounding box minimum
/// corner and ends with one `land` at the same horizontal position, altitude 0.
pub fn generate(
    boundary: &Boundary,
    pattern: PatternType,
    parameters: &FlightParameters,
) -> Result<Vec<Waypoint>, PlanError> {
    validate_parameters(parameters)?;
    validate_boundary(boundary)?;

    let bbox = bounding_box(&boundary.coordinates)
        .ok_or_else(|| PlanError::InvalidBoundary("boundary has no coordinates".into()))?;
    let step = step_deg(parameters.overlap_percent);

    let mut seq = Sequencer::new(parameters.altitude_m);
    let mut path = vec![seq.next(bbox.min_lat, bbox.min_lng, WaypointAction::Takeoff)?];

    match pattern {
        PatternType::Grid => {
            sweep_rows(&mut seq, &bbox, step, step, &mut path)?;
        }
        PatternType::Crosshatch => {
            // Both sweeps are numbered before they are merged; the final sort
            // on `order` restores emission sequence.
            let mut horizontal = Vec::new();
            sweep_rows(&mut seq, &bbox, step * 2.0, step, &mut horizontal)?;
            let mut vertical = Vec::new();
            sweep_columns(&mut seq, &bbox, step * 2.0, step, &mut vertical)?;

            path.extend(horizontal);
            path.extend(vertical);
        }
        PatternType::Perimeter => {
            for [lng, lat] in &boundary.coordinates {
                path.push(seq.next(*lat, *lng, WaypointAction::Capture)?);
            }
            let [first_lng, first_lat] = boundary.coordinates[0];
            path.push(seq.next(first_lat, first_lng, WaypointAction::Capture)?);
        }
        PatternType::Custom => {
            // No bespoke geometry: trace the bounding box corners.
            for (lat, lng) in [
                (bbox.min_lat, bbox.max_lng),
                (bbox.max_lat, bbox.max_lng),
                (bbox.max_lat, bbox.min_lng),
            ] {
                path.push(seq.next(lat, lng, WaypointAction::Capture)?);
            }
        }
    }

    let mut land = seq.next(bbox.min_lat, bbox.min_lng, WaypointAction::Land)?;
    land.altitude = 0.0;
    path.push(land);

    path.sort_by_key(|wp| wp.order);
    Ok(path)
}

/// Resolve the waypoints of a plan.
///
/// An explicit path is only accepted for the custom pattern; it is validated
/// and used verbatim. Otherwise the path is generated.
pub fn plan_waypoints(
    boundary: &Boundary,
    pattern: PatternType,
    parameters: &FlightParameters,
    explicit: Option<&[Waypoint]>,
) -> Result<Vec<Waypoint>, PlanError> {
    match explicit {
        Some(waypoints) => {
            if pattern != PatternType::Custom {
                return Err(PlanError::InvalidParameters(
                    "explicit waypoints are only accepted for the custom pattern".into(),
                ));
            }
            validate_parameters(parameters)?;
            validate_boundary(boundary)?;
            validate_custom_path(waypoints)?;
            Ok(waypoints.to_vec())
        }
        None => generate(boundary, pattern, parameters),
    }
}

pub fn validate_boundary(boundary: &Boundary) -> Result<(), PlanError> {
    let points = &boundary.coordinates;
    if points.len() < 4 {
        return Err(PlanError::InvalidBoundary(format!(
            "boundary needs at least 4 points (3 vertices plus closing point), got {}",
            points.len()
        )));
    }
    for (index, [lng, lat]) in points.iter().enumerate() {
        if !valid_coordinate(*lat, *lng) {
            return Err(PlanError::InvalidBoundary(format!(
                "point {} ({}, {}) is outside the valid coordinate range",
                index, lng, lat
            )));
        }
    }
    if !boundary.is_closed() {
        return Err(PlanError::InvalidBoundary(
            "boundary must be closed (first point must equal last)".into(),
        ));
    }
    let distinct = boundary.distinct_vertices();
    if distinct < 3 {
        return Err(PlanError::InvalidBoundary(format!(
            "boundary needs at least 3 distinct vertices, got {}",
            distinct
        )));
    }
    Ok(())
}

pub fn validate_parameters(parameters: &FlightParameters) -> Result<(), PlanError> {
    if !(parameters.altitude_m.is_finite() && parameters.altitude_m > 0.0) {
        return Err(PlanError::InvalidParameters(format!(
            "altitude must be positive, got {}",
            parameters.altitude_m
        )));
    }
    if !(parameters.speed_mps.is_finite() && parameters.speed_mps > 0.0) {
        return Err(PlanError::InvalidParameters(format!(
            "speed must be positive, got {}",
            parameters.speed_mps
        )));
    }
    if !(0.0..100.0).contains(&parameters.overlap_percent) {
        return Err(PlanError::InvalidParameters(format!(
            "overlap must be within [0, 100), got {}",
            parameters.overlap_percent
        )));
    }
    if let Some(settings) = &parameters.sensor_settings {
        if !(settings.capture_interval_s.is_finite() && settings.capture_interval_s > 0.0) {
            return Err(PlanError::InvalidParameters(format!(
                "capture interval must be positive, got {}",
                settings.capture_interval_s
            )));
        }
    }
    Ok(())
}

/// Check a user-supplied flight path.
///
/// The path must be non-empty with strictly increasing (hence unique) orders.
/// It does not have to start with takeoff or end with land.
pub fn validate_custom_path(waypoints: &[Waypoint]) -> Result<(), PlanError> {
    if waypoints.is_empty() {
        return Err(PlanError::InvalidParameters(
            "custom flight path must contain at least one waypoint".into(),
        ));
    }
    for pair in waypoints.windows(2) {
        if pair[1].order <= pair[0].order {
            return Err(PlanError::InvalidParameters(format!(
                "waypoint orders must be unique and increasing ({} follows {})",
                pair[1].order, pair[0].order
            )));
        }
    }
    for wp in waypoints {
        if !valid_coordinate(wp.latitude, wp.longitude) {
            return Err(PlanError::InvalidParameters(format!(
                "waypoint {} is outside the valid coordinate range",
                wp.order
            )));
        }
        if !(wp.altitude.is_finite() && wp.altitude >= 0.0) {
            return Err(PlanError::InvalidParameters(format!(
                "waypoint {} has invalid altitude {}",
                wp.order, wp.altitude
            )));
        }
        if let Some(hover) = wp.hover_time_s {
            if !(hover.is_finite() && hover >= 0.0) {
                return Err(PlanError::InvalidParameters(format!(
                    "waypoint {} has invalid hover time {}",
                    wp.order, hover
                )));
            }
        }
    }
    Ok(())
}

fn valid_coordinate(lat: f64, lng: f64) -> bool {
    lat.is_finite() && lng.is_finite() && (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}

/// Hands out dense, zero-based orders and enforces the plan size cap.
struct Sequencer {
    next_order: u32,
    altitude_m: f64,
}

impl Sequencer {
    fn new(altitude_m: f64) -> Self {
        Self {
            next_order: 0,
            altitude_m,
        }
    }

    fn next(&mut self, lat: f64, lng: f64, action: WaypointAction) -> Result<Waypoint, PlanError> {
        if self.next_order as usize >= MAX_GENERATED_WAYPOINTS {
            return Err(too_many_waypoints());
        }
        let wp = Waypoint::new(self.next_order, lat, lng, self.altitude_m, action);
        self.next_order += 1;
        Ok(wp)
    }
}

fn too_many_waypoints() -> PlanError {
    PlanError::InvalidParameters(format!(
        "plan would exceed {} waypoints; raise the overlap step or shrink the boundary",
        MAX_GENERATED_WAYPOINTS
    ))
}

/// Samples from `from` towards `to` (either direction) every `step` degrees,
/// never passing `to`.
fn axis_samples(from: f64, to: f64, step: f64) -> Result<Vec<f64>, PlanError> {
    let span = (to - from).abs();
    let expected = span / step + 1.0;
    if !expected.is_finite() || expected > MAX_GENERATED_WAYPOINTS as f64 {
        return Err(too_many_waypoints());
    }

    let direction = if to >= from { 1.0 } else { -1.0 };
    let mut samples = Vec::with_capacity(expected as usize + 1);
    let mut i = 0u32;
    loop {
        let offset = f64::from(i) * step;
        if offset > span + SWEEP_TOLERANCE_DEG {
            break;
        }
        samples.push(from + direction * offset);
        i += 1;
    }
    Ok(samples)
}

/// Boustrophedon sweep along latitude rows.
///
/// Rows run from the minimum to the maximum latitude every `row_spacing`;
/// even rows fly east from the minimum longitude, odd rows fly west from the
/// maximum longitude, with a capture every `point_spacing`.
fn sweep_rows(
    seq: &mut Sequencer,
    bbox: &BoundingBox,
    row_spacing: f64,
    point_spacing: f64,
    out: &mut Vec<Waypoint>,
) -> Result<(), PlanError> {
    let eastward = axis_samples(bbox.min_lng, bbox.max_lng, point_spacing)?;
    let westward = axis_samples(bbox.max_lng, bbox.min_lng, point_spacing)?;

    for (row, lat) in axis_samples(bbox.min_lat, bbox.max_lat, row_spacing)?
        .into_iter()
        .enumerate()
    {
        let lngs = if row % 2 == 0 { &eastward } else { &westward };
        for lng in lngs {
            out.push(seq.next(lat, *lng, WaypointAction::Capture)?);
        }
    }
    Ok(())
}

/// Boustrophedon sweep along longitude columns, alternating north and south.
fn sweep_columns(
    seq: &mut Sequencer,
    bbox: &BoundingBox,
    column_spacing: f64,
    point_spacing: f64,
    out: &mut Vec<Waypoint>,
) -> Result<(), PlanError> {
    let northward = axis_samples(bbox.min_lat, bbox.max_lat, point_spacing)?;
    let southward = axis_samples(bbox.max_lat, bbox.min_lat, point_spacing)?;

    for (column, lng) in axis_samples(bbox.min_lng, bbox.max_lng, column_spacing)?
        .into_iter()
        .enumerate()
    {
        let lats = if column % 2 == 0 { &northward } else { &southward };
        for lat in lats {
            out.push(seq.next(*lat, lng, WaypointAction::Capture)?);
        }
    }
    Ok(())
}
