//! Spatial math for survey planning: bounding boxes and distances.

use serde::{Deserialize, Serialize};

use crate::models::{Waypoint, WaypointAction};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lng_span(&self) -> f64 {
        self.max_lng - self.min_lng
    }
}

/// Bounding box over `[longitude, latitude]` pairs.
///
/// Returns `None` for an empty slice.
pub fn bounding_box(coordinates: &[[f64; 2]]) -> Option<BoundingBox> {
    let (first, rest) = coordinates.split_first()?;
    let mut bbox = BoundingBox {
        min_lat: first[1],
        max_lat: first[1],
        min_lng: first[0],
        max_lng: first[0],
    };
    for [lng, lat] in rest {
        bbox.min_lat = bbox.min_lat.min(*lat);
        bbox.max_lat = bbox.max_lat.max(*lat);
        bbox.min_lng = bbox.min_lng.min(*lng);
        bbox.max_lng = bbox.max_lng.max(*lng);
    }
    Some(bbox)
}

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Total horizontal length of a flight path in meters.
pub fn path_length_m(waypoints: &[Waypoint]) -> f64 {
    waypoints
        .windows(2)
        .map(|pair| {
            haversine_distance(
                pair[0].latitude,
                pair[0].longitude,
                pair[1].latitude,
                pair[1].longitude,
            )
        })
        .sum()
}

/// Estimated flight time in seconds at a constant ground speed.
///
/// Hover times are added on top of the travel time.
pub fn estimate_duration_s(waypoints: &[Waypoint], speed_mps: f64) -> f64 {
    if speed_mps <= 0.0 || !speed_mps.is_finite() {
        return 0.0;
    }
    let hover: f64 = waypoints.iter().filter_map(|wp| wp.hover_time_s).sum();
    path_length_m(waypoints) / speed_mps + hover
}

/// Headline numbers for a generated flight path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub waypoint_count: usize,
    pub capture_count: usize,
    pub total_distance_m: f64,
    pub estimated_duration_s: f64,
    pub bounding_box: Option<BoundingBox>,
}

/// Summarize a flight path flown at `speed_mps`.
pub fn summarize(waypoints: &[Waypoint], speed_mps: f64) -> PlanSummary {
    let points: Vec<[f64; 2]> = waypoints.iter().map(|wp| [wp.longitude, wp.latitude]).collect();
    PlanSummary {
        waypoint_count: waypoints.len(),
        capture_count: waypoints
            .iter()
            .filter(|wp| wp.action == WaypointAction::Capture)
            .count(),
        total_distance_m: path_length_m(waypoints),
        estimated_duration_s: estimate_duration_s(waypoints, speed_mps),
        bounding_box: bounding_box(&points),
    }
}
