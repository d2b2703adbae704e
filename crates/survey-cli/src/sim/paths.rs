//! Simulated flight along a planned survey path.

use survey_core::models::Waypoint;
use survey_core::spatial::haversine_distance;

/// Trait for flight path implementations.
pub trait FlightPath: Send + Sync {
    /// Get (lat, lon, altitude_m) at time t seconds from start.
    fn get_position(&self, t: f64) -> (f64, f64, f64);

    /// Get approximate heading at time t (degrees, 0 = North).
    fn get_heading(&self, t: f64) -> f64 {
        let dt = 0.1;
        let (lat1, lon1, _) = self.get_position(t);
        let (lat2, lon2, _) = self.get_position(t + dt);

        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;

        if dlat.abs() < 1e-10 && dlon.abs() < 1e-10 {
            return 0.0;
        }

        let heading_deg = dlon.atan2(dlat).to_degrees();
        if heading_deg < 0.0 {
            heading_deg + 360.0
        } else {
            heading_deg
        }
    }

    /// Get speed in meters per second.
    fn get_speed_mps(&self) -> f64;

    /// Total flight time in seconds.
    fn duration_s(&self) -> f64;
}

/// Constant-speed flight through a mission's waypoints in order.
///
/// Hover times are spent stationary at their waypoint.
pub struct WaypointTrack {
    waypoints: Vec<Waypoint>,
    /// Time at which each waypoint is reached (before hovering)
    arrivals: Vec<f64>,
    speed_mps: f64,
    duration: f64,
}

impl WaypointTrack {
    pub fn new(waypoints: Vec<Waypoint>, speed_mps: f64) -> Self {
        let speed_mps = if speed_mps.is_finite() && speed_mps > 0.0 {
            speed_mps
        } else {
            1.0
        };

        let mut arrivals = Vec::with_capacity(waypoints.len());
        let mut clock = 0.0;
        for (i, wp) in waypoints.iter().enumerate() {
            if i > 0 {
                let prev = &waypoints[i - 1];
                clock += prev.hover_time_s.unwrap_or(0.0);
                clock += haversine_distance(prev.latitude, prev.longitude, wp.latitude, wp.longitude)
                    / speed_mps;
            }
            arrivals.push(clock);
        }
        let duration = clock + waypoints.last().and_then(|wp| wp.hover_time_s).unwrap_or(0.0);

        Self {
            waypoints,
            arrivals,
            speed_mps,
            duration,
        }
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    /// Index of the last waypoint reached at time t.
    pub fn current_waypoint(&self, t: f64) -> usize {
        match self.arrivals.iter().rposition(|&arrival| arrival <= t) {
            Some(index) => index,
            None => 0,
        }
    }

    /// Percentage of flight time elapsed at t, clamped to [0, 100].
    pub fn percent_complete(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return 100.0;
        }
        (t / self.duration * 100.0).clamp(0.0, 100.0)
    }

    pub fn remaining_s(&self, t: f64) -> f64 {
        (self.duration - t).max(0.0)
    }
}

impl FlightPath for WaypointTrack {
    fn get_position(&self, t: f64) -> (f64, f64, f64) {
        let Some(last) = self.waypoints.last() else {
            return (0.0, 0.0, 0.0);
        };
        if t >= self.duration {
            return (last.latitude, last.longitude, last.altitude);
        }

        let index = self.current_waypoint(t.max(0.0));
        let from = &self.waypoints[index];
        let Some(to) = self.waypoints.get(index + 1) else {
            return (from.latitude, from.longitude, from.altitude);
        };

        let depart = self.arrivals[index] + from.hover_time_s.unwrap_or(0.0);
        let leg = self.arrivals[index + 1] - depart;
        if t <= depart || leg <= 0.0 {
            return (from.latitude, from.longitude, from.altitude);
        }

        let f = ((t - depart) / leg).clamp(0.0, 1.0);
        (
            from.latitude + (to.latitude - from.latitude) * f,
            from.longitude + (to.longitude - from.longitude) * f,
            from.altitude + (to.altitude - from.altitude) * f,
        )
    }

    fn get_speed_mps(&self) -> f64 {
        self.speed_mps
    }

    fn duration_s(&self) -> f64 {
        self.duration
    }
}
