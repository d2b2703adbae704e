//! Mission flight simulation.

pub mod paths;

pub use paths::{FlightPath, WaypointTrack};
