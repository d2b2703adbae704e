//! API routes for the survey server.

pub mod drones;
pub mod error;
pub mod missions;
mod routes;
pub mod ws;

use axum::Router;
use std::sync::Arc;

pub use error::ApiError;

pub fn routes() -> Router<Arc<crate::state::AppState>> {
    routes::create_router()
}

#[cfg(test)]
mod tests;
