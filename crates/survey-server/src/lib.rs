//! Shared library surface for the survey server and its tests.

pub mod api;
pub mod backoff;
pub mod config;
pub mod notify;
pub mod orchestrator;
pub mod persistence;
pub mod state;
