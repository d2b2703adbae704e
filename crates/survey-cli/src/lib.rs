//! Survey CLI - Command line tools for the survey mission server.
//!
//! This crate provides:
//! - plan_survey: offline flight path preview
//! - fly_mission: simulated drone flying a mission against a running server

pub mod client;
pub mod sim;

pub use client::{Identity, SurveyClient};
