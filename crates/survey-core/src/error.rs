//! Error taxonomy for planning and mission lifecycle operations.

use serde::Serialize;
use thiserror::Error;

use crate::models::{MissionStatus, Role};

/// Malformed plan input. Never retried: the caller must fix the input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),
    #[error("invalid parameters: {0}")]
    InvalidParameters(String),
}

/// Operations exposed by the mission engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionOperation {
    Plan,
    UpdatePlan,
    Delete,
    Start,
    Pause,
    Resume,
    Abort,
    Complete,
    Fail,
    IngestProgress,
    Read,
    RegisterDrone,
}

impl MissionOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plan => "plan",
            Self::UpdatePlan => "update_plan",
            Self::Delete => "delete",
            Self::Start => "start",
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Abort => "abort",
            Self::Complete => "complete",
            Self::Fail => "fail",
            Self::IngestProgress => "ingest_progress",
            Self::Read => "read",
            Self::RegisterDrone => "register_drone",
        }
    }
}

impl std::fmt::Display for MissionOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Mission,
    Drone,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mission => f.write_str("mission"),
            Self::Drone => f.write_str("drone"),
        }
    }
}

/// Flat classification of [`MissionError`], used for transport mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidBoundary,
    InvalidParameters,
    InvalidProgress,
    InvalidStateTransition,
    NotFound,
    PermissionDenied,
    DependencyFailure,
}

/// Error returned by every mission operation.
///
/// Each variant names the operation attempted and the entity it targeted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MissionError {
    #[error("{operation} rejected for mission {mission_id}: {source}")]
    InvalidPlan {
        operation: MissionOperation,
        mission_id: String,
        #[source]
        source: PlanError,
    },

    #[error("{operation} rejected for mission {mission_id}: {reason}")]
    InvalidProgress {
        operation: MissionOperation,
        mission_id: String,
        reason: String,
    },

    #[error("cannot {operation} mission {mission_id} in {status} status")]
    InvalidStateTransition {
        operation: MissionOperation,
        mission_id: String,
        status: MissionStatus,
    },

    #[error("{entity} {id} not found ({operation})")]
    NotFound {
        operation: MissionOperation,
        entity: EntityKind,
        id: String,
    },

    #[error("role {} may not {operation} ({target})", .role.as_str())]
    PermissionDenied {
        operation: MissionOperation,
        role: Role,
        target: String,
    },

    #[error("{operation} failed for {target}: {reason}")]
    DependencyFailure {
        operation: MissionOperation,
        target: String,
        reason: String,
    },
}

impl MissionError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidPlan {
                source: PlanError::InvalidBoundary(_),
                ..
            } => ErrorKind::InvalidBoundary,
            Self::InvalidPlan {
                source: PlanError::InvalidParameters(_),
                ..
            } => ErrorKind::InvalidParameters,
            Self::InvalidProgress { .. } => ErrorKind::InvalidProgress,
            Self::InvalidStateTransition { .. } => ErrorKind::InvalidStateTransition,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::DependencyFailure { .. } => ErrorKind::DependencyFailure,
        }
    }

    pub fn operation(&self) -> MissionOperation {
        match self {
            Self::InvalidPlan { operation, .. }
            | Self::InvalidProgress { operation, .. }
            | Self::InvalidStateTransition { operation, .. }
            | Self::NotFound { operation, .. }
            | Self::PermissionDenied { operation, .. }
            | Self::DependencyFailure { operation, .. } => *operation,
        }
    }

    pub fn plan(operation: MissionOperation, mission_id: &str, source: PlanError) -> Self {
        Self::InvalidPlan {
            operation,
            mission_id: mission_id.to_string(),
            source,
        }
    }

    pub fn transition(operation: MissionOperation, mission_id: &str, status: MissionStatus) -> Self {
        Self::InvalidStateTransition {
            operation,
            mission_id: mission_id.to_string(),
            status,
        }
    }

    pub fn not_found(operation: MissionOperation, entity: EntityKind, id: &str) -> Self {
        Self::NotFound {
            operation,
            entity,
            id: id.to_string(),
        }
    }

    pub fn dependency(
        operation: MissionOperation,
        target: &str,
        reason: impl std::fmt::Display,
    ) -> Self {
        Self::DependencyFailure {
            operation,
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_error_names_operation_and_status() {
        let err = MissionError::transition(MissionOperation::Start, "m-1", MissionStatus::InProgress);
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        assert_eq!(err.operation(), MissionOperation::Start);
        assert_eq!(err.to_string(), "cannot start mission m-1 in in-progress status");
    }

    #[test]
    fn plan_error_kind_follows_source() {
        let err = MissionError::plan(
            MissionOperation::Plan,
            "m-2",
            PlanError::InvalidBoundary("too few vertices".into()),
        );
        assert_eq!(err.kind(), ErrorKind::InvalidBoundary);
    }
}
