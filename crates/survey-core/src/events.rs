//! Mission notifications published after each committed transition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Mission, MissionProgress, MissionStatus, TelemetrySample};

/// Per-mission notification topic.
pub fn mission_topic(mission_id: &str) -> String {
    format!("missions/{}", mission_id)
}

/// One notification on a mission topic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionEvent {
    pub mission_id: String,
    pub organization_id: String,
    pub emitted_at: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: MissionEventKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum MissionEventKind {
    #[serde(rename = "mission-started")]
    Started {
        status: MissionStatus,
        started_at: DateTime<Utc>,
    },
    #[serde(rename = "mission-paused")]
    Paused { message: String },
    #[serde(rename = "mission-resumed")]
    Resumed { message: String },
    #[serde(rename = "mission-aborted")]
    Aborted { status: MissionStatus, reason: String },
    #[serde(rename = "mission-completed")]
    Completed {
        status: MissionStatus,
        completed_at: DateTime<Utc>,
    },
    #[serde(rename = "mission-failed")]
    Failed { status: MissionStatus, reason: String },
    #[serde(rename = "mission-progress")]
    Progress {
        progress: MissionProgress,
        #[serde(default)]
        telemetry: Option<TelemetrySample>,
    },
}

impl MissionEventKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => "mission-started",
            Self::Paused { .. } => "mission-paused",
            Self::Resumed { .. } => "mission-resumed",
            Self::Aborted { .. } => "mission-aborted",
            Self::Completed { .. } => "mission-completed",
            Self::Failed { .. } => "mission-failed",
            Self::Progress { .. } => "mission-progress",
        }
    }
}

impl MissionEvent {
    pub fn new(mission: &Mission, kind: MissionEventKind, emitted_at: DateTime<Utc>) -> Self {
        Self {
            mission_id: mission.mission_id.clone(),
            organization_id: mission.organization_id.clone(),
            emitted_at,
            kind,
        }
    }

    pub fn topic(&self) -> String {
        mission_topic(&self.mission_id)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
