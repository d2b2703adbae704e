//! Mission state machine.
//!
//! Every function here is pure: it takes the current mission by reference and
//! returns the next value, the drone status change to commit with it, and the
//! event to publish once the commit succeeds. Nothing is mutated on rejection.

use chrono::{DateTime, Utc};

use crate::error::{MissionError, MissionOperation, PlanError};
use crate::events::{MissionEvent, MissionEventKind};
use crate::models::{
    Caller, DroneStatus, DroneStatusChange, LogLevel, Mission, MissionDraft, MissionProgress,
    MissionStatus, PlanUpdate, ProgressUpdate, TelemetryReport, TelemetrySample,
};
use crate::path_generator::plan_waypoints;
use crate::rules::LifecycleRules;
use crate::spatial::estimate_duration_s;

pub const DEFAULT_ABORT_REASON: &str = "No reason provided";

pub const PAUSE_MESSAGE: &str = "Mission paused by operator";
pub const RESUME_MESSAGE: &str = "Mission resumed by operator";
pub const COMPLETE_MESSAGE: &str = "Mission completed successfully";

/// Control and progress operations on an existing mission.
#[derive(Debug, Clone)]
pub enum MissionCommand {
    Start,
    Pause,
    Resume,
    Abort { reason: Option<String> },
    Complete,
    Fail { reason: String },
    Progress(ProgressUpdate),
}

impl MissionCommand {
    pub fn operation(&self) -> MissionOperation {
        match self {
            Self::Start => MissionOperation::Start,
            Self::Pause => MissionOperation::Pause,
            Self::Resume => MissionOperation::Resume,
            Self::Abort { .. } => MissionOperation::Abort,
            Self::Complete => MissionOperation::Complete,
            Self::Fail { .. } => MissionOperation::Fail,
            Self::Progress(_) => MissionOperation::IngestProgress,
        }
    }
}

/// Result of an accepted command.
#[derive(Debug, Clone)]
pub struct Transition {
    pub mission: Mission,
    pub drone_change: Option<DroneStatusChange>,
    pub event: MissionEvent,
}

/// Build a new `planned` mission from a draft.
pub fn plan_mission(
    draft: MissionDraft,
    mission_id: String,
    caller: &Caller,
    now: DateTime<Utc>,
) -> Result<Mission, MissionError> {
    let op = MissionOperation::Plan;
    if draft.name.trim().is_empty() {
        return Err(MissionError::plan(
            op,
            &mission_id,
            PlanError::InvalidParameters("mission name must not be empty".into()),
        ));
    }

    let waypoints = plan_waypoints(
        &draft.boundary,
        draft.pattern_type,
        &draft.parameters,
        draft.waypoints.as_deref(),
    )
    .map_err(|e| MissionError::plan(op, &mission_id, e))?;

    let progress = MissionProgress {
        estimated_time_remaining_s: estimate_duration_s(&waypoints, draft.parameters.speed_mps),
        ..MissionProgress::default()
    };

    Ok(Mission {
        mission_id,
        organization_id: caller.organization_id.clone(),
        drone_id: draft.drone_id,
        created_by: caller.user_id.clone(),
        name: draft.name,
        description: draft.description,
        mission_type: draft.mission_type,
        location: draft.location,
        schedule: draft.schedule,
        boundary: draft.boundary,
        pattern_type: draft.pattern_type,
        parameters: draft.parameters,
        waypoints,
        status: MissionStatus::Planned,
        progress,
        telemetry: Vec::new(),
        logs: Vec::new(),
        created_at: now,
        updated_at: now,
    })
}

/// Merge a plan update into a `planned` mission.
///
/// The flight path is regenerated when the update supplies a boundary, a
/// pattern, parameters or explicit waypoints; otherwise the existing path is
/// kept as is.
pub fn apply_update(
    mission: &Mission,
    update: PlanUpdate,
    now: DateTime<Utc>,
) -> Result<Mission, MissionError> {
    let op = MissionOperation::UpdatePlan;
    if mission.status != MissionStatus::Planned {
        return Err(MissionError::transition(op, &mission.mission_id, mission.status));
    }

    let regenerate = update.changes_geometry();
    let mut next = mission.clone();

    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(MissionError::plan(
                op,
                &mission.mission_id,
                PlanError::InvalidParameters("mission name must not be empty".into()),
            ));
        }
        next.name = name;
    }
    if let Some(description) = update.description {
        next.description = Some(description);
    }
    if let Some(mission_type) = update.mission_type {
        next.mission_type = mission_type;
    }
    if let Some(location) = update.location {
        next.location = Some(location);
    }
    if let Some(schedule) = update.schedule {
        next.schedule = Some(schedule);
    }
    if let Some(boundary) = update.boundary {
        next.boundary = boundary;
    }
    if let Some(pattern_type) = update.pattern_type {
        next.pattern_type = pattern_type;
    }
    if let Some(parameters) = update.parameters {
        next.parameters = parameters;
    }

    if regenerate {
        next.waypoints = plan_waypoints(
            &next.boundary,
            next.pattern_type,
            &next.parameters,
            update.waypoints.as_deref(),
        )
        .map_err(|e| MissionError::plan(op, &mission.mission_id, e))?;
        next.progress.estimated_time_remaining_s =
            estimate_duration_s(&next.waypoints, next.parameters.speed_mps);
    }

    next.updated_at = now;
    Ok(next)
}

/// Only planned missions may be deleted.
pub fn ensure_deletable(mission: &Mission) -> Result<(), MissionError> {
    if mission.status == MissionStatus::Planned {
        Ok(())
    } else {
        Err(MissionError::transition(
            MissionOperation::Delete,
            &mission.mission_id,
            mission.status,
        ))
    }
}

/// Apply a control or progress command.
pub fn apply(
    mission: &Mission,
    command: MissionCommand,
    now: DateTime<Utc>,
    rules: &LifecycleRules,
) -> Result<Transition, MissionError> {
    let op = command.operation();
    let status = mission.status;
    let reject = || MissionError::transition(op, &mission.mission_id, status);

    let mut next = mission.clone();
    next.updated_at = now;

    let (kind, drone_status) = match command {
        MissionCommand::Start => {
            if status != MissionStatus::Planned {
                return Err(reject());
            }
            next.status = MissionStatus::InProgress;
            next.progress.started_at = Some(now);
            (
                MissionEventKind::Started {
                    status: next.status,
                    started_at: now,
                },
                Some(DroneStatus::InMission),
            )
        }
        MissionCommand::Pause => {
            if status != MissionStatus::InProgress {
                return Err(reject());
            }
            next.push_log(LogLevel::Info, PAUSE_MESSAGE, now);
            (
                MissionEventKind::Paused {
                    message: PAUSE_MESSAGE.to_string(),
                },
                None,
            )
        }
        MissionCommand::Resume => {
            if rules.strict_resume && status != MissionStatus::InProgress {
                return Err(reject());
            }
            next.push_log(LogLevel::Info, RESUME_MESSAGE, now);
            (
                MissionEventKind::Resumed {
                    message: RESUME_MESSAGE.to_string(),
                },
                None,
            )
        }
        MissionCommand::Abort { reason } => {
            if status != MissionStatus::InProgress {
                return Err(reject());
            }
            let reason = reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_ABORT_REASON.to_string());
            next.status = MissionStatus::Aborted;
            next.push_log(
                LogLevel::Warning,
                format!("Mission aborted by operator: {}", reason),
                now,
            );
            (
                MissionEventKind::Aborted {
                    status: next.status,
                    reason,
                },
                Some(DroneStatus::Available),
            )
        }
        MissionCommand::Complete => {
            let allowed = match status {
                MissionStatus::InProgress => true,
                MissionStatus::Planned => !rules.strict_complete,
                _ => false,
            };
            if !allowed {
                return Err(reject());
            }
            next.status = MissionStatus::Completed;
            next.progress.percent_complete = 100.0;
            next.progress.estimated_time_remaining_s = 0.0;
            next.progress.completed_at = Some(now);
            next.push_log(LogLevel::Info, COMPLETE_MESSAGE, now);
            (
                MissionEventKind::Completed {
                    status: next.status,
                    completed_at: now,
                },
                Some(DroneStatus::Available),
            )
        }
        MissionCommand::Fail { reason } => {
            if status != MissionStatus::InProgress {
                return Err(reject());
            }
            let reason = if reason.trim().is_empty() {
                DEFAULT_ABORT_REASON.to_string()
            } else {
                reason.trim().to_string()
            };
            next.status = MissionStatus::Failed;
            next.progress.completed_at = Some(now);
            next.push_log(LogLevel::Error, format!("Mission failed: {}", reason), now);
            (
                MissionEventKind::Failed {
                    status: next.status,
                    reason,
                },
                Some(DroneStatus::Available),
            )
        }
        MissionCommand::Progress(update) => {
            if status != MissionStatus::InProgress {
                return Err(reject());
            }
            validate_progress(mission, &update)?;

            if let Some(percent) = update.percent_complete {
                next.progress.percent_complete = percent;
            }
            if let Some(waypoint) = update.current_waypoint {
                next.progress.current_waypoint = waypoint;
            }
            if let Some(eta) = update.estimated_time_remaining_s {
                next.progress.estimated_time_remaining_s = eta;
            }
            let sample = update
                .telemetry
                .as_ref()
                .map(|report| TelemetrySample::from_report(report, now));
            if let Some(sample) = &sample {
                next.telemetry.push(sample.clone());
            }
            (
                MissionEventKind::Progress {
                    progress: next.progress.clone(),
                    telemetry: sample,
                },
                None,
            )
        }
    };

    let drone_change = drone_status.map(|status| DroneStatusChange {
        drone_id: mission.drone_id.clone(),
        status,
    });
    let event = MissionEvent::new(&next, kind, now);
    Ok(Transition {
        mission: next,
        drone_change,
        event,
    })
}

fn validate_progress(mission: &Mission, update: &ProgressUpdate) -> Result<(), MissionError> {
    let invalid = |reason: String| MissionError::InvalidProgress {
        operation: MissionOperation::IngestProgress,
        mission_id: mission.mission_id.clone(),
        reason,
    };

    if let Some(percent) = update.percent_complete {
        if !(0.0..=100.0).contains(&percent) {
            return Err(invalid(format!("percent_complete {} is outside [0, 100]", percent)));
        }
    }
    if let Some(eta) = update.estimated_time_remaining_s {
        if !(eta.is_finite() && eta >= 0.0) {
            return Err(invalid(format!("estimated_time_remaining_s {} must be non-negative", eta)));
        }
    }
    if let Some(waypoint) = update.current_waypoint {
        if waypoint as usize >= mission.waypoints.len() {
            return Err(invalid(format!(
                "current_waypoint {} is beyond the {} planned waypoints",
                waypoint,
                mission.waypoints.len()
            )));
        }
    }
    if let Some(report) = &update.telemetry {
        validate_telemetry(report).map_err(invalid)?;
    }
    Ok(())
}

fn validate_telemetry(report: &TelemetryReport) -> Result<(), String> {
    let pos = &report.position;
    if !(pos.latitude.is_finite() && (-90.0..=90.0).contains(&pos.latitude)) {
        return Err(format!("telemetry latitude {} is out of range", pos.latitude));
    }
    if !(pos.longitude.is_finite() && (-180.0..=180.0).contains(&pos.longitude)) {
        return Err(format!("telemetry longitude {} is out of range", pos.longitude));
    }
    if !pos.altitude.is_finite() {
        return Err("telemetry altitude must be finite".into());
    }
    if let Some(battery) = report.battery_level {
        if !(0.0..=100.0).contains(&battery) {
            return Err(format!("battery level {} is outside [0, 100]", battery));
        }
    }
    if let Some(speed) = report.speed {
        if !(speed.is_finite() && speed >= 0.0) {
            return Err(format!("speed {} must be non-negative", speed));
        }
    }
    if let Some(heading) = report.heading {
        if !heading.is_finite() {
            return Err("heading must be finite".into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Boundary, FlightParameters, PatternType, Position, Role};

    fn caller() -> Caller {
        Caller::new("org-1", "user-1", Role::Operator)
    }

    fn draft() -> MissionDraft {
        MissionDraft {
            name: "North field".into(),
            description: None,
            drone_id: "drone-1".into(),
            mission_type: Default::default(),
            pattern_type: PatternType::Grid,
            parameters: FlightParameters::new(40.0, 5.0),
            boundary: Boundary::new(vec![
                [0.0, 0.0],
                [0.0, 0.001],
                [0.001, 0.001],
                [0.001, 0.0],
                [0.0, 0.0],
            ]),
            location: None,
            schedule: None,
            waypoints: None,
        }
    }

    fn planned() -> Mission {
        plan_mission(draft(), "m-1".into(), &caller(), Utc::now()).unwrap()
    }

    fn run(mission: &Mission, command: MissionCommand) -> Result<Transition, MissionError> {
        apply(mission, command, Utc::now(), &LifecycleRules::default())
    }

    fn in_progress() -> Mission {
        run(&planned(), MissionCommand::Start).unwrap().mission
    }

    #[test]
    fn new_missions_are_planned_and_empty() {
        let mission = planned();
        assert_eq!(mission.status, MissionStatus::Planned);
        assert_eq!(mission.organization_id, "org-1");
        assert_eq!(mission.created_by, "user-1");
        assert!(mission.telemetry.is_empty());
        assert!(mission.logs.is_empty());
        assert!(!mission.waypoints.is_empty());
        assert!(mission.progress.estimated_time_remaining_s > 0.0);
    }

    #[test]
    fn start_marks_mission_and_drone() {
        let transition = run(&planned(), MissionCommand::Start).unwrap();
        assert_eq!(transition.mission.status, MissionStatus::InProgress);
        assert!(transition.mission.progress.started_at.is_some());
        assert_eq!(
            transition.drone_change,
            Some(DroneStatusChange {
                drone_id: "drone-1".into(),
                status: DroneStatus::InMission,
            })
        );
        assert_eq!(transition.event.name(), "mission-started");
        assert!(transition.mission.logs.is_empty());
    }

    #[test]
    fn start_twice_is_rejected() {
        let err = run(&in_progress(), MissionCommand::Start).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }

    #[test]
    fn pause_logs_without_changing_status() {
        let transition = run(&in_progress(), MissionCommand::Pause).unwrap();
        assert_eq!(transition.mission.status, MissionStatus::InProgress);
        let log = transition.mission.logs.last().unwrap();
        assert_eq!(log.message, PAUSE_MESSAGE);
        assert_eq!(log.level, LogLevel::Info);
        assert!(transition.drone_change.is_none());

        assert!(run(&planned(), MissionCommand::Pause).is_err());
    }

    #[test]
    fn resume_is_permissive_unless_strict() {
        let transition = run(&planned(), MissionCommand::Resume).unwrap();
        assert_eq!(transition.mission.status, MissionStatus::Planned);
        assert_eq!(transition.mission.logs.last().unwrap().message, RESUME_MESSAGE);

        let strict = LifecycleRules {
            strict_resume: true,
            ..Default::default()
        };
        let err = apply(&planned(), MissionCommand::Resume, Utc::now(), &strict).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        assert!(apply(&in_progress(), MissionCommand::Resume, Utc::now(), &strict).is_ok());
    }

    #[test]
    fn abort_defaults_blank_reason() {
        for reason in [None, Some("   ".to_string())] {
            let transition = run(&in_progress(), MissionCommand::Abort { reason }).unwrap();
            assert_eq!(transition.mission.status, MissionStatus::Aborted);
            let log = transition.mission.logs.last().unwrap();
            assert_eq!(log.level, LogLevel::Warning);
            assert_eq!(log.message, "Mission aborted by operator: No reason provided");
            assert_eq!(transition.drone_change.unwrap().status, DroneStatus::Available);
        }

        let transition = run(
            &in_progress(),
            MissionCommand::Abort {
                reason: Some("gusts above limit".into()),
            },
        )
        .unwrap();
        assert_eq!(
            transition.event.kind,
            MissionEventKind::Aborted {
                status: MissionStatus::Aborted,
                reason: "gusts above limit".into(),
            }
        );
    }

    #[test]
    fn abort_requires_in_progress() {
        let err = run(&planned(), MissionCommand::Abort { reason: None }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }

    #[test]
    fn complete_fills_progress() {
        let transition = run(&in_progress(), MissionCommand::Complete).unwrap();
        let mission = transition.mission;
        assert_eq!(mission.status, MissionStatus::Completed);
        assert_eq!(mission.progress.percent_complete, 100.0);
        assert_eq!(mission.progress.estimated_time_remaining_s, 0.0);
        assert!(mission.progress.completed_at.is_some());
        assert_eq!(mission.logs.last().unwrap().message, COMPLETE_MESSAGE);
        assert_eq!(transition.drone_change.unwrap().status, DroneStatus::Available);
    }

    #[test]
    fn complete_from_planned_depends_on_rules() {
        assert!(run(&planned(), MissionCommand::Complete).is_ok());
        let strict = LifecycleRules::strict();
        assert!(apply(&planned(), MissionCommand::Complete, Utc::now(), &strict).is_err());
    }

    #[test]
    fn terminal_missions_cannot_complete() {
        let completed = run(&in_progress(), MissionCommand::Complete).unwrap().mission;
        let err = run(&completed, MissionCommand::Complete).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

        let aborted = run(&in_progress(), MissionCommand::Abort { reason: None })
            .unwrap()
            .mission;
        assert!(run(&aborted, MissionCommand::Complete).is_err());
        assert!(run(&aborted, MissionCommand::Start).is_err());
    }

    #[test]
    fn fail_records_error_log() {
        let transition = run(
            &in_progress(),
            MissionCommand::Fail {
                reason: "lost link".into(),
            },
        )
        .unwrap();
        assert_eq!(transition.mission.status, MissionStatus::Failed);
        assert!(transition.mission.progress.completed_at.is_some());
        let log = transition.mission.logs.last().unwrap();
        assert_eq!(log.level, LogLevel::Error);
        assert_eq!(log.message, "Mission failed: lost link");
    }

    #[test]
    fn progress_applies_explicit_zero() {
        let mission = in_progress();
        let first = run(
            &mission,
            MissionCommand::Progress(ProgressUpdate {
                percent_complete: Some(40.0),
                current_waypoint: Some(12),
                ..Default::default()
            }),
        )
        .unwrap()
        .mission;
        assert_eq!(first.progress.percent_complete, 40.0);

        let second = run(
            &first,
            MissionCommand::Progress(ProgressUpdate {
                percent_complete: Some(0.0),
                ..Default::default()
            }),
        )
        .unwrap()
        .mission;
        assert_eq!(second.progress.percent_complete, 0.0);
        assert_eq!(second.progress.current_waypoint, 12);
    }

    #[test]
    fn progress_appends_telemetry_sample() {
        let report = TelemetryReport {
            position: Position {
                latitude: 0.0005,
                longitude: 0.0005,
                altitude: 40.0,
            },
            battery_level: Some(81.0),
            speed: Some(5.0),
            heading: Some(90.0),
        };
        let now = Utc::now();
        let transition = apply(
            &in_progress(),
            MissionCommand::Progress(ProgressUpdate {
                telemetry: Some(report),
                ..Default::default()
            }),
            now,
            &LifecycleRules::default(),
        )
        .unwrap();
        assert_eq!(transition.mission.telemetry.len(), 1);
        assert_eq!(transition.mission.telemetry[0].timestamp, now);
        match transition.event.kind {
            MissionEventKind::Progress { telemetry, .. } => assert!(telemetry.is_some()),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn progress_rejects_out_of_range_values() {
        let mission = in_progress();
        let cases = [
            ProgressUpdate {
                percent_complete: Some(101.0),
                ..Default::default()
            },
            ProgressUpdate {
                estimated_time_remaining_s: Some(-1.0),
                ..Default::default()
            },
            ProgressUpdate {
                current_waypoint: Some(mission.waypoints.len() as u32),
                ..Default::default()
            },
        ];
        for update in cases {
            let err = run(&mission, MissionCommand::Progress(update)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidProgress);
        }
    }

    #[test]
    fn progress_requires_in_progress() {
        let err = run(&planned(), MissionCommand::Progress(ProgressUpdate::default())).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    }

    #[test]
    fn update_without_geometry_keeps_waypoints() {
        let mission = planned();
        let updated = apply_update(
            &mission,
            PlanUpdate {
                name: Some("Renamed".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.waypoints, mission.waypoints);
    }

    #[test]
    fn update_with_pattern_regenerates() {
        let mission = planned();
        let updated = apply_update(
            &mission,
            PlanUpdate {
                pattern_type: Some(PatternType::Perimeter),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(updated.pattern_type, PatternType::Perimeter);
        assert_eq!(updated.waypoints.len(), 8);
    }

    #[test]
    fn plan_is_frozen_after_start() {
        let err = apply_update(&in_progress(), PlanUpdate::default(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
        assert!(ensure_deletable(&in_progress()).is_err());
        assert!(ensure_deletable(&planned()).is_ok());
    }

    #[test]
    fn invalid_draft_is_rejected() {
        let mut bad = draft();
        bad.boundary = Boundary::new(vec![[0.0, 0.0], [0.0, 1.0], [0.0, 0.0]]);
        let err = plan_mission(bad, "m-2".into(), &caller(), Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidBoundary);
    }
}
