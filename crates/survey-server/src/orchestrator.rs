//! Mission orchestrator: the composition root for every mission operation.
//!
//! Each mutating operation on a mission runs under that mission's lock, from
//! load through validation, commit and publication. The lock is a FIFO tokio
//! mutex, so a burst of progress reports cannot starve a control command and
//! operations on the same mission apply in arrival order. Different missions
//! never contend.
//!
//! Store calls are bounded by the configured timeout. The mission row and the
//! drone status change commit in one store transaction; if the event cannot be
//! published afterwards, a compensating commit restores both and the caller
//! gets `DependencyFailure`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use survey_core::error::{EntityKind, MissionError, MissionOperation, PlanError};
use survey_core::lifecycle::{self, MissionCommand};
use survey_core::models::{
    Boundary, Caller, Drone, DroneStatus, DroneStatusChange, FlightParameters, Mission,
    MissionDraft, MissionStatus, PatternType, PlanUpdate, ProgressUpdate, RegisterDroneRequest,
    Waypoint,
};
use survey_core::path_generator::plan_waypoints;
use survey_core::rules::LifecycleRules;
use survey_core::spatial::{summarize, PlanSummary};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::notify::Notifier;
use crate::persistence::MissionStore;

/// Flight path generated without creating a mission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanPreview {
    pub waypoints: Vec<Waypoint>,
    pub summary: PlanSummary,
}

pub struct MissionOrchestrator<S> {
    store: S,
    notifier: Arc<dyn Notifier>,
    rules: LifecycleRules,
    io_timeout: Duration,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl<S: MissionStore> MissionOrchestrator<S> {
    pub fn new(
        store: S,
        notifier: Arc<dyn Notifier>,
        rules: LifecycleRules,
        io_timeout: Duration,
    ) -> Self {
        Self {
            store,
            notifier,
            rules,
            io_timeout,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn rules(&self) -> LifecycleRules {
        self.rules
    }

    /// Number of missions with an operation in flight or queued.
    pub fn tracked_locks(&self) -> usize {
        self.locks.len()
    }

    // ========== PLANNING ==========

    pub async fn plan_mission(&self, caller: &Caller, draft: MissionDraft) -> Result<Mission, MissionError> {
        let op = MissionOperation::Plan;
        let mission_id = Uuid::new_v4().to_string();

        self.load_owned_drone(caller, op, &draft.drone_id).await?;
        authorize(caller, op, &mission_id)?;

        let mission = lifecycle::plan_mission(draft, mission_id.clone(), caller, Utc::now()).map_err(|e| {
            warn!("Rejected plan for drone in org {}: {}", caller.organization_id, e);
            e
        })?;
        self.io(op, &mission_id, self.store.insert_mission(&mission)).await?;

        info!(
            "Mission {} planned by {} ({:?}, {} waypoints)",
            mission.mission_id,
            caller.user_id,
            mission.pattern_type,
            mission.waypoints.len()
        );
        Ok(mission)
    }

    pub async fn update_plan(
        &self,
        caller: &Caller,
        mission_id: &str,
        update: PlanUpdate,
    ) -> Result<Mission, MissionError> {
        let op = MissionOperation::UpdatePlan;
        let _guard = self.lock(mission_id).await;

        let mission = self.load_owned_mission(caller, op, mission_id).await?;
        self.load_owned_drone(caller, op, &mission.drone_id).await?;
        authorize(caller, op, mission_id)?;

        let updated = lifecycle::apply_update(&mission, update, Utc::now()).map_err(|e| {
            warn!("Rejected plan update for mission {}: {}", mission_id, e);
            e
        })?;
        self.io(op, mission_id, self.store.commit(&updated, None)).await?;

        info!("Mission {} plan updated by {}", mission_id, caller.user_id);
        Ok(updated)
    }

    pub async fn delete_plan(&self, caller: &Caller, mission_id: &str) -> Result<(), MissionError> {
        let op = MissionOperation::Delete;
        let _guard = self.lock(mission_id).await;

        let mission = self.load_owned_mission(caller, op, mission_id).await?;
        authorize(caller, op, mission_id)?;
        lifecycle::ensure_deletable(&mission)?;

        let deleted = self
            .io(op, mission_id, self.store.delete_mission(&caller.organization_id, mission_id))
            .await?;
        if !deleted {
            return Err(MissionError::not_found(op, EntityKind::Mission, mission_id));
        }
        info!("Mission {} deleted by {}", mission_id, caller.user_id);
        Ok(())
    }

    /// Generate a flight path without persisting anything.
    pub fn preview_plan(
        &self,
        boundary: &Boundary,
        pattern_type: PatternType,
        parameters: &FlightParameters,
        waypoints: Option<&[Waypoint]>,
    ) -> Result<PlanPreview, MissionError> {
        let waypoints = plan_waypoints(boundary, pattern_type, parameters, waypoints)
            .map_err(|e: PlanError| MissionError::plan(MissionOperation::Plan, "preview", e))?;
        let summary = summarize(&waypoints, parameters.speed_mps);
        Ok(PlanPreview { waypoints, summary })
    }

    // ========== LIFECYCLE ==========

    pub async fn start(&self, caller: &Caller, mission_id: &str) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Start).await
    }

    pub async fn pause(&self, caller: &Caller, mission_id: &str) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Pause).await
    }

    pub async fn resume(&self, caller: &Caller, mission_id: &str) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Resume).await
    }

    pub async fn abort(
        &self,
        caller: &Caller,
        mission_id: &str,
        reason: Option<String>,
    ) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Abort { reason }).await
    }

    pub async fn complete(&self, caller: &Caller, mission_id: &str) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Complete).await
    }

    pub async fn fail(
        &self,
        caller: &Caller,
        mission_id: &str,
        reason: String,
    ) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Fail { reason }).await
    }

    pub async fn ingest_progress(
        &self,
        caller: &Caller,
        mission_id: &str,
        update: ProgressUpdate,
    ) -> Result<Mission, MissionError> {
        self.transition(caller, mission_id, MissionCommand::Progress(update)).await
    }

    async fn transition(
        &self,
        caller: &Caller,
        mission_id: &str,
        command: MissionCommand,
    ) -> Result<Mission, MissionError> {
        let op = command.operation();
        let _guard = self.lock(mission_id).await;

        let mission = self.load_owned_mission(caller, op, mission_id).await?;
        let drone = self.load_owned_drone(caller, op, &mission.drone_id).await?;
        authorize(caller, op, mission_id)?;

        let transition = lifecycle::apply(&mission, command, Utc::now(), &self.rules).map_err(|e| {
            warn!("Rejected {} for mission {}: {}", op, mission_id, e);
            e
        })?;

        self.io(
            op,
            mission_id,
            self.store.commit(&transition.mission, transition.drone_change.as_ref()),
        )
        .await?;

        let topic = transition.event.topic();
        if let Err(err) = self.notifier.publish(&topic, &transition.event) {
            warn!(
                "Publishing {} for mission {} failed: {}; restoring previous state",
                transition.event.name(),
                mission_id,
                err
            );
            self.compensate(op, &mission, &drone, transition.drone_change.as_ref()).await;
            return Err(MissionError::dependency(op, &topic, err));
        }

        match op {
            MissionOperation::IngestProgress => debug!(
                "Mission {} progress {:.1}% (waypoint {})",
                mission_id,
                transition.mission.progress.percent_complete,
                transition.mission.progress.current_waypoint
            ),
            _ => info!(
                "Mission {} {}: {} -> {} by {}",
                mission_id,
                op,
                mission.status,
                transition.mission.status,
                caller.user_id
            ),
        }
        Ok(transition.mission)
    }

    /// Put back the mission snapshot and drone status from before a transition.
    async fn compensate(
        &self,
        op: MissionOperation,
        previous: &Mission,
        drone: &Drone,
        applied: Option<&DroneStatusChange>,
    ) {
        let restore = applied.map(|change| DroneStatusChange {
            drone_id: change.drone_id.clone(),
            status: drone.status,
        });
        if let Err(e) = self
            .io(op, &previous.mission_id, self.store.commit(previous, restore.as_ref()))
            .await
        {
            error!(
                "Compensation for mission {} failed, stored state may be ahead of subscribers: {}",
                previous.mission_id, e
            );
        }
    }

    // ========== QUERIES ==========

    pub async fn get_mission(&self, caller: &Caller, mission_id: &str) -> Result<Mission, MissionError> {
        self.load_owned_mission(caller, MissionOperation::Read, mission_id).await
    }

    pub async fn list_missions(
        &self,
        caller: &Caller,
        status: Option<MissionStatus>,
    ) -> Result<Vec<Mission>, MissionError> {
        self.io(
            MissionOperation::Read,
            &caller.organization_id,
            self.store.list_missions(&caller.organization_id, status),
        )
        .await
    }

    pub async fn plan_summary(&self, caller: &Caller, mission_id: &str) -> Result<PlanSummary, MissionError> {
        let mission = self.get_mission(caller, mission_id).await?;
        Ok(summarize(&mission.waypoints, mission.parameters.speed_mps))
    }

    // ========== DRONES ==========

    pub async fn register_drone(
        &self,
        caller: &Caller,
        request: RegisterDroneRequest,
    ) -> Result<Drone, MissionError> {
        let op = MissionOperation::RegisterDrone;
        let drone_id = Uuid::new_v4().to_string();
        authorize(caller, op, &drone_id)?;

        if request.name.trim().is_empty() || request.serial_number.trim().is_empty() {
            return Err(MissionError::plan(
                op,
                &drone_id,
                PlanError::InvalidParameters("drone name and serial number are required".into()),
            ));
        }

        let drone = Drone {
            drone_id: drone_id.clone(),
            organization_id: caller.organization_id.clone(),
            name: request.name,
            serial_number: request.serial_number,
            model: request.model,
            status: DroneStatus::Available,
            battery_level: 100.0,
            updated_at: Utc::now(),
        };
        self.io(op, &drone_id, self.store.upsert_drone(&drone)).await?;

        info!("Drone {} registered in org {}", drone_id, caller.organization_id);
        Ok(drone)
    }

    pub async fn list_drones(&self, caller: &Caller) -> Result<Vec<Drone>, MissionError> {
        self.io(
            MissionOperation::Read,
            &caller.organization_id,
            self.store.list_drones(&caller.organization_id),
        )
        .await
    }

    // ========== HELPERS ==========

    /// Acquire the mission's lock, creating the entry on first use.
    async fn lock(&self, mission_id: &str) -> MissionGuard<'_> {
        let lock = self
            .locks
            .entry(mission_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        MissionGuard {
            locks: &self.locks,
            mission_id: mission_id.to_string(),
            guard: Some(lock.lock_owned().await),
        }
    }

    async fn load_owned_mission(
        &self,
        caller: &Caller,
        op: MissionOperation,
        mission_id: &str,
    ) -> Result<Mission, MissionError> {
        self.io(
            op,
            mission_id,
            self.store.load_mission(&caller.organization_id, mission_id),
        )
        .await?
        .ok_or_else(|| MissionError::not_found(op, EntityKind::Mission, mission_id))
    }

    async fn load_owned_drone(
        &self,
        caller: &Caller,
        op: MissionOperation,
        drone_id: &str,
    ) -> Result<Drone, MissionError> {
        self.io(op, drone_id, self.store.load_drone(&caller.organization_id, drone_id))
            .await?
            .ok_or_else(|| MissionError::not_found(op, EntityKind::Drone, drone_id))
    }

    /// Run a store call under the I/O timeout, mapping failures to `DependencyFailure`.
    async fn io<T>(
        &self,
        op: MissionOperation,
        target: &str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, MissionError> {
        match tokio::time::timeout(self.io_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!("Store call for {} ({}) failed: {:#}", target, op, e);
                Err(MissionError::dependency(op, target, format!("{:#}", e)))
            }
            Err(_) => {
                error!("Store call for {} ({}) timed out after {:?}", target, op, self.io_timeout);
                Err(MissionError::dependency(
                    op,
                    target,
                    format!("store did not respond within {:?}", self.io_timeout),
                ))
            }
        }
    }
}

/// Held for the duration of one mission operation.
///
/// On drop the registry entry is removed unless another task still holds a
/// handle to the same lock, so the registry only tracks missions with
/// operations in flight.
struct MissionGuard<'a> {
    locks: &'a DashMap<String, Arc<Mutex<()>>>,
    mission_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for MissionGuard<'_> {
    fn drop(&mut self) {
        // Release first so the guard's handle no longer counts.
        self.guard.take();
        self.locks
            .remove_if(&self.mission_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn authorize(caller: &Caller, op: MissionOperation, target: &str) -> Result<(), MissionError> {
    if caller.role.can_mutate() {
        Ok(())
    } else {
        Err(MissionError::PermissionDenied {
            operation: op,
            role: caller.role,
            target: target.to_string(),
        })
    }
}
