use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use survey_core::error::ErrorKind;
use survey_core::models::{
    Boundary, Caller, Drone, DroneStatus, DroneStatusChange, FlightParameters, Mission,
    MissionDraft, MissionStatus, PatternType, PlanUpdate, Position, ProgressUpdate,
    RegisterDroneRequest, Role, TelemetryReport,
};
use survey_core::{mission_topic, LifecycleRules, MissionEvent};
use survey_server::notify::{EventBus, Notifier, NotifyError};
use survey_server::orchestrator::MissionOrchestrator;
use survey_server::persistence::{init_database, MemoryStore, MissionStore, SqliteStore};

// ========== TEST DOUBLES ==========

/// Memory store whose commits and loads can be made to fail or stall.
#[derive(Clone, Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_commits: Arc<AtomicBool>,
    stall_loads: Arc<AtomicBool>,
    commits: Arc<AtomicUsize>,
}

impl MissionStore for FlakyStore {
    async fn insert_mission(&self, mission: &Mission) -> Result<()> {
        self.inner.insert_mission(mission).await
    }

    async fn load_mission(&self, organization_id: &str, mission_id: &str) -> Result<Option<Mission>> {
        if self.stall_loads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        self.inner.load_mission(organization_id, mission_id).await
    }

    async fn list_missions(
        &self,
        organization_id: &str,
        status: Option<MissionStatus>,
    ) -> Result<Vec<Mission>> {
        self.inner.list_missions(organization_id, status).await
    }

    async fn commit(&self, mission: &Mission, drone_change: Option<&DroneStatusChange>) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(anyhow!("disk I/O error"));
        }
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.inner.commit(mission, drone_change).await
    }

    async fn delete_mission(&self, organization_id: &str, mission_id: &str) -> Result<bool> {
        self.inner.delete_mission(organization_id, mission_id).await
    }

    async fn upsert_drone(&self, drone: &Drone) -> Result<()> {
        self.inner.upsert_drone(drone).await
    }

    async fn load_drone(&self, organization_id: &str, drone_id: &str) -> Result<Option<Drone>> {
        self.inner.load_drone(organization_id, drone_id).await
    }

    async fn list_drones(&self, organization_id: &str) -> Result<Vec<Drone>> {
        self.inner.list_drones(organization_id).await
    }
}

/// Notifier that rejects every event while `down` is set.
#[derive(Default)]
struct FlakyNotifier {
    bus: EventBus,
    down: AtomicBool,
}

impl Notifier for FlakyNotifier {
    fn publish(&self, topic: &str, event: &MissionEvent) -> Result<(), NotifyError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(NotifyError::Rejected {
                topic: topic.to_string(),
                reason: "broker unreachable".into(),
            });
        }
        self.bus.publish(topic, event)
    }
}

// ========== FIXTURES ==========

struct Harness {
    orchestrator: Arc<MissionOrchestrator<FlakyStore>>,
    store: FlakyStore,
    notifier: Arc<FlakyNotifier>,
    drone_id: String,
}

fn operator() -> Caller {
    Caller::new("org-1", "pilot-1", Role::Operator)
}

fn draft(drone_id: &str) -> MissionDraft {
    MissionDraft {
        name: "Quarry".into(),
        description: Some("weekly stockpile survey".into()),
        drone_id: drone_id.into(),
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

async fn harness_with(rules: LifecycleRules, timeout: Duration) -> Harness {
    let store = FlakyStore::default();
    let notifier = Arc::new(FlakyNotifier::default());
    let orchestrator = Arc::new(MissionOrchestrator::new(
        store.clone(),
        notifier.clone(),
        rules,
        timeout,
    ));
    let drone = orchestrator
        .register_drone(
            &Caller::new("org-1", "admin-1", Role::Admin),
            RegisterDroneRequest {
                name: "Surveyor".into(),
                serial_number: "SV-100".into(),
                model: "Hexa".into(),
            },
        )
        .await
        .unwrap();
    Harness {
        orchestrator,
        store,
        notifier,
        drone_id: drone.drone_id,
    }
}

async fn harness() -> Harness {
    harness_with(LifecycleRules::default(), Duration::from_secs(5)).await
}

impl Harness {
    async fn planned(&self) -> Mission {
        self.orchestrator
            .plan_mission(&operator(), draft(&self.drone_id))
            .await
            .unwrap()
    }

    async fn in_progress(&self) -> Mission {
        let mission = self.planned().await;
        self.orchestrator
            .start(&operator(), &mission.mission_id)
            .await
            .unwrap()
    }

    async fn drone_status(&self) -> DroneStatus {
        self.store
            .load_drone("org-1", &self.drone_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }
}

// ========== TESTS ==========

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn abort_and_complete_race_has_one_winner() {
    for _ in 0..20 {
        let h = harness().await;
        let mission = h.in_progress().await;
        let id = mission.mission_id.clone();

        let abort = {
            let orch = h.orchestrator.clone();
            let id = id.clone();
            tokio::spawn(async move { orch.abort(&operator(), &id, Some("wind".into())).await })
        };
        let complete = {
            let orch = h.orchestrator.clone();
            let id = id.clone();
            tokio::spawn(async move { orch.complete(&operator(), &id).await })
        };
        let abort = abort.await.unwrap();
        let complete = complete.await.unwrap();

        assert!(abort.is_ok() != complete.is_ok(), "exactly one terminal transition wins");
        let stored = h.orchestrator.get_mission(&operator(), &id).await.unwrap();
        if abort.is_ok() {
            assert_eq!(stored.status, MissionStatus::Aborted);
            assert_eq!(complete.unwrap_err().kind(), ErrorKind::InvalidStateTransition);
        } else {
            assert_eq!(stored.status, MissionStatus::Completed);
            assert_eq!(abort.unwrap_err().kind(), ErrorKind::InvalidStateTransition);
        }
        assert_eq!(h.drone_status().await, DroneStatus::Available);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_progress_reports_are_all_applied() {
    let h = harness().await;
    let mission = h.in_progress().await;
    let id = mission.mission_id.clone();

    let mut tasks = Vec::new();
    for i in 0..25u32 {
        let orch = h.orchestrator.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move {
            orch.ingest_progress(
                &operator(),
                &id,
                ProgressUpdate {
                    current_waypoint: Some(i),
                    telemetry: Some(TelemetryReport {
                        position: Position {
                            latitude: 0.0001 * f64::from(i % 10),
                            longitude: 0.0005,
                            altitude: 40.0,
                        },
                        battery_level: Some(90.0),
                        speed: Some(5.0),
                        heading: None,
                    }),
                    ..Default::default()
                },
            )
            .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let stored = h.orchestrator.get_mission(&operator(), &id).await.unwrap();
    assert_eq!(stored.telemetry.len(), 25);
}

#[tokio::test]
async fn failed_publication_restores_mission_and_drone() {
    let h = harness().await;
    let mission = h.planned().await;
    h.notifier.down.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .start(&operator(), &mission.mission_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyFailure);

    let stored = h
        .orchestrator
        .get_mission(&operator(), &mission.mission_id)
        .await
        .unwrap();
    assert_eq!(stored, mission);
    assert_eq!(h.drone_status().await, DroneStatus::Available);

    h.notifier.down.store(false, Ordering::SeqCst);
    let started = h
        .orchestrator
        .start(&operator(), &mission.mission_id)
        .await
        .unwrap();
    assert_eq!(started.status, MissionStatus::InProgress);
}

#[tokio::test]
async fn failed_commit_publishes_nothing() {
    let h = harness().await;
    let mission = h.in_progress().await;
    let mut rx = h.notifier.bus.subscribe(&mission_topic(&mission.mission_id)).unwrap();
    h.store.fail_commits.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .abort(&operator(), &mission.mission_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyFailure);
    assert!(rx.try_recv().is_err());

    let stored = h
        .orchestrator
        .get_mission(&operator(), &mission.mission_id)
        .await
        .unwrap();
    assert_eq!(stored.status, MissionStatus::InProgress);
    assert_eq!(h.drone_status().await, DroneStatus::InMission);
}

#[tokio::test(start_paused = true)]
async fn stalled_store_times_out() {
    let h = harness_with(LifecycleRules::default(), Duration::from_millis(200)).await;
    let mission = h.planned().await;
    h.store.stall_loads.store(true, Ordering::SeqCst);

    let err = h
        .orchestrator
        .start(&operator(), &mission.mission_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyFailure);
    assert_eq!(h.store.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn rejected_transition_has_no_side_effects() {
    let h = harness().await;
    let mission = h.planned().await;

    let err = h
        .orchestrator
        .pause(&operator(), &mission.mission_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
    assert_eq!(h.store.commits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn viewers_cannot_mutate() {
    let h = harness().await;
    let mission = h.planned().await;
    let viewer = Caller::new("org-1", "auditor", Role::Viewer);

    let err = h
        .orchestrator
        .start(&viewer, &mission.mission_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h
        .orchestrator
        .plan_mission(&viewer, draft(&h.drone_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    assert!(h.orchestrator.get_mission(&viewer, &mission.mission_id).await.is_ok());
}

#[tokio::test]
async fn foreign_missions_are_not_found() {
    let h = harness().await;
    let mission = h.planned().await;
    let outsider = Caller::new("org-2", "pilot-9", Role::Admin);

    for result in [
        h.orchestrator.start(&outsider, &mission.mission_id).await.map(|_| ()),
        h.orchestrator.get_mission(&outsider, &mission.mission_id).await.map(|_| ()),
        h.orchestrator.delete_plan(&outsider, &mission.mission_id).await,
    ] {
        assert_eq!(result.unwrap_err().kind(), ErrorKind::NotFound);
    }

    let err = h
        .orchestrator
        .plan_mission(&outsider, draft(&h.drone_id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn name_only_update_keeps_flight_path() {
    let h = harness().await;
    let mission = h.planned().await;

    let updated = h
        .orchestrator
        .update_plan(
            &operator(),
            &mission.mission_id,
            PlanUpdate {
                name: Some("Quarry west".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Quarry west");
    assert_eq!(updated.waypoints, mission.waypoints);

    h.orchestrator
        .start(&operator(), &mission.mission_id)
        .await
        .unwrap();
    let err = h
        .orchestrator
        .update_plan(&operator(), &mission.mission_id, PlanUpdate::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn sqlite_store_keeps_generated_path_exact() {
    let db = init_database(":memory:", 1).await.unwrap();
    let orchestrator = MissionOrchestrator::new(
        SqliteStore::new(db),
        Arc::new(EventBus::default()),
        LifecycleRules::default(),
        Duration::from_secs(5),
    );
    let drone = orchestrator
        .register_drone(
            &operator(),
            RegisterDroneRequest {
                name: "Mapper".into(),
                serial_number: "SN-SQL".into(),
                model: "Quad".into(),
            },
        )
        .await
        .unwrap();
    let planned = orchestrator
        .plan_mission(&operator(), draft(&drone.drone_id))
        .await
        .unwrap();

    let stored = orchestrator
        .get_mission(&operator(), &planned.mission_id)
        .await
        .unwrap();
    assert_eq!(stored.waypoints, planned.waypoints);
    assert_eq!(stored.boundary, planned.boundary);

    let updated = orchestrator
        .update_plan(
            &operator(),
            &planned.mission_id,
            PlanUpdate {
                name: Some("Quarry north".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.waypoints, planned.waypoints);

    let reloaded = orchestrator
        .get_mission(&operator(), &planned.mission_id)
        .await
        .unwrap();
    assert_eq!(reloaded.name, "Quarry north");
    assert_eq!(reloaded.waypoints, planned.waypoints);
}

#[tokio::test]
async fn strict_resume_rejects_planned_missions() {
    let h = harness_with(
        LifecycleRules {
            strict_resume: true,
            strict_complete: false,
        },
        Duration::from_secs(5),
    )
    .await;
    let mission = h.planned().await;

    let err = h
        .orchestrator
        .resume(&operator(), &mission.mission_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);
}

#[tokio::test]
async fn completing_twice_is_rejected() {
    let h = harness().await;
    let mission = h.in_progress().await;
    let mut rx = h.notifier.bus.subscribe(&mission_topic(&mission.mission_id)).unwrap();

    h.orchestrator
        .complete(&operator(), &mission.mission_id)
        .await
        .unwrap();
    let err = h
        .orchestrator
        .complete(&operator(), &mission.mission_id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidStateTransition);

    assert_eq!(rx.recv().await.unwrap().name(), "mission-completed");
    assert!(rx.try_recv().is_err());
}
