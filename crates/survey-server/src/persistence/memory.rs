//! In-memory mission store using DashMap.
//!
//! Used for tests and for `SURVEY_STORE=memory` deployments. Nothing survives a
//! restart.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use dashmap::DashMap;
use survey_core::models::{Drone, DroneStatusChange, Mission, MissionStatus};

use super::store::MissionStore;

#[derive(Clone, Default)]
pub struct MemoryStore {
    missions: Arc<DashMap<String, Mission>>,
    drones: Arc<DashMap<String, Drone>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MissionStore for MemoryStore {
    async fn insert_mission(&self, mission: &Mission) -> Result<()> {
        if self.missions.contains_key(&mission.mission_id) {
            return Err(anyhow!("mission {} already exists", mission.mission_id));
        }
        self.missions
            .insert(mission.mission_id.clone(), mission.clone());
        Ok(())
    }

    async fn load_mission(&self, organization_id: &str, mission_id: &str) -> Result<Option<Mission>> {
        Ok(self
            .missions
            .get(mission_id)
            .filter(|m| m.organization_id == organization_id)
            .map(|m| m.value().clone()))
    }

    async fn list_missions(
        &self,
        organization_id: &str,
        status: Option<MissionStatus>,
    ) -> Result<Vec<Mission>> {
        let mut missions: Vec<Mission> = self
            .missions
            .iter()
            .filter(|m| m.organization_id == organization_id)
            .filter(|m| status.map_or(true, |s| m.status == s))
            .map(|m| m.value().clone())
            .collect();
        missions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(missions)
    }

    async fn commit(&self, mission: &Mission, drone_change: Option<&DroneStatusChange>) -> Result<()> {
        // Validate both rows before touching either so a failure leaves no trace.
        match self.missions.get(&mission.mission_id) {
            Some(existing) if existing.organization_id == mission.organization_id => {}
            _ => return Err(anyhow!("mission {} no longer exists", mission.mission_id)),
        }
        if let Some(change) = drone_change {
            if !self.drones.contains_key(&change.drone_id) {
                return Err(anyhow!("drone {} no longer exists", change.drone_id));
            }
        }

        self.missions
            .insert(mission.mission_id.clone(), mission.clone());
        if let Some(change) = drone_change {
            if let Some(mut drone) = self.drones.get_mut(&change.drone_id) {
                drone.status = change.status;
                drone.updated_at = mission.updated_at;
            }
        }
        Ok(())
    }

    async fn delete_mission(&self, organization_id: &str, mission_id: &str) -> Result<bool> {
        Ok(self
            .missions
            .remove_if(mission_id, |_, m| m.organization_id == organization_id)
            .is_some())
    }

    async fn upsert_drone(&self, drone: &Drone) -> Result<()> {
        if let Some(existing) = self.drones.get(&drone.drone_id) {
            if existing.organization_id != drone.organization_id {
                return Err(anyhow!("drone {} belongs to another organization", drone.drone_id));
            }
        }
        self.drones.insert(drone.drone_id.clone(), drone.clone());
        Ok(())
    }

    async fn load_drone(&self, organization_id: &str, drone_id: &str) -> Result<Option<Drone>> {
        Ok(self
            .drones
            .get(drone_id)
            .filter(|d| d.organization_id == organization_id)
            .map(|d| d.value().clone()))
    }

    async fn list_drones(&self, organization_id: &str) -> Result<Vec<Drone>> {
        let mut drones: Vec<Drone> = self
            .drones
            .iter()
            .filter(|d| d.organization_id == organization_id)
            .map(|d| d.value().clone())
            .collect();
        drones.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(drones)
    }
}
