//! Mission store seam and its SQLite implementation.

use std::future::Future;

use anyhow::Result;
use survey_core::models::{Drone, DroneStatusChange, Mission, MissionStatus};

use super::db::Database;
use super::memory::MemoryStore;
use super::{drones, missions};

/// Durable storage for missions and drones.
///
/// Every lookup is scoped to an organization; rows of other organizations are
/// reported as absent.
pub trait MissionStore: Send + Sync {
    fn insert_mission(&self, mission: &Mission) -> impl Future<Output = Result<()>> + Send;

    fn load_mission(
        &self,
        organization_id: &str,
        mission_id: &str,
    ) -> impl Future<Output = Result<Option<Mission>>> + Send;

    fn list_missions(
        &self,
        organization_id: &str,
        status: Option<MissionStatus>,
    ) -> impl Future<Output = Result<Vec<Mission>>> + Send;

    /// Replace a mission and apply an optional drone status change atomically.
    fn commit(
        &self,
        mission: &Mission,
        drone_change: Option<&DroneStatusChange>,
    ) -> impl Future<Output = Result<()>> + Send;

    fn delete_mission(
        &self,
        organization_id: &str,
        mission_id: &str,
    ) -> impl Future<Output = Result<bool>> + Send;

    fn upsert_drone(&self, drone: &Drone) -> impl Future<Output = Result<()>> + Send;

    fn load_drone(
        &self,
        organization_id: &str,
        drone_id: &str,
    ) -> impl Future<Output = Result<Option<Drone>>> + Send;

    fn list_drones(&self, organization_id: &str) -> impl Future<Output = Result<Vec<Drone>>> + Send;
}

/// SQLite-backed store.
#[derive(Clone)]
pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl MissionStore for SqliteStore {
    async fn insert_mission(&self, mission: &Mission) -> Result<()> {
        missions::insert_mission(self.db.pool(), mission).await
    }

    async fn load_mission(&self, organization_id: &str, mission_id: &str) -> Result<Option<Mission>> {
        missions::load_mission(self.db.pool(), organization_id, mission_id).await
    }

    async fn list_missions(
        &self,
        organization_id: &str,
        status: Option<MissionStatus>,
    ) -> Result<Vec<Mission>> {
        missions::list_missions(self.db.pool(), organization_id, status).await
    }

    async fn commit(&self, mission: &Mission, drone_change: Option<&DroneStatusChange>) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        missions::replace_mission_tx(&mut tx, mission).await?;
        if let Some(change) = drone_change {
            drones::set_drone_status_tx(&mut tx, change, mission.updated_at).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn delete_mission(&self, organization_id: &str, mission_id: &str) -> Result<bool> {
        missions::delete_mission(self.db.pool(), organization_id, mission_id).await
    }

    async fn upsert_drone(&self, drone: &Drone) -> Result<()> {
        drones::upsert_drone(self.db.pool(), drone).await
    }

    async fn load_drone(&self, organization_id: &str, drone_id: &str) -> Result<Option<Drone>> {
        drones::load_drone(self.db.pool(), organization_id, drone_id).await
    }

    async fn list_drones(&self, organization_id: &str) -> Result<Vec<Drone>> {
        drones::list_drones(self.db.pool(), organization_id).await
    }
}

/// Store selected at startup.
#[derive(Clone)]
pub enum StoreBackend {
    Sqlite(SqliteStore),
    Memory(MemoryStore),
}

impl StoreBackend {
    /// Release backing resources at shutdown.
    pub async fn close(&self) {
        if let Self::Sqlite(store) = self {
            store.database().close().await;
        }
    }
}

impl MissionStore for StoreBackend {
    async fn insert_mission(&self, mission: &Mission) -> Result<()> {
        match self {
            Self::Sqlite(s) => s.insert_mission(mission).await,
            Self::Memory(s) => s.insert_mission(mission).await,
        }
    }

    async fn load_mission(&self, organization_id: &str, mission_id: &str) -> Result<Option<Mission>> {
        match self {
            Self::Sqlite(s) => s.load_mission(organization_id, mission_id).await,
            Self::Memory(s) => s.load_mission(organization_id, mission_id).await,
        }
    }

    async fn list_missions(
        &self,
        organization_id: &str,
        status: Option<MissionStatus>,
    ) -> Result<Vec<Mission>> {
        match self {
            Self::Sqlite(s) => s.list_missions(organization_id, status).await,
            Self::Memory(s) => s.list_missions(organization_id, status).await,
        }
    }

    async fn commit(&self, mission: &Mission, drone_change: Option<&DroneStatusChange>) -> Result<()> {
        match self {
            Self::Sqlite(s) => s.commit(mission, drone_change).await,
            Self::Memory(s) => s.commit(mission, drone_change).await,
        }
    }

    async fn delete_mission(&self, organization_id: &str, mission_id: &str) -> Result<bool> {
        match self {
            Self::Sqlite(s) => s.delete_mission(organization_id, mission_id).await,
            Self::Memory(s) => s.delete_mission(organization_id, mission_id).await,
        }
    }

    async fn upsert_drone(&self, drone: &Drone) -> Result<()> {
        match self {
            Self::Sqlite(s) => s.upsert_drone(drone).await,
            Self::Memory(s) => s.upsert_drone(drone).await,
        }
    }

    async fn load_drone(&self, organization_id: &str, drone_id: &str) -> Result<Option<Drone>> {
        match self {
            Self::Sqlite(s) => s.load_drone(organization_id, drone_id).await,
            Self::Memory(s) => s.load_drone(organization_id, drone_id).await,
        }
    }

    async fn list_drones(&self, organization_id: &str) -> Result<Vec<Drone>> {
        match self {
            Self::Sqlite(s) => s.list_drones(organization_id).await,
            Self::Memory(s) => s.list_drones(organization_id).await,
        }
    }
}
