//! Drone persistence operations.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool};
use survey_core::models::{Drone, DroneStatus, DroneStatusChange};

/// Upsert a drone into the database.
pub async fn upsert_drone(pool: &SqlitePool, drone: &Drone) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO drones (drone_id, organization_id, name, serial_number, model, status, battery_level, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(drone_id) DO UPDATE SET
            name = ?3, serial_number = ?4, model = ?5,
            status = ?6, battery_level = ?7, updated_at = ?8
        WHERE organization_id = ?2
        "#,
    )
    .bind(&drone.drone_id)
    .bind(&drone.organization_id)
    .bind(&drone.name)
    .bind(&drone.serial_number)
    .bind(&drone.model)
    .bind(drone.status.as_str())
    .bind(drone.battery_level)
    .bind(drone.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Change a drone's status within an existing transaction.
pub async fn set_drone_status_tx(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    change: &DroneStatusChange,
    updated_at: DateTime<Utc>,
) -> Result<()> {
    let result = sqlx::query("UPDATE drones SET status = ?2, updated_at = ?3 WHERE drone_id = ?1")
        .bind(&change.drone_id)
        .bind(change.status.as_str())
        .bind(updated_at.to_rfc3339())
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("drone {} no longer exists", change.drone_id));
    }
    Ok(())
}

/// Load a single drone owned by `organization_id`.
pub async fn load_drone(pool: &SqlitePool, organization_id: &str, drone_id: &str) -> Result<Option<Drone>> {
    let row = sqlx::query_as::<_, DroneRow>(
        "SELECT drone_id, organization_id, name, serial_number, model, status, battery_level, updated_at FROM drones WHERE drone_id = ?1 AND organization_id = ?2",
    )
    .bind(drone_id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => Ok(Some(r.try_into()?)),
        None => Ok(None),
    }
}

/// Load all drones of an organization.
pub async fn list_drones(pool: &SqlitePool, organization_id: &str) -> Result<Vec<Drone>> {
    let rows = sqlx::query_as::<_, DroneRow>(
        "SELECT drone_id, organization_id, name, serial_number, model, status, battery_level, updated_at FROM drones WHERE organization_id = ?1 ORDER BY name",
    )
    .bind(organization_id)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(|r| r.try_into()).collect()
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct DroneRow {
    drone_id: String,
    organization_id: String,
    name: String,
    serial_number: String,
    model: String,
    status: String,
    battery_level: f64,
    updated_at: String,
}

impl TryFrom<DroneRow> for Drone {
    type Error = anyhow::Error;

    fn try_from(row: DroneRow) -> Result<Self> {
        let status = DroneStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("unknown drone status {:?} for {}", row.status, row.drone_id))?;

        let updated_at = DateTime::parse_from_rfc3339(&row.updated_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Ok(Drone {
            drone_id: row.drone_id,
            organization_id: row.organization_id,
            name: row.name,
            serial_number: row.serial_number,
            model: row.model,
            status,
            battery_level: row.battery_level,
            updated_at,
        })
    }
}
