//! Mission persistence operations.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{Sqlite, SqlitePool};
use survey_core::models::{Mission, MissionStatus};

const MISSION_COLUMNS: &str = "mission_id, organization_id, drone_id, created_by, name, description, \
     mission_type, pattern_type, status, location, schedule, boundary, parameters, waypoints, \
     progress, telemetry, logs, created_at, updated_at";

/// Serialized form of a mission, ready to bind.
struct MissionColumns {
    mission_type: String,
    pattern_type: String,
    location: Option<String>,
    schedule: Option<String>,
    boundary: String,
    parameters: String,
    waypoints: String,
    progress: String,
    telemetry: String,
    logs: String,
}

impl MissionColumns {
    fn encode(mission: &Mission) -> Result<Self> {
        Ok(Self {
            mission_type: enum_text(&mission.mission_type)?,
            pattern_type: enum_text(&mission.pattern_type)?,
            location: mission.location.as_ref().map(serde_json::to_string).transpose()?,
            schedule: mission.schedule.as_ref().map(serde_json::to_string).transpose()?,
            boundary: serde_json::to_string(&mission.boundary)?,
            parameters: serde_json::to_string(&mission.parameters)?,
            waypoints: serde_json::to_string(&mission.waypoints)?,
            progress: serde_json::to_string(&mission.progress)?,
            telemetry: serde_json::to_string(&mission.telemetry)?,
            logs: serde_json::to_string(&mission.logs)?,
        })
    }
}

/// Insert a new mission.
pub async fn insert_mission(pool: &SqlitePool, mission: &Mission) -> Result<()> {
    let cols = MissionColumns::encode(mission)?;

    sqlx::query(&format!(
        "INSERT INTO missions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)",
        MISSION_COLUMNS
    ))
    .bind(&mission.mission_id)
    .bind(&mission.organization_id)
    .bind(&mission.drone_id)
    .bind(&mission.created_by)
    .bind(&mission.name)
    .bind(&mission.description)
    .bind(&cols.mission_type)
    .bind(&cols.pattern_type)
    .bind(mission.status.as_str())
    .bind(&cols.location)
    .bind(&cols.schedule)
    .bind(&cols.boundary)
    .bind(&cols.parameters)
    .bind(&cols.waypoints)
    .bind(&cols.progress)
    .bind(&cols.telemetry)
    .bind(&cols.logs)
    .bind(mission.created_at.to_rfc3339())
    .bind(mission.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Overwrite an existing mission within a transaction.
///
/// Fails if the mission row no longer exists.
pub async fn replace_mission_tx(tx: &mut sqlx::Transaction<'_, Sqlite>, mission: &Mission) -> Result<()> {
    let cols = MissionColumns::encode(mission)?;

    let result = sqlx::query(
        r#"
        UPDATE missions SET
            drone_id = ?3, name = ?4, description = ?5,
            mission_type = ?6, pattern_type = ?7, status = ?8,
            location = ?9, schedule = ?10, boundary = ?11, parameters = ?12,
            waypoints = ?13, progress = ?14, telemetry = ?15, logs = ?16,
            updated_at = ?17
        WHERE mission_id = ?1 AND organization_id = ?2
        "#,
    )
    .bind(&mission.mission_id)
    .bind(&mission.organization_id)
    .bind(&mission.drone_id)
    .bind(&mission.name)
    .bind(&mission.description)
    .bind(&cols.mission_type)
    .bind(&cols.pattern_type)
    .bind(mission.status.as_str())
    .bind(&cols.location)
    .bind(&cols.schedule)
    .bind(&cols.boundary)
    .bind(&cols.parameters)
    .bind(&cols.waypoints)
    .bind(&cols.progress)
    .bind(&cols.telemetry)
    .bind(&cols.logs)
    .bind(mission.updated_at.to_rfc3339())
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(anyhow!("mission {} no longer exists", mission.mission_id));
    }
    Ok(())
}

/// Load a single mission owned by `organization_id`.
pub async fn load_mission(
    pool: &SqlitePool,
    organization_id: &str,
    mission_id: &str,
) -> Result<Option<Mission>> {
    let row = sqlx::query_as::<_, MissionRow>(&format!(
        "SELECT {} FROM missions WHERE mission_id = ?1 AND organization_id = ?2",
        MISSION_COLUMNS
    ))
    .bind(mission_id)
    .bind(organization_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(r) => Ok(Some(r.try_into()?)),
        None => Ok(None),
    }
}

/// Load missions of an organization, newest first.
pub async fn list_missions(
    pool: &SqlitePool,
    organization_id: &str,
    status: Option<MissionStatus>,
) -> Result<Vec<Mission>> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as::<_, MissionRow>(&format!(
                "SELECT {} FROM missions WHERE organization_id = ?1 AND status = ?2 ORDER BY created_at DESC",
                MISSION_COLUMNS
            ))
            .bind(organization_id)
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, MissionRow>(&format!(
                "SELECT {} FROM missions WHERE organization_id = ?1 ORDER BY created_at DESC",
                MISSION_COLUMNS
            ))
            .bind(organization_id)
            .fetch_all(pool)
            .await?
        }
    };

    rows.into_iter().map(|r| r.try_into()).collect()
}

/// Delete a mission by ID.
pub async fn delete_mission(pool: &SqlitePool, organization_id: &str, mission_id: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM missions WHERE mission_id = ?1 AND organization_id = ?2")
        .bind(mission_id)
        .bind(organization_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        Value::String(s) => Ok(s),
        other => Err(anyhow!("expected a string enum, got {}", other)),
    }
}

fn parse_enum<T: DeserializeOwned>(raw: String) -> Result<T> {
    Ok(serde_json::from_value(Value::String(raw))?)
}

fn parse_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    Ok(serde_json::from_str(raw)?)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)?.with_timezone(&Utc))
}

// Internal row type for SQLx
#[derive(sqlx::FromRow)]
struct MissionRow {
    mission_id: String,
    organization_id: String,
    drone_id: String,
    created_by: String,
    name: String,
    description: Option<String>,
    mission_type: String,
    pattern_type: String,
    status: String,
    location: Option<String>,
    schedule: Option<String>,
    boundary: String,
    parameters: String,
    waypoints: String,
    progress: String,
    telemetry: String,
    logs: String,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MissionRow> for Mission {
    type Error = anyhow::Error;

    fn try_from(row: MissionRow) -> Result<Self> {
        let status = MissionStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("unknown mission status {:?} for {}", row.status, row.mission_id))?;

        Ok(Mission {
            mission_type: parse_enum(row.mission_type)?,
            pattern_type: parse_enum(row.pattern_type)?,
            status,
            location: row.location.as_deref().map(parse_json).transpose()?,
            schedule: row.schedule.as_deref().map(parse_json).transpose()?,
            boundary: parse_json(&row.boundary)?,
            parameters: parse_json(&row.parameters)?,
            waypoints: parse_json(&row.waypoints)?,
            progress: parse_json(&row.progress)?,
            telemetry: parse_json(&row.telemetry)?,
            logs: parse_json(&row.logs)?,
            created_at: parse_timestamp(&row.created_at)?,
            updated_at: parse_timestamp(&row.updated_at)?,
            mission_id: row.mission_id,
            organization_id: row.organization_id,
            drone_id: row.drone_id,
            created_by: row.created_by,
            name: row.name,
            description: row.description,
        })
    }
}
