//! Database connection and initialization.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::{info, warn};

use crate::backoff::Backoff;

/// Database connection wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Get the underlying connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close every pooled connection; later queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// How hard to try before giving up on the database at startup.
#[derive(Debug, Clone, Copy)]
pub struct ConnectPolicy {
    pub max_connections: u32,
    pub retries: u32,
    pub retry_base: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self {
            max_connections: 5,
            retries: 0,
            retry_base: Duration::from_millis(500),
        }
    }
}

/// Clear all persisted state.
pub async fn clear_all(pool: &SqlitePool) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM missions").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM drones").execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(())
}

/// Initialize the SQLite database.
///
/// Creates the database file if it doesn't exist, runs migrations,
/// and returns a connection pool. `:memory:` databases need a single
/// connection, otherwise every connection sees its own empty database.
pub async fn init_database(db_path: &str, max_connections: u32) -> Result<Database> {
    init_database_with(
        db_path,
        ConnectPolicy {
            max_connections,
            ..ConnectPolicy::default()
        },
    )
    .await
}

/// Initialize the database, retrying the connection with exponential backoff.
pub async fn init_database_with(db_path: &str, policy: ConnectPolicy) -> Result<Database> {
    if let Some(parent) = Path::new(db_path).parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating database directory for {}", db_path))?;
    }

    let db_url = format!("sqlite:{}?mode=rwc", db_path);
    let mut backoff = Backoff::new(policy.retry_base, policy.retry_base.saturating_mul(16));

    let pool = loop {
        info!("Connecting to database: {}", db_path);
        match SqlitePoolOptions::new()
            .max_connections(policy.max_connections.max(1))
            .connect(&db_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) if backoff.attempts() < policy.retries => {
                let delay = backoff.fail();
                warn!(
                    "Database connection failed (attempt {}/{}): {}; retrying in {:?}",
                    backoff.attempts(),
                    policy.retries,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("connecting to database {}", db_path));
            }
        }
    };

    run_migrations(&pool).await?;

    Ok(Database { pool })
}

/// Run database migrations.
async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let migration_sql = include_str!("../../migrations/001_init.sql");

    info!("Running database migrations...");

    for statement in migration_sql.split(';') {
        let statement: String = statement
            .lines()
            .filter(|line| !line.trim().starts_with("--"))
            .collect::<Vec<_>>()
            .join("\n");
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }

        if let Err(e) = sqlx::query(statement).execute(pool).await {
            if e.to_string().contains("already exists") {
                continue;
            }
            anyhow::bail!("Migration failed: {}", e);
        }
    }

    info!("Database migrations complete");
    Ok(())
}
