//! Database initialization
//!
//! Creates the database file on first run and applies the schema. Every
//! statement is idempotent so startup can run it against an existing file.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version
const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            db_url
                .parse::<sqlx::sqlite::SqliteConnectOptions>()?
                .foreign_keys(true),
        )
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows report reads while an upload handler writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create all tables and indexes
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    create_polling_stations_table(pool).await?;
    create_agents_table(pool).await?;
    create_submissions_table(pool).await?;
    create_candidate_results_table(pool).await?;
    create_discrepancies_table(pool).await?;
    create_incident_videos_table(pool).await?;

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    if version.unwrap_or(0) < CURRENT_SCHEMA_VERSION {
        sqlx::query("INSERT OR REPLACE INTO schema_version (version) VALUES (?)")
            .bind(CURRENT_SCHEMA_VERSION)
            .execute(pool)
            .await?;
        info!("Schema version set to {}", CURRENT_SCHEMA_VERSION);
    }

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_polling_stations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS polling_stations (
            polling_station_code TEXT PRIMARY KEY,
            polling_station_name TEXT NOT NULL,
            county_code TEXT NOT NULL,
            county_name TEXT NOT NULL,
            constituency_code TEXT NOT NULL,
            constituency_name TEXT NOT NULL,
            ward_code TEXT NOT NULL,
            ward_name TEXT NOT NULL,
            registered_voters INTEGER NOT NULL DEFAULT 0 CHECK (registered_voters >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_polling_stations_location
         ON polling_stations(county_code, constituency_code, ward_code)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_agents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS agents (
            id TEXT PRIMARY KEY,
            agent_code TEXT NOT NULL UNIQUE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone_number TEXT NOT NULL UNIQUE,
            national_id TEXT NOT NULL UNIQUE,
            county_code TEXT NOT NULL,
            county_name TEXT NOT NULL,
            constituency_code TEXT NOT NULL,
            constituency_name TEXT NOT NULL,
            ward_code TEXT NOT NULL,
            ward_name TEXT NOT NULL,
            polling_station_code TEXT,
            polling_station_name TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_submissions_table(pool: &SqlitePool) -> Result<()> {
    // serial_number is intentionally not UNIQUE: collisions are recorded as
    // discrepancies, never rejected
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id TEXT PRIMARY KEY,
            agent_code TEXT NOT NULL UNIQUE REFERENCES agents(agent_code) ON DELETE CASCADE,
            serial_number TEXT NOT NULL,
            county_code TEXT NOT NULL,
            constituency_code TEXT NOT NULL,
            ward_code TEXT NOT NULL,
            polling_station_code TEXT,
            polling_station_name TEXT,
            image_digest TEXT,
            submitted_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_submissions_serial ON submissions(serial_number)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_candidate_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidate_results (
            id TEXT PRIMARY KEY,
            submission_id TEXT NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            party_name TEXT NOT NULL,
            votes INTEGER NOT NULL CHECK (votes >= 0)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_candidate_results_submission
         ON candidate_results(submission_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_discrepancies_table(pool: &SqlitePool) -> Result<()> {
    // related_submission_ids: JSON array of submission ids
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS discrepancies (
            id TEXT PRIMARY KEY,
            serial_number TEXT NOT NULL,
            county_code TEXT NOT NULL,
            constituency_code TEXT NOT NULL,
            ward_code TEXT NOT NULL,
            kind TEXT NOT NULL,
            related_submission_ids TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_incident_videos_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS incident_videos (
            id TEXT PRIMARY KEY,
            agent_code TEXT NOT NULL REFERENCES agents(agent_code) ON DELETE CASCADE,
            video_url TEXT NOT NULL,
            description TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
