//! Agent directory and incident video records

use chrono::Utc;
use rand::{distributions::Uniform, Rng};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::models::{normalize_optional, parse_timestamp, Agent, IncidentVideo, NewAgent};
use crate::{Error, Result};

/// Prefix of every generated agent code
pub const AGENT_CODE_PREFIX: &str = "AGT-";

const AGENT_CODE_LEN: usize = 6;
const AGENT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const MAX_CODE_ATTEMPTS: usize = 10;

/// Generate a candidate agent code such as `AGT-7KQ2MX`
pub fn generate_agent_code() -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..AGENT_CODE_ALPHABET.len());
    let suffix: String = (0..AGENT_CODE_LEN)
        .map(|_| AGENT_CODE_ALPHABET[rng.sample(dist)] as char)
        .collect();
    format!("{}{}", AGENT_CODE_PREFIX, suffix)
}

fn agent_from_row(row: &SqliteRow) -> Result<Agent> {
    let created_at: String = row.get("created_at");
    Ok(Agent {
        id: row.get("id"),
        agent_code: row.get("agent_code"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        phone_number: row.get("phone_number"),
        national_id: row.get("national_id"),
        county_code: row.get("county_code"),
        county_name: row.get("county_name"),
        constituency_code: row.get("constituency_code"),
        constituency_name: row.get("constituency_name"),
        ward_code: row.get("ward_code"),
        ward_name: row.get("ward_name"),
        polling_station_code: row.get("polling_station_code"),
        polling_station_name: row.get("polling_station_name"),
        created_at: parse_timestamp(&created_at)?,
    })
}

/// Register a new agent with a freshly generated unique code
///
/// Returns `Error::Conflict` when the phone number or national id is already registered.
pub async fn register_agent(pool: &SqlitePool, new: NewAgent) -> Result<Agent> {
    new.validate()?;

    let existing: Option<String> = sqlx::query_scalar(
        "SELECT agent_code FROM agents WHERE national_id = ? OR phone_number = ? LIMIT 1",
    )
    .bind(new.national_id.trim())
    .bind(new.phone_number.trim())
    .fetch_optional(pool)
    .await?;

    if let Some(code) = existing {
        return Err(Error::Conflict(format!(
            "Agent already registered with this national id or phone number ({})",
            code
        )));
    }

    let agent_code = unused_agent_code(pool).await?;

    let agent = Agent {
        id: Uuid::new_v4().to_string(),
        agent_code,
        first_name: new.first_name.trim().to_string(),
        last_name: new.last_name.trim().to_string(),
        phone_number: new.phone_number.trim().to_string(),
        national_id: new.national_id.trim().to_string(),
        county_code: new.county_code,
        county_name: new.county_name,
        constituency_code: new.constituency_code,
        constituency_name: new.constituency_name,
        ward_code: new.ward_code,
        ward_name: new.ward_name,
        polling_station_code: normalize_optional(new.polling_station_code),
        polling_station_name: normalize_optional(new.polling_station_name),
        created_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO agents (
            id, agent_code, first_name, last_name, phone_number, national_id,
            county_code, county_name, constituency_code, constituency_name,
            ward_code, ward_name, polling_station_code, polling_station_name, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&agent.id)
    .bind(&agent.agent_code)
    .bind(&agent.first_name)
    .bind(&agent.last_name)
    .bind(&agent.phone_number)
    .bind(&agent.national_id)
    .bind(&agent.county_code)
    .bind(&agent.county_name)
    .bind(&agent.constituency_code)
    .bind(&agent.constituency_name)
    .bind(&agent.ward_code)
    .bind(&agent.ward_name)
    .bind(&agent.polling_station_code)
    .bind(&agent.polling_station_name)
    .bind(agent.created_at.to_rfc3339())
    .execute(pool)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => {
            Error::Conflict("Agent already registered".to_string())
        }
        _ => Error::Database(e),
    })?;

    Ok(agent)
}

async fn unused_agent_code(pool: &SqlitePool) -> Result<String> {
    for _ in 0..MAX_CODE_ATTEMPTS {
        let code = generate_agent_code();
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM agents WHERE agent_code = ?)")
                .bind(&code)
                .fetch_one(pool)
                .await?;
        if !taken {
            return Ok(code);
        }
        debug!(agent_code = %code, "Generated agent code already taken, retrying");
    }

    Err(Error::Internal(
        "Could not generate a unique agent code".to_string(),
    ))
}

pub async fn find_agent(pool: &SqlitePool, agent_code: &str) -> Result<Option<Agent>> {
    let row = sqlx::query(
        r#"
        SELECT id, agent_code, first_name, last_name, phone_number, national_id,
               county_code, county_name, constituency_code, constituency_name,
               ward_code, ward_name, polling_station_code, polling_station_name, created_at
        FROM agents WHERE agent_code = ?
        "#,
    )
    .bind(agent_code)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(agent_from_row).transpose()
}

/// Delete an agent; the schema cascades to the agent's submission,
/// its candidate rows, and the agent's videos.
///
/// Returns false when no such agent exists.
pub async fn delete_agent(pool: &SqlitePool, agent_code: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM agents WHERE agent_code = ?")
        .bind(agent_code)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Record an incident video, enforcing the per-agent cap
pub async fn add_video(
    pool: &SqlitePool,
    agent_code: &str,
    video_url: &str,
    description: Option<String>,
    max_videos: u32,
) -> Result<IncidentVideo> {
    if video_url.trim().is_empty() {
        return Err(Error::InvalidInput("video_url is required".to_string()));
    }

    let mut tx = pool.begin().await?;

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM incident_videos WHERE agent_code = ?")
        .bind(agent_code)
        .fetch_one(&mut *tx)
        .await?;

    if count >= i64::from(max_videos) {
        return Err(Error::Conflict(format!(
            "Agent {} has reached the limit of {} videos",
            agent_code, max_videos
        )));
    }

    let video = IncidentVideo {
        id: Uuid::new_v4().to_string(),
        agent_code: agent_code.to_string(),
        video_url: video_url.trim().to_string(),
        description: normalize_optional(description),
        created_at: Utc::now(),
    };

    sqlx::query(
        "INSERT INTO incident_videos (id, agent_code, video_url, description, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&video.id)
    .bind(&video.agent_code)
    .bind(&video.video_url)
    .bind(&video.description)
    .bind(video.created_at.to_rfc3339())
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(video)
}

pub async fn list_videos(pool: &SqlitePool, agent_code: &str) -> Result<Vec<IncidentVideo>> {
    let rows = sqlx::query(
        "SELECT id, agent_code, video_url, description, created_at
         FROM incident_videos WHERE agent_code = ? ORDER BY rowid",
    )
    .bind(agent_code)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let created_at: String = row.get("created_at");
            Ok(IncidentVideo {
                id: row.get("id"),
                agent_code: row.get("agent_code"),
                video_url: row.get("video_url"),
                description: row.get("description"),
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .collect()
}
