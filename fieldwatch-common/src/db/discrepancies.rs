//! Recorded discrepancies

use chrono::Utc;
use sqlx::{Row, SqliteExecutor, SqlitePool};
use uuid::Uuid;

use super::models::{parse_timestamp, Discrepancy, DiscrepancyKind, Location};
use crate::{Error, Result};

/// Insert a discrepancy record on a pool or inside an open transaction
pub async fn insert_discrepancy<'e, E>(
    executor: E,
    kind: DiscrepancyKind,
    serial_number: &str,
    location: &Location,
    related_submission_ids: &[String],
) -> Result<Discrepancy>
where
    E: SqliteExecutor<'e>,
{
    let discrepancy = Discrepancy {
        id: Uuid::new_v4().to_string(),
        serial_number: serial_number.to_string(),
        county_code: location.county_code.clone(),
        constituency_code: location.constituency_code.clone(),
        ward_code: location.ward_code.clone(),
        kind,
        related_submission_ids: related_submission_ids.to_vec(),
        created_at: Utc::now(),
    };

    let related = serde_json::to_string(&discrepancy.related_submission_ids)
        .map_err(|e| Error::Internal(e.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO discrepancies (
            id, serial_number, county_code, constituency_code, ward_code,
            kind, related_submission_ids, created_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&discrepancy.id)
    .bind(&discrepancy.serial_number)
    .bind(&discrepancy.county_code)
    .bind(&discrepancy.constituency_code)
    .bind(&discrepancy.ward_code)
    .bind(discrepancy.kind.as_str())
    .bind(related)
    .bind(discrepancy.created_at.to_rfc3339())
    .execute(executor)
    .await?;

    Ok(discrepancy)
}

/// All discrepancies, newest first
pub async fn list_discrepancies(pool: &SqlitePool) -> Result<Vec<Discrepancy>> {
    let rows = sqlx::query(
        r#"
        SELECT id, serial_number, county_code, constituency_code, ward_code,
               kind, related_submission_ids, created_at
        FROM discrepancies
        ORDER BY rowid DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let kind: String = row.get("kind");
            let related: String = row.get("related_submission_ids");
            let created_at: String = row.get("created_at");
            Ok(Discrepancy {
                id: row.get("id"),
                serial_number: row.get("serial_number"),
                county_code: row.get("county_code"),
                constituency_code: row.get("constituency_code"),
                ward_code: row.get("ward_code"),
                kind: DiscrepancyKind::parse(&kind)?,
                related_submission_ids: serde_json::from_str(&related).map_err(|e| {
                    Error::Internal(format!("Corrupt related_submission_ids: {}", e))
                })?,
                created_at: parse_timestamp(&created_at)?,
            })
        })
        .collect()
}
