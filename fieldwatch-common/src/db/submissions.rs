//! Form 34A submissions and their candidate rows

use chrono::Utc;
use sqlx::{sqlite::SqliteRow, Row, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::discrepancies::insert_discrepancy;
use super::models::{
    normalize_optional, parse_timestamp, CandidateResult, CandidateRow, Discrepancy,
    DiscrepancyKind, LocationFilter, NewSubmission, Submission, SubmissionRecord,
};
use crate::{Error, Result};

const SUBMISSION_COLUMNS: &str = "id, agent_code, serial_number, county_code, constituency_code,
     ward_code, polling_station_code, polling_station_name, image_digest, submitted_at";

fn submission_from_row(row: &SqliteRow) -> Result<Submission> {
    let submitted_at: String = row.get("submitted_at");
    Ok(Submission {
        id: row.get("id"),
        agent_code: row.get("agent_code"),
        serial_number: row.get("serial_number"),
        county_code: row.get("county_code"),
        constituency_code: row.get("constituency_code"),
        ward_code: row.get("ward_code"),
        polling_station_code: row.get("polling_station_code"),
        polling_station_name: row.get("polling_station_name"),
        image_digest: row.get("image_digest"),
        submitted_at: parse_timestamp(&submitted_at)?,
    })
}

/// List submissions matching the filter, oldest first
pub async fn list_submissions(
    pool: &SqlitePool,
    filter: &LocationFilter,
) -> Result<Vec<Submission>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM submissions
         WHERE (?1 IS NULL OR county_code = ?1)
           AND (?2 IS NULL OR constituency_code = ?2)
           AND (?3 IS NULL OR ward_code = ?3)
         ORDER BY rowid",
        SUBMISSION_COLUMNS
    ))
    .bind(filter.county_code())
    .bind(filter.constituency_code())
    .bind(filter.ward_code())
    .fetch_all(pool)
    .await?;

    rows.iter().map(submission_from_row).collect()
}

/// Candidate rows joined with their submission's county, in insertion order
pub async fn list_candidate_rows(
    pool: &SqlitePool,
    county: Option<&str>,
) -> Result<Vec<CandidateRow>> {
    let county = county.filter(|c| !c.is_empty());
    let rows = sqlx::query(
        r#"
        SELECT s.county_code, r.first_name, r.last_name, r.party_name, r.votes
        FROM candidate_results r
        JOIN submissions s ON s.id = r.submission_id
        WHERE (?1 IS NULL OR s.county_code = ?1)
        ORDER BY r.rowid
        "#,
    )
    .bind(county)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| CandidateRow {
            county_code: row.get("county_code"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            party_name: row.get("party_name"),
            votes: row.get("votes"),
        })
        .collect())
}

/// Create a submission and its candidate rows atomically
///
/// Returns `Error::Conflict` if the agent already has a submission.
pub async fn create_submission(pool: &SqlitePool, new: NewSubmission) -> Result<SubmissionRecord> {
    let mut tx = pool.begin().await?;
    let record = insert_submission(&mut tx, new).await?;
    tx.commit().await?;
    Ok(record)
}

/// Create a submission together with a duplicate-serial discrepancy that
/// references `related_submission_ids`.
///
/// Both rows commit in one transaction: either the submission is stored and
/// flagged, or nothing is stored.
pub async fn create_flagged_submission(
    pool: &SqlitePool,
    new: NewSubmission,
    related_submission_ids: &[String],
) -> Result<(SubmissionRecord, Discrepancy)> {
    let mut tx = pool.begin().await?;
    let record = insert_submission(&mut tx, new).await?;
    let discrepancy = insert_discrepancy(
        &mut *tx,
        DiscrepancyKind::Duplicate,
        &record.submission.serial_number,
        &record.submission.location(),
        related_submission_ids,
    )
    .await?;
    tx.commit().await?;
    Ok((record, discrepancy))
}

async fn insert_submission(
    conn: &mut SqliteConnection,
    new: NewSubmission,
) -> Result<SubmissionRecord> {
    if let Some(c) = new.candidates.iter().find(|c| c.votes < 0) {
        return Err(Error::InvalidInput(format!(
            "Negative vote count for {} {}",
            c.first_name, c.last_name
        )));
    }

    let submission = Submission {
        id: Uuid::new_v4().to_string(),
        agent_code: new.agent_code,
        serial_number: new.serial_number,
        county_code: new.location.county_code,
        constituency_code: new.location.constituency_code,
        ward_code: new.location.ward_code,
        polling_station_code: normalize_optional(new.polling_station_code),
        polling_station_name: normalize_optional(new.polling_station_name),
        image_digest: new.image_digest,
        submitted_at: Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO submissions (
            id, agent_code, serial_number, county_code, constituency_code, ward_code,
            polling_station_code, polling_station_name, image_digest, submitted_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&submission.id)
    .bind(&submission.agent_code)
    .bind(&submission.serial_number)
    .bind(&submission.county_code)
    .bind(&submission.constituency_code)
    .bind(&submission.ward_code)
    .bind(&submission.polling_station_code)
    .bind(&submission.polling_station_name)
    .bind(&submission.image_digest)
    .bind(submission.submitted_at.to_rfc3339())
    .execute(&mut *conn)
    .await
    .map_err(|e| match e.as_database_error() {
        Some(db_err) if db_err.is_unique_violation() => Error::Conflict(format!(
            "Agent {} has already submitted a Form 34A",
            submission.agent_code
        )),
        Some(db_err) if db_err.is_foreign_key_violation() => {
            Error::NotFound(format!("Agent not found: {}", submission.agent_code))
        }
        _ => Error::Database(e),
    })?;

    let mut candidate_results = Vec::with_capacity(new.candidates.len());
    for candidate in new.candidates {
        let result = CandidateResult {
            id: Uuid::new_v4().to_string(),
            submission_id: submission.id.clone(),
            first_name: candidate.first_name,
            last_name: candidate.last_name,
            party_name: candidate.party_name,
            votes: candidate.votes,
        };

        sqlx::query(
            r#"
            INSERT INTO candidate_results (
                id, submission_id, first_name, last_name, party_name, votes
            )
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&result.id)
        .bind(&result.submission_id)
        .bind(&result.first_name)
        .bind(&result.last_name)
        .bind(&result.party_name)
        .bind(result.votes)
        .execute(&mut *conn)
        .await?;

        candidate_results.push(result);
    }

    Ok(SubmissionRecord {
        submission,
        candidate_results,
    })
}

/// First stored submission carrying this serial number, if any
pub async fn find_by_serial_number(
    pool: &SqlitePool,
    serial_number: &str,
) -> Result<Option<Submission>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM submissions WHERE serial_number = ? ORDER BY rowid LIMIT 1",
        SUBMISSION_COLUMNS
    ))
    .bind(serial_number)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(submission_from_row).transpose()
}

pub async fn find_by_agent_code(
    pool: &SqlitePool,
    agent_code: &str,
) -> Result<Option<Submission>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM submissions WHERE agent_code = ?",
        SUBMISSION_COLUMNS
    ))
    .bind(agent_code)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(submission_from_row).transpose()
}

/// Load a submission with its candidate rows
pub async fn load_record(pool: &SqlitePool, id: &str) -> Result<Option<SubmissionRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM submissions WHERE id = ?",
        SUBMISSION_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    let submission = match row {
        Some(row) => submission_from_row(&row)?,
        None => return Ok(None),
    };

    let rows = sqlx::query(
        "SELECT id, submission_id, first_name, last_name, party_name, votes
         FROM candidate_results WHERE submission_id = ? ORDER BY rowid",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    let candidate_results = rows
        .iter()
        .map(|row| CandidateResult {
            id: row.get("id"),
            submission_id: row.get("submission_id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            party_name: row.get("party_name"),
            votes: row.get("votes"),
        })
        .collect();

    Ok(Some(SubmissionRecord {
        submission,
        candidate_results,
    }))
}
