//! Polling station reference data

use sqlx::{sqlite::SqliteRow, Row, SqlitePool};

use super::models::{LocationFilter, PollingStation};
use crate::Result;

const STATION_COLUMNS: &str = "polling_station_code, polling_station_name, county_code, county_name,
     constituency_code, constituency_name, ward_code, ward_name, registered_voters";

fn station_from_row(row: &SqliteRow) -> PollingStation {
    PollingStation {
        polling_station_code: row.get("polling_station_code"),
        polling_station_name: row.get("polling_station_name"),
        county_code: row.get("county_code"),
        county_name: row.get("county_name"),
        constituency_code: row.get("constituency_code"),
        constituency_name: row.get("constituency_name"),
        ward_code: row.get("ward_code"),
        ward_name: row.get("ward_name"),
        registered_voters: row.get("registered_voters"),
    }
}

/// List stations matching the filter, in import order
pub async fn list_stations(
    pool: &SqlitePool,
    filter: &LocationFilter,
) -> Result<Vec<PollingStation>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM polling_stations
         WHERE (?1 IS NULL OR county_code = ?1)
           AND (?2 IS NULL OR constituency_code = ?2)
           AND (?3 IS NULL OR ward_code = ?3)
         ORDER BY rowid",
        STATION_COLUMNS
    ))
    .bind(filter.county_code())
    .bind(filter.constituency_code())
    .bind(filter.ward_code())
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(station_from_row).collect())
}

/// Insert or replace stations keyed by station code, in one transaction
///
/// Returns the number of records written.
pub async fn upsert_stations(pool: &SqlitePool, stations: &[PollingStation]) -> Result<usize> {
    for station in stations {
        station.validate()?;
    }

    let mut tx = pool.begin().await?;
    for station in stations {
        sqlx::query(
            r#"
            INSERT INTO polling_stations (
                polling_station_code, polling_station_name, county_code, county_name,
                constituency_code, constituency_name, ward_code, ward_name, registered_voters
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(polling_station_code) DO UPDATE SET
                polling_station_name = excluded.polling_station_name,
                county_code = excluded.county_code,
                county_name = excluded.county_name,
                constituency_code = excluded.constituency_code,
                constituency_name = excluded.constituency_name,
                ward_code = excluded.ward_code,
                ward_name = excluded.ward_name,
                registered_voters = excluded.registered_voters
            "#,
        )
        .bind(station.polling_station_code.trim())
        .bind(&station.polling_station_name)
        .bind(&station.county_code)
        .bind(&station.county_name)
        .bind(&station.constituency_code)
        .bind(&station.constituency_name)
        .bind(&station.ward_code)
        .bind(&station.ward_name)
        .bind(station.registered_voters)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    Ok(stations.len())
}
