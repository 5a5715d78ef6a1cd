//! Reconciliation and tally engine
//!
//! Pure read-and-aggregate operations over a snapshot of submissions and
//! polling stations. Nothing here writes to the store, and every report is
//! computed on demand from freshly loaded rows.
//!
//! The async `*_report` functions load the working set through the store
//! traits and hand it to the pure functions in the submodules.

pub mod duplicates;
pub mod stations;
pub mod tally;

pub use duplicates::{
    find_duplicate_submissions, DuplicateMember, DuplicateReport, SerialDuplicate,
    StationDuplicate,
};
pub use stations::{
    find_extra_submissions, find_missing_submissions, ExtraSubmissions, MissingSubmissions,
};
pub use tally::{tally_candidates, CandidateTally};

use serde::Serialize;

use crate::db::LocationFilter;
use crate::store::{StationProvider, SubmissionProvider};
use crate::Result;

/// Ranked candidate totals, optionally for one county
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TallyReport {
    pub county: Option<String>,
    pub candidates: Vec<CandidateTally>,
    pub total_votes: i64,
}

/// Aggregate candidate votes across all submissions, or one county's
pub async fn tally_report<S>(store: &S, county: Option<&str>) -> Result<TallyReport>
where
    S: SubmissionProvider + ?Sized,
{
    let county = county.filter(|c| !c.is_empty());
    let rows = store.list_candidate_rows(county).await?;
    let candidates = tally_candidates(&rows, county)?;
    let total_votes = candidates
        .iter()
        .try_fold(0i64, |sum, c| tally::add_votes(sum, c.total_votes))?;

    Ok(TallyReport {
        county: county.map(str::to_string),
        candidates,
        total_votes,
    })
}

/// Filtered stations compared against every submission in the store
pub async fn missing_submissions_report<S>(
    store: &S,
    filter: &LocationFilter,
) -> Result<MissingSubmissions>
where
    S: StationProvider + SubmissionProvider + ?Sized,
{
    let stations = store.list_stations(filter).await?;
    let submissions = store.list_submissions(&LocationFilter::default()).await?;
    Ok(find_missing_submissions(&stations, &submissions))
}

/// Filtered submissions compared against stations filtered the same way.
///
/// Each collection is filtered on its own location columns; there is no join.
pub async fn extra_submissions_report<S>(
    store: &S,
    filter: &LocationFilter,
) -> Result<ExtraSubmissions>
where
    S: StationProvider + SubmissionProvider + ?Sized,
{
    let submissions = store.list_submissions(filter).await?;
    let stations = store.list_stations(filter).await?;
    Ok(find_extra_submissions(&submissions, &stations))
}

pub async fn duplicate_submissions_report<S>(
    store: &S,
    filter: &LocationFilter,
) -> Result<DuplicateReport>
where
    S: SubmissionProvider + ?Sized,
{
    let submissions = store.list_submissions(filter).await?;
    Ok(find_duplicate_submissions(&submissions))
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{TimeZone, Utc};

    use crate::db::{PollingStation, Submission};

    pub fn station(code: &str, ward: &str) -> PollingStation {
        PollingStation {
            county_code: "047".to_string(),
            county_name: "Nairobi".to_string(),
            constituency_code: "290".to_string(),
            constituency_name: "Westlands".to_string(),
            ward_code: ward.to_string(),
            ward_name: format!("Ward {}", ward),
            polling_station_code: code.to_string(),
            polling_station_name: format!("Station {}", code),
            registered_voters: 500,
        }
    }

    pub fn submission(id: &str, agent: &str, station: Option<&str>, serial: &str) -> Submission {
        Submission {
            id: id.to_string(),
            agent_code: agent.to_string(),
            serial_number: serial.to_string(),
            county_code: "047".to_string(),
            constituency_code: "290".to_string(),
            ward_code: "W1".to_string(),
            polling_station_code: station.map(str::to_string),
            polling_station_name: None,
            image_digest: None,
            submitted_at: Utc.with_ymd_and_hms(2027, 8, 9, 18, 0, 0).unwrap(),
        }
    }
}
