//! Station/submission reconciliation in both directions

use serde::Serialize;
use std::collections::HashSet;

use crate::db::{PollingStation, Submission};

/// Stations with no submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSubmissions {
    pub stations: Vec<PollingStation>,
    pub missing_count: usize,
    pub total_stations: usize,
}

/// Submissions whose station code matches no station in the compared set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtraSubmissions {
    pub submissions: Vec<Submission>,
    pub count: usize,
}

/// Every station in `stations` whose code no submission carries.
///
/// Submissions without a station code contribute nothing.
pub fn find_missing_submissions(
    stations: &[PollingStation],
    submissions: &[Submission],
) -> MissingSubmissions {
    let submitted: HashSet<&str> = submissions
        .iter()
        .filter_map(Submission::station_code)
        .collect();

    let missing: Vec<PollingStation> = stations
        .iter()
        .filter(|s| !submitted.contains(s.polling_station_code.as_str()))
        .cloned()
        .collect();

    MissingSubmissions {
        missing_count: missing.len(),
        total_stations: stations.len(),
        stations: missing,
    }
}

/// Every submission whose station code is absent from `stations`.
///
/// `stations` is whatever set the caller filtered; a station that exists
/// outside it still makes the submission extra. Submissions without a
/// station code are never reported.
pub fn find_extra_submissions(
    submissions: &[Submission],
    stations: &[PollingStation],
) -> ExtraSubmissions {
    let known: HashSet<&str> = stations
        .iter()
        .map(|s| s.polling_station_code.as_str())
        .collect();

    let extra: Vec<Submission> = submissions
        .iter()
        .filter(|s| s.station_code().is_some_and(|code| !known.contains(code)))
        .cloned()
        .collect();

    ExtraSubmissions {
        count: extra.len(),
        submissions: extra,
    }
}
