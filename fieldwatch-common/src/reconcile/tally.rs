//! Candidate vote tally aggregation

use serde::Serialize;
use std::collections::HashMap;

use crate::db::CandidateRow;
use crate::{Error, Result};

/// Total votes for one `(first_name, last_name, party_name)` group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateTally {
    pub first_name: String,
    pub last_name: String,
    pub party_name: String,
    pub total_votes: i64,
}

/// Sum votes per candidate, optionally restricted to one county.
///
/// Names are compared exactly: case and whitespace variants stay separate
/// entries. Output is sorted by `total_votes` descending; equal totals keep
/// the order in which each candidate was first seen.
///
/// Fails with `Error::Internal` if a candidate's total does not fit in an `i64`.
pub fn tally_candidates(
    rows: &[CandidateRow],
    county: Option<&str>,
) -> Result<Vec<CandidateTally>> {
    let county = county.filter(|c| !c.is_empty());

    let mut index: HashMap<(&str, &str, &str), usize> = HashMap::new();
    let mut tallies: Vec<CandidateTally> = Vec::new();

    for row in rows {
        if county.is_some_and(|c| c != row.county_code) {
            continue;
        }

        let key = (
            row.first_name.as_str(),
            row.last_name.as_str(),
            row.party_name.as_str(),
        );
        match index.get(&key) {
            Some(&i) => {
                let tally = &mut tallies[i];
                tally.total_votes = add_votes(tally.total_votes, row.votes)?;
            }
            None => {
                index.insert(key, tallies.len());
                tallies.push(CandidateTally {
                    first_name: row.first_name.clone(),
                    last_name: row.last_name.clone(),
                    party_name: row.party_name.clone(),
                    total_votes: row.votes,
                });
            }
        }
    }

    // sort_by is stable
    tallies.sort_by(|a, b| b.total_votes.cmp(&a.total_votes));
    Ok(tallies)
}

/// Overflow-checked vote addition
pub(crate) fn add_votes(total: i64, votes: i64) -> Result<i64> {
    total
        .checked_add(votes)
        .ok_or_else(|| Error::Internal("Vote total overflow".to_string()))
}
