//! Duplicate detection by station code and by serial number

use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;

use crate::db::Submission;

/// Submission reference inside a duplicate group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateMember {
    pub id: String,
    pub agent_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StationDuplicate {
    pub polling_station_code: String,
    pub count: usize,
    pub submissions: Vec<DuplicateMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SerialDuplicate {
    pub serial_number: String,
    pub count: usize,
    pub submissions: Vec<DuplicateMember>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateReport {
    pub station_duplicates: Vec<StationDuplicate>,
    pub serial_duplicates: Vec<SerialDuplicate>,
    /// Number of station groups plus number of serial groups. A submission in
    /// both kinds of group is counted once per group.
    pub total_duplicates: usize,
}

/// Group items by key, keeping groups and members in first-seen order.
/// Items for which `key` returns `None` are skipped.
fn group_by<'a, T, K, F>(items: &'a [T], key: F) -> Vec<(K, Vec<&'a T>)>
where
    K: Eq + Hash + Clone,
    F: Fn(&'a T) -> Option<K>,
{
    let mut index: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<&'a T>)> = Vec::new();

    for item in items {
        let Some(k) = key(item) else { continue };
        match index.get(&k) {
            Some(&i) => groups[i].1.push(item),
            None => {
                index.insert(k.clone(), groups.len());
                groups.push((k, vec![item]));
            }
        }
    }

    groups
}

fn members(group: &[&Submission]) -> Vec<DuplicateMember> {
    group
        .iter()
        .map(|s| DuplicateMember {
            id: s.id.clone(),
            agent_code: s.agent_code.clone(),
        })
        .collect()
}

/// Report station-code groups and serial-number groups with more than one member.
///
/// Station grouping skips submissions without a station code; serial
/// grouping includes every submission. The two are independent.
pub fn find_duplicate_submissions(submissions: &[Submission]) -> DuplicateReport {
    let station_duplicates: Vec<StationDuplicate> =
        group_by(submissions, |s| s.station_code())
            .into_iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(code, group)| StationDuplicate {
                polling_station_code: code.to_string(),
                count: group.len(),
                submissions: members(&group),
            })
            .collect();

    let serial_duplicates: Vec<SerialDuplicate> =
        group_by(submissions, |s| Some(s.serial_number.as_str()))
            .into_iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(serial, group)| SerialDuplicate {
                serial_number: serial.to_string(),
                count: group.len(),
                submissions: members(&group),
            })
            .collect();

    DuplicateReport {
        total_duplicates: station_duplicates.len() + serial_duplicates.len(),
        station_duplicates,
        serial_duplicates,
    }
}
