//! Database models
//!
//! Location names and codes are stored denormalized on every row, as they were
//! at write time. Reports read them back verbatim.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// County/constituency/ward codes of a submission or discrepancy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub county_code: String,
    pub constituency_code: String,
    pub ward_code: String,
}

/// Optional county/constituency/ward restriction applied to a collection
///
/// Absent and empty values do not restrict.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LocationFilter {
    pub county: Option<String>,
    pub constituency: Option<String>,
    pub ward: Option<String>,
}

impl LocationFilter {
    pub fn county(code: impl Into<String>) -> Self {
        Self {
            county: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn county_code(&self) -> Option<&str> {
        non_empty(self.county.as_deref())
    }

    pub fn constituency_code(&self) -> Option<&str> {
        non_empty(self.constituency.as_deref())
    }

    pub fn ward_code(&self) -> Option<&str> {
        non_empty(self.ward.as_deref())
    }
}

/// Canonical polling station reference record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingStation {
    pub county_code: String,
    pub county_name: String,
    pub constituency_code: String,
    pub constituency_name: String,
    pub ward_code: String,
    pub ward_name: String,
    pub polling_station_code: String,
    pub polling_station_name: String,
    pub registered_voters: i64,
}

impl PollingStation {
    pub fn validate(&self) -> Result<()> {
        if self.polling_station_code.trim().is_empty() {
            return Err(Error::InvalidInput(
                "polling_station_code is required".to_string(),
            ));
        }
        if self.registered_voters < 0 {
            return Err(Error::InvalidInput(format!(
                "registered_voters must be non-negative for station {}",
                self.polling_station_code
            )));
        }
        Ok(())
    }
}

/// Form 34A submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub id: String,
    pub agent_code: String,
    pub serial_number: String,
    pub county_code: String,
    pub constituency_code: String,
    pub ward_code: String,
    pub polling_station_code: Option<String>,
    pub polling_station_name: Option<String>,
    /// SHA-256 of the scanned image, hex encoded
    pub image_digest: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl Submission {
    /// Station code, treating an empty string the same as no code
    pub fn station_code(&self) -> Option<&str> {
        non_empty(self.polling_station_code.as_deref())
    }

    pub fn location(&self) -> Location {
        Location {
            county_code: self.county_code.clone(),
            constituency_code: self.constituency_code.clone(),
            ward_code: self.ward_code.clone(),
        }
    }
}

/// Per-candidate vote line item owned by one submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub id: String,
    pub submission_id: String,
    pub first_name: String,
    pub last_name: String,
    pub party_name: String,
    pub votes: i64,
}

/// Candidate vote count as read off a form, before it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateVotes {
    pub first_name: String,
    pub last_name: String,
    pub party_name: String,
    pub votes: i64,
}

/// Candidate result row paired with its owning submission's county code
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRow {
    pub county_code: String,
    pub first_name: String,
    pub last_name: String,
    pub party_name: String,
    pub votes: i64,
}

/// Data needed to create a submission and its candidate rows
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub agent_code: String,
    pub serial_number: String,
    pub location: Location,
    pub polling_station_code: Option<String>,
    pub polling_station_name: Option<String>,
    pub image_digest: Option<String>,
    pub candidates: Vec<CandidateVotes>,
}

/// A stored submission together with its candidate rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    #[serde(flatten)]
    pub submission: Submission,
    pub candidate_results: Vec<CandidateResult>,
}

/// Kind of recorded anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscrepancyKind {
    Duplicate,
}

impl DiscrepancyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiscrepancyKind::Duplicate => "duplicate",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "duplicate" => Ok(DiscrepancyKind::Duplicate),
            other => Err(Error::Internal(format!("Unknown discrepancy kind: {}", other))),
        }
    }
}

/// Recorded anomaly surfaced for later review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discrepancy {
    pub id: String,
    pub serial_number: String,
    pub county_code: String,
    pub constituency_code: String,
    pub ward_code: String,
    pub kind: DiscrepancyKind,
    pub related_submission_ids: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Registered field agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agent {
    pub id: String,
    pub agent_code: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub national_id: String,
    pub county_code: String,
    pub county_name: String,
    pub constituency_code: String,
    pub constituency_name: String,
    pub ward_code: String,
    pub ward_name: String,
    pub polling_station_code: Option<String>,
    pub polling_station_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Agent {
    pub fn location(&self) -> Location {
        Location {
            county_code: self.county_code.clone(),
            constituency_code: self.constituency_code.clone(),
            ward_code: self.ward_code.clone(),
        }
    }
}

/// Registration request for a new agent
///
/// Absent fields deserialize as empty so [`NewAgent::validate`] can name them.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NewAgent {
    pub first_name: String,
    pub last_name: String,
    pub phone_number: String,
    pub national_id: String,
    pub county_code: String,
    pub county_name: String,
    pub constituency_code: String,
    pub constituency_name: String,
    pub ward_code: String,
    pub ward_name: String,
    pub polling_station_code: Option<String>,
    pub polling_station_name: Option<String>,
}

impl NewAgent {
    /// Reject blank identity or location fields
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("first_name", &self.first_name),
            ("last_name", &self.last_name),
            ("phone_number", &self.phone_number),
            ("national_id", &self.national_id),
            ("county_code", &self.county_code),
            ("county_name", &self.county_name),
            ("constituency_code", &self.constituency_code),
            ("constituency_name", &self.constituency_name),
            ("ward_code", &self.ward_code),
            ("ward_name", &self.ward_name),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidInput(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

/// Incident video reference recorded for an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncidentVideo {
    pub id: String,
    pub agent_code: String,
    pub video_url: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Map `Some("")` to `None`
pub fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

/// Owned variant of [`non_empty`], used before writing optional codes
pub fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse an RFC 3339 timestamp column
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp '{}': {}", value, e)))
}
