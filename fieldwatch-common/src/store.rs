//! Store interfaces consumed by the reporting and write paths
//!
//! Handlers receive a store explicitly instead of reaching for a global pool.
//! [`SqliteStore`] implements every trait over one connection pool.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::db::{
    self, Agent, CandidateRow, Discrepancy, DiscrepancyKind, IncidentVideo, Location,
    LocationFilter, NewAgent, NewSubmission, PollingStation, Submission, SubmissionRecord,
};
use crate::Result;

/// Read access to canonical polling station records
#[async_trait]
pub trait StationProvider: Send + Sync {
    async fn list_stations(&self, filter: &LocationFilter) -> Result<Vec<PollingStation>>;

    /// Insert or update stations from a validated import batch
    async fn upsert_stations(&self, stations: &[PollingStation]) -> Result<usize>;
}

/// Form 34A submissions and their candidate rows
#[async_trait]
pub trait SubmissionProvider: Send + Sync {
    async fn list_submissions(&self, filter: &LocationFilter) -> Result<Vec<Submission>>;

    /// Candidate rows paired with their submission's county, optionally for one county
    async fn list_candidate_rows(&self, county: Option<&str>) -> Result<Vec<CandidateRow>>;

    /// Create a submission together with its candidate rows
    async fn create_submission(&self, new: NewSubmission) -> Result<SubmissionRecord>;

    /// Create a submission and its duplicate-serial discrepancy in one transaction
    async fn create_flagged_submission(
        &self,
        new: NewSubmission,
        related_submission_ids: &[String],
    ) -> Result<(SubmissionRecord, Discrepancy)>;

    async fn find_by_serial_number(&self, serial_number: &str) -> Result<Option<Submission>>;

    async fn find_by_agent_code(&self, agent_code: &str) -> Result<Option<Submission>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<SubmissionRecord>>;
}

/// Persists detected anomalies
#[async_trait]
pub trait DiscrepancyRecorder: Send + Sync {
    /// Record a duplicate serial number observed at `location`
    async fn record(
        &self,
        serial_number: &str,
        location: &Location,
        related_submission_ids: &[String],
    ) -> Result<Discrepancy>;

    async fn list_discrepancies(&self) -> Result<Vec<Discrepancy>>;
}

/// Registered field agents and their incident videos
#[async_trait]
pub trait AgentDirectory: Send + Sync {
    async fn register(&self, new: NewAgent) -> Result<Agent>;

    async fn find_by_code(&self, agent_code: &str) -> Result<Option<Agent>>;

    /// Returns false when the agent did not exist
    async fn delete(&self, agent_code: &str) -> Result<bool>;

    async fn add_video(
        &self,
        agent_code: &str,
        video_url: &str,
        description: Option<String>,
        max_videos: u32,
    ) -> Result<IncidentVideo>;

    async fn list_videos(&self, agent_code: &str) -> Result<Vec<IncidentVideo>>;
}

/// SQLite-backed implementation of every store trait
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl StationProvider for SqliteStore {
    async fn list_stations(&self, filter: &LocationFilter) -> Result<Vec<PollingStation>> {
        db::stations::list_stations(&self.pool, filter).await
    }

    async fn upsert_stations(&self, stations: &[PollingStation]) -> Result<usize> {
        db::stations::upsert_stations(&self.pool, stations).await
    }
}

#[async_trait]
impl SubmissionProvider for SqliteStore {
    async fn list_submissions(&self, filter: &LocationFilter) -> Result<Vec<Submission>> {
        db::submissions::list_submissions(&self.pool, filter).await
    }

    async fn list_candidate_rows(&self, county: Option<&str>) -> Result<Vec<CandidateRow>> {
        db::submissions::list_candidate_rows(&self.pool, county).await
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<SubmissionRecord> {
        db::submissions::create_submission(&self.pool, new).await
    }

    async fn create_flagged_submission(
        &self,
        new: NewSubmission,
        related_submission_ids: &[String],
    ) -> Result<(SubmissionRecord, Discrepancy)> {
        db::submissions::create_flagged_submission(&self.pool, new, related_submission_ids).await
    }

    async fn find_by_serial_number(&self, serial_number: &str) -> Result<Option<Submission>> {
        db::submissions::find_by_serial_number(&self.pool, serial_number).await
    }

    async fn find_by_agent_code(&self, agent_code: &str) -> Result<Option<Submission>> {
        db::submissions::find_by_agent_code(&self.pool, agent_code).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<SubmissionRecord>> {
        db::submissions::load_record(&self.pool, id).await
    }
}

#[async_trait]
impl DiscrepancyRecorder for SqliteStore {
    async fn record(
        &self,
        serial_number: &str,
        location: &Location,
        related_submission_ids: &[String],
    ) -> Result<Discrepancy> {
        db::discrepancies::insert_discrepancy(
            &self.pool,
            DiscrepancyKind::Duplicate,
            serial_number,
            location,
            related_submission_ids,
        )
        .await
    }

    async fn list_discrepancies(&self) -> Result<Vec<Discrepancy>> {
        db::discrepancies::list_discrepancies(&self.pool).await
    }
}

#[async_trait]
impl AgentDirectory for SqliteStore {
    async fn register(&self, new: NewAgent) -> Result<Agent> {
        db::agents::register_agent(&self.pool, new).await
    }

    async fn find_by_code(&self, agent_code: &str) -> Result<Option<Agent>> {
        db::agents::find_agent(&self.pool, agent_code).await
    }

    async fn delete(&self, agent_code: &str) -> Result<bool> {
        db::agents::delete_agent(&self.pool, agent_code).await
    }

    async fn add_video(
        &self,
        agent_code: &str,
        video_url: &str,
        description: Option<String>,
        max_videos: u32,
    ) -> Result<IncidentVideo> {
        db::agents::add_video(&self.pool, agent_code, video_url, description, max_videos).await
    }

    async fn list_videos(&self, agent_code: &str) -> Result<Vec<IncidentVideo>> {
        db::agents::list_videos(&self.pool, agent_code).await
    }
}
