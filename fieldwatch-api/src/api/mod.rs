//! HTTP API handlers for fieldwatch-api

pub mod agents;
pub mod forms;
pub mod health;
pub mod reports;
pub mod stations;

pub use agents::{
    add_video, delete_agent, get_agent, get_agent_submission, list_videos, register_agent,
};
pub use forms::{get_submission, list_submissions, submit_form};
pub use health::health_routes;
pub use reports::{
    candidate_tally, duplicate_submissions, extra_submissions, list_discrepancies,
    missing_submissions,
};
pub use stations::{import_stations, list_stations};
