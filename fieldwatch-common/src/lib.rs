//! # Fieldwatch Common Library
//!
//! Shared code for the fieldwatch backend including:
//! - Database schema, models and store implementations
//! - Store traits consumed by the reporting and write paths
//! - Configuration loading
//! - The reconciliation and tally engine used by the reporting endpoints

pub mod config;
pub mod db;
pub mod error;
pub mod reconcile;
pub mod store;

pub use error::{Error, Result};
