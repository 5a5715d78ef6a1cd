//! Database models and queries

pub mod agents;
pub mod discrepancies;
pub mod init;
pub mod models;
pub mod stations;
pub mod submissions;

pub use init::*;
pub use models::*;
