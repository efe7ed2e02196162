//! Ingestion, querying and reporting over an MBA student roster published
//! as a Google Sheets CSV export.

pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod models;
pub mod report;
pub mod risk;
pub mod sort;
pub mod source;
pub mod stats;

pub use cache::{RosterCache, RosterLoader};
pub use error::{RosterError, RosterResult};
pub use models::{FilterOptions, Gender, StudentRecord};
