//! Application services: card-scan ingestion and cached student lookups.

pub mod caches;
pub mod error;
pub mod lookup;
pub mod repos;
pub mod scan;
pub mod scan_log;
