//! Infrastructure adapters and runtime bootstrap.

pub mod directory;
pub mod error;
pub mod http;
pub mod scan_log;
pub mod simulator;
pub mod telemetry;
