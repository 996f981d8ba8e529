//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::entities::{BillSummary, GradeSheet, StudentInfo};
use crate::domain::scan_log::{LogFilter, NewScanLog, ScanLogEntry};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Read access to the student directory.
///
/// `Ok(None)` means the card or student is unknown; errors are reserved for
/// the backing store failing.
#[async_trait]
pub trait StudentsRepo: Send + Sync {
    async fn find_student_info(&self, rfid: &str) -> Result<Option<StudentInfo>, RepoError>;

    async fn find_current_grades(&self, rfid: &str) -> Result<Option<GradeSheet>, RepoError>;

    async fn find_semester_grades(
        &self,
        student_id: &str,
        semester: &str,
    ) -> Result<Option<GradeSheet>, RepoError>;

    async fn find_bill(&self, rfid: &str) -> Result<Option<BillSummary>, RepoError>;
}

/// Append-only store of scan and lookup outcomes.
#[async_trait]
pub trait ScanLogRepo: Send + Sync {
    async fn record(&self, entry: NewScanLog) -> Result<ScanLogEntry, RepoError>;

    /// Matching entries, most recently recorded first.
    async fn list(&self, filter: &LogFilter) -> Result<Vec<ScanLogEntry>, RepoError>;

    /// Drop every entry, returning how many were removed.
    async fn clear(&self) -> Result<usize, RepoError>;
}
