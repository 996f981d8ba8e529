//! Recording and querying the scan log.

use std::sync::Arc;

use time::{Date, macros::format_description};
use tracing::{info, warn};

use crate::application::error::AppError;
use crate::application::repos::ScanLogRepo;
use crate::domain::scan_log::{
    LogFilter, LogStats, LogStatus, NewScanLog, ScanEventKind, ScanLogEntry,
};

const SOURCE: &str = "application::scan_log::ScanLogService";

#[derive(Clone)]
pub struct ScanLogService {
    repo: Arc<dyn ScanLogRepo>,
}

impl ScanLogService {
    pub fn new(repo: Arc<dyn ScanLogRepo>) -> Self {
        Self { repo }
    }

    /// Store one event. A failing store is logged and otherwise ignored so
    /// that scans and lookups never fail on account of the log.
    pub async fn record(
        &self,
        kind: ScanEventKind,
        card_id: &str,
        student_id: Option<String>,
        message: impl Into<String>,
    ) {
        let entry = NewScanLog::now(kind, card_id, student_id, message);
        if let Err(err) = self.repo.record(entry).await {
            warn!(
                target_module = SOURCE,
                event_type = kind.as_str(),
                card_id,
                error = %err,
                "failed to record scan log entry"
            );
        }
    }

    pub async fn entries(&self, filter: &LogFilter) -> Result<Vec<ScanLogEntry>, AppError> {
        Ok(self.repo.list(filter).await?)
    }

    pub async fn stats(&self) -> Result<LogStats, AppError> {
        let entries = self.repo.list(&LogFilter::default()).await?;
        Ok(LogStats::from_entries(&entries))
    }

    pub async fn clear(&self) -> Result<usize, AppError> {
        let removed = self.repo.clear().await?;
        info!(target_module = SOURCE, removed, "scan log cleared");
        Ok(removed)
    }
}

/// Build a filter from raw query values.
///
/// Blank values are ignored; `all` disables the level filter. Dates use
/// `YYYY-MM-DD`.
pub fn parse_filter(
    search: &str,
    level: &str,
    start_date: &str,
    end_date: &str,
) -> Result<LogFilter, AppError> {
    let search = search.trim();
    let level = level.trim();

    let level = if level.is_empty() || level.eq_ignore_ascii_case("all") {
        None
    } else {
        Some(
            LogStatus::parse(level)
                .ok_or_else(|| AppError::validation(format!("Unknown log level: {level}")))?,
        )
    };

    Ok(LogFilter {
        search: (!search.is_empty()).then(|| search.to_string()),
        level,
        start_date: parse_date(start_date)?,
        end_date: parse_date(end_date)?,
    })
}

fn parse_date(value: &str) -> Result<Option<Date>, AppError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    Date::parse(value, format_description!("[year]-[month]-[day]"))
        .map(Some)
        .map_err(|_| AppError::validation(format!("Invalid date: {value}")))
}
