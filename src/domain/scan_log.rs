//! Audit trail of card scans and dashboard lookups.

use time::{Date, OffsetDateTime};

/// Outcome class of a logged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogStatus {
    Success,
    Warning,
    Failure,
}

impl LogStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            LogStatus::Success => "success",
            LogStatus::Warning => "warning",
            LogStatus::Failure => "failure",
        }
    }

    /// Parse a level filter. `error` and `warn` are accepted as aliases.
    pub fn parse(level: &str) -> Option<Self> {
        match level.trim().to_ascii_lowercase().as_str() {
            "success" => Some(LogStatus::Success),
            "warning" | "warn" => Some(LogStatus::Warning),
            "failure" | "error" => Some(LogStatus::Failure),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanEventKind {
    CardScanned,
    ScanRejected,
    InfoDisplayed,
    StudentInfoError,
    StudentNotFound,
    DbError,
    GradeFetchSuccess,
    GradeNotFound,
    GradeFetchError,
    BillFetchSuccess,
    BillNotFound,
    BillFetchError,
}

impl ScanEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanEventKind::CardScanned => "card_scanned",
            ScanEventKind::ScanRejected => "scan_rejected",
            ScanEventKind::InfoDisplayed => "info_displayed",
            ScanEventKind::StudentInfoError => "student_info_error",
            ScanEventKind::StudentNotFound => "student_not_found",
            ScanEventKind::DbError => "db_error",
            ScanEventKind::GradeFetchSuccess => "grade_fetch_success",
            ScanEventKind::GradeNotFound => "grade_not_found",
            ScanEventKind::GradeFetchError => "grade_fetch_error",
            ScanEventKind::BillFetchSuccess => "bill_fetch_success",
            ScanEventKind::BillNotFound => "bill_not_found",
            ScanEventKind::BillFetchError => "bill_fetch_error",
        }
    }

    /// Unknown cards are warnings; rejected input and backend failures are failures.
    pub fn status(self) -> LogStatus {
        match self {
            ScanEventKind::CardScanned
            | ScanEventKind::InfoDisplayed
            | ScanEventKind::GradeFetchSuccess
            | ScanEventKind::BillFetchSuccess => LogStatus::Success,
            ScanEventKind::StudentNotFound
            | ScanEventKind::GradeNotFound
            | ScanEventKind::BillNotFound => LogStatus::Warning,
            ScanEventKind::ScanRejected
            | ScanEventKind::StudentInfoError
            | ScanEventKind::DbError
            | ScanEventKind::GradeFetchError
            | ScanEventKind::BillFetchError => LogStatus::Failure,
        }
    }
}

/// An event waiting to be stored; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewScanLog {
    pub timestamp: OffsetDateTime,
    pub card_id: String,
    pub student_id: Option<String>,
    pub kind: ScanEventKind,
    pub message: String,
}

impl NewScanLog {
    pub fn now(
        kind: ScanEventKind,
        card_id: impl Into<String>,
        student_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: OffsetDateTime::now_utc(),
            card_id: card_id.into(),
            student_id,
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanLogEntry {
    pub id: u64,
    pub timestamp: OffsetDateTime,
    pub card_id: String,
    pub student_id: Option<String>,
    pub kind: ScanEventKind,
    pub message: String,
}

impl ScanLogEntry {
    pub fn from_new(id: u64, entry: NewScanLog) -> Self {
        Self {
            id,
            timestamp: entry.timestamp,
            card_id: entry.card_id,
            student_id: entry.student_id,
            kind: entry.kind,
            message: entry.message,
        }
    }

    pub fn status(&self) -> LogStatus {
        self.kind.status()
    }
}

/// Criteria for listing log entries. Every set field must match.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogFilter {
    /// Case-insensitive substring of the message, event type or card.
    pub search: Option<String>,
    pub level: Option<LogStatus>,
    /// Inclusive UTC calendar day bounds.
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

impl LogFilter {
    pub fn matches(&self, entry: &ScanLogEntry) -> bool {
        if self.level.is_some_and(|level| entry.status() != level) {
            return false;
        }

        let day = entry.timestamp.date();
        if self.start_date.is_some_and(|start| day < start) {
            return false;
        }
        if self.end_date.is_some_and(|end| day > end) {
            return false;
        }

        match self.search.as_deref() {
            Some(needle) => {
                let needle = needle.to_lowercase();
                entry.message.to_lowercase().contains(&needle)
                    || entry.kind.as_str().contains(&needle)
                    || entry.card_id.to_lowercase().contains(&needle)
            }
            None => true,
        }
    }
}

/// Summary counters over a newest-first slice of entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogStats {
    pub total: usize,
    pub failures: usize,
    pub warnings: usize,
    /// Entries per second across the span between oldest and newest.
    pub rate_per_second: f64,
}

impl LogStats {
    pub fn from_entries(entries: &[ScanLogEntry]) -> Self {
        let total = entries.len();
        let failures = entries
            .iter()
            .filter(|entry| entry.status() == LogStatus::Failure)
            .count();
        let warnings = entries
            .iter()
            .filter(|entry| entry.status() == LogStatus::Warning)
            .count();

        let rate_per_second = match (entries.first(), entries.last()) {
            (Some(newest), Some(oldest)) if total > 1 => {
                let span = (newest.timestamp - oldest.timestamp).as_seconds_f64();
                if span > 0.0 { total as f64 / span } else { 0.0 }
            }
            _ => 0.0,
        };

        Self {
            total,
            failures,
            warnings,
            rate_per_second,
        }
    }
}

#[cfg(test)]
mod tests {
    use time::macros::{date, datetime};

    use super::*;

    fn entry(id: u64, at: OffsetDateTime, kind: ScanEventKind, card: &str) -> ScanLogEntry {
        ScanLogEntry {
            id,
            timestamp: at,
            card_id: card.to_string(),
            student_id: None,
            kind,
            message: format!("{} for {card}", kind.as_str()),
        }
    }

    #[test]
    fn level_aliases_parse() {
        assert_eq!(LogStatus::parse("error"), Some(LogStatus::Failure));
        assert_eq!(LogStatus::parse(" Warn "), Some(LogStatus::Warning));
        assert_eq!(LogStatus::parse("success"), Some(LogStatus::Success));
        assert_eq!(LogStatus::parse("verbose"), None);
    }

    #[test]
    fn filter_combines_search_level_and_dates() {
        let scanned = entry(
            1,
            datetime!(2025-03-10 08:00 UTC),
            ScanEventKind::CardScanned,
            "ACLC-2023-001",
        );
        let missing = entry(
            2,
            datetime!(2025-03-11 23:59 UTC),
            ScanEventKind::StudentNotFound,
            "UNKNOWN",
        );

        let by_card = LogFilter {
            search: Some("aclc".to_string()),
            ..LogFilter::default()
        };
        assert!(by_card.matches(&scanned));
        assert!(!by_card.matches(&missing));

        let warnings = LogFilter {
            level: Some(LogStatus::Warning),
            ..LogFilter::default()
        };
        assert!(!warnings.matches(&scanned));
        assert!(warnings.matches(&missing));

        let single_day = LogFilter {
            start_date: Some(date!(2025 - 03 - 11)),
            end_date: Some(date!(2025 - 03 - 11)),
            ..LogFilter::default()
        };
        assert!(!single_day.matches(&scanned));
        assert!(single_day.matches(&missing));
    }

    #[test]
    fn stats_count_statuses_and_rate() {
        let entries = vec![
            entry(
                3,
                datetime!(2025-03-10 08:00:10 UTC),
                ScanEventKind::DbError,
                "A",
            ),
            entry(
                2,
                datetime!(2025-03-10 08:00:05 UTC),
                ScanEventKind::StudentNotFound,
                "B",
            ),
            entry(
                1,
                datetime!(2025-03-10 08:00:00 UTC),
                ScanEventKind::CardScanned,
                "A",
            ),
        ];

        let stats = LogStats::from_entries(&entries);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.warnings, 1);
        assert!((stats.rate_per_second - 0.3).abs() < 1e-9);
    }

    #[test]
    fn single_entry_has_no_rate() {
        let entries = vec![entry(
            1,
            datetime!(2025-03-10 08:00 UTC),
            ScanEventKind::CardScanned,
            "A",
        )];
        assert_eq!(LogStats::from_entries(&entries).rate_per_second, 0.0);
    }
}
