//! Card-scan ingestion: resolve the card, then tell every dashboard what to show.

use std::sync::Arc;

use tracing::{info, warn};

use crate::application::caches::{StudentCaches, load_through};
use crate::application::error::AppError;
use crate::application::repos::StudentsRepo;
use crate::application::scan_log::ScanLogService;
use crate::domain::scan_log::ScanEventKind;
use crate::hub::EventHub;
use crate::presentation::views::{ScanErrorTemplate, StudentCallbackTemplate, render_fragment};

const SOURCE: &str = "application::scan::ScanService";

pub const TOPIC_STUDENT_CALLBACK: &str = "studentcallback";
pub const TOPIC_NOT_FOUND: &str = "not-found";
pub const TOPIC_ERROR: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    pub student_id: String,
    pub cache_hit: bool,
}

#[derive(Clone)]
pub struct ScanService {
    students: Arc<dyn StudentsRepo>,
    caches: Arc<StudentCaches>,
    hub: EventHub,
    scan_log: ScanLogService,
}

impl ScanService {
    pub fn new(
        students: Arc<dyn StudentsRepo>,
        caches: Arc<StudentCaches>,
        hub: EventHub,
        scan_log: ScanLogService,
    ) -> Self {
        Self {
            students,
            caches,
            hub,
            scan_log,
        }
    }

    /// Handle one scan of `rfid`.
    ///
    /// A blank card is rejected without publishing. Otherwise exactly one
    /// event is published: the load instruction for a known card, or an
    /// error fragment when the card is unknown or the lookup failed. Every
    /// outcome, including rejection, is written to the scan log.
    pub async fn ingest(&self, rfid: &str) -> Result<ScanOutcome, AppError> {
        let rfid = rfid.trim();
        if rfid.is_empty() {
            self.scan_log
                .record(ScanEventKind::ScanRejected, "", None, "RFID is required")
                .await;
            return Err(AppError::validation("RFID is required"));
        }

        let lookup = load_through(&self.caches.info, rfid, || {
            self.students.find_student_info(rfid)
        })
        .await;

        match lookup {
            Ok(Some(found)) => {
                let payload = render_fragment(StudentCallbackTemplate::for_rfid(rfid))
                    .map_err(|err| AppError::unexpected(err.to_string()))?;
                self.hub.publish(TOPIC_STUDENT_CALLBACK, payload);

                let student_id = found
                    .value
                    .student
                    .as_ref()
                    .map(|student| student.student_id.clone())
                    .unwrap_or_default();
                info!(
                    target_module = SOURCE,
                    rfid,
                    student_id = student_id.as_str(),
                    cache_hit = found.hit,
                    "card scan resolved"
                );
                let message = if found.hit {
                    format!("Card scanned for student ID {student_id} (cached)")
                } else {
                    format!("Card scanned for student ID {student_id}")
                };
                self.scan_log
                    .record(
                        ScanEventKind::CardScanned,
                        rfid,
                        Some(student_id.clone()),
                        message,
                    )
                    .await;

                Ok(ScanOutcome {
                    student_id,
                    cache_hit: found.hit,
                })
            }
            Ok(None) => {
                warn!(target_module = SOURCE, rfid, "card scan for unknown card");
                self.scan_log
                    .record(
                        ScanEventKind::StudentNotFound,
                        rfid,
                        None,
                        format!("Student not found: {rfid}"),
                    )
                    .await;
                self.publish_error(
                    TOPIC_NOT_FOUND,
                    "Student not found",
                    format!("No student is registered for card {rfid}."),
                );
                Err(AppError::not_found("Student not found"))
            }
            Err(err) => {
                warn!(
                    target_module = SOURCE,
                    rfid,
                    error = %err,
                    "card scan lookup failed"
                );
                self.scan_log
                    .record(
                        ScanEventKind::DbError,
                        rfid,
                        None,
                        format!("Error getting student info: {err}"),
                    )
                    .await;
                self.publish_error(
                    TOPIC_ERROR,
                    "Lookup failed",
                    "The student directory could not be reached. Please scan again.".to_string(),
                );
                Err(err.into())
            }
        }
    }

    fn publish_error(&self, topic: &str, title: &'static str, message: String) {
        let payload = match render_fragment(ScanErrorTemplate {
            title,
            message: message.clone(),
        }) {
            Ok(html) => html,
            Err(err) => {
                warn!(
                    target_module = SOURCE,
                    error = %err,
                    "error fragment failed to render, publishing plain text"
                );
                message
            }
        };
        self.hub.publish(topic, payload);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::time::timeout;

    use super::*;
    use crate::application::repos::RepoError;
    use crate::cache::CacheConfig;
    use crate::application::repos::ScanLogRepo;
    use crate::domain::entities::{BillSummary, GradeSheet, StudentInfo, StudentRecord};
    use crate::domain::scan_log::{LogFilter, LogStatus};
    use crate::hub::{Event, HubConfig};
    use crate::infra::scan_log::MemoryScanLog;

    enum Behaviour {
        Known,
        Unknown,
        Failing,
    }

    struct FakeStudents {
        behaviour: Behaviour,
        info_calls: AtomicUsize,
    }

    impl FakeStudents {
        fn new(behaviour: Behaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                info_calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StudentsRepo for FakeStudents {
        async fn find_student_info(&self, rfid: &str) -> Result<Option<StudentInfo>, RepoError> {
            self.info_calls.fetch_add(1, Ordering::SeqCst);
            match self.behaviour {
                Behaviour::Known => Ok(Some(StudentInfo {
                    student: Some(StudentRecord {
                        student_id: "2023-001".to_string(),
                        rfid: rfid.to_string(),
                        first_name: Some("Maria".to_string()),
                        middle_name: None,
                        last_name: Some("Reyes".to_string()),
                        email: None,
                        year_level: Some(1),
                        program: Some("BSIT".to_string()),
                        block_section: None,
                        status: None,
                    }),
                    grades_summary: Vec::new(),
                    assessment: None,
                    payment_schedules: Vec::new(),
                })),
                Behaviour::Unknown => Ok(None),
                Behaviour::Failing => Err(RepoError::Timeout),
            }
        }

        async fn find_current_grades(&self, _rfid: &str) -> Result<Option<GradeSheet>, RepoError> {
            Ok(None)
        }

        async fn find_semester_grades(
            &self,
            _student_id: &str,
            _semester: &str,
        ) -> Result<Option<GradeSheet>, RepoError> {
            Ok(None)
        }

        async fn find_bill(&self, _rfid: &str) -> Result<Option<BillSummary>, RepoError> {
            Ok(None)
        }
    }

    fn service_with_log(students: Arc<FakeStudents>) -> (ScanService, EventHub, Arc<MemoryScanLog>) {
        let (hub, _task) = EventHub::spawn(HubConfig::default());
        let caches =
            Arc::new(StudentCaches::new(&CacheConfig::default()).expect("default config is valid"));
        let log = Arc::new(MemoryScanLog::new(
            std::num::NonZeroUsize::new(16).expect("non-zero"),
        ));
        let scan_log = ScanLogService::new(log.clone());
        (
            ScanService::new(students, caches, hub.clone(), scan_log),
            hub,
            log,
        )
    }

    fn service(students: Arc<FakeStudents>) -> (ScanService, EventHub) {
        let (scans, hub, _log) = service_with_log(students);
        (scans, hub)
    }

    async fn next_event(subscriber: &mut crate::hub::Subscriber) -> Event {
        timeout(Duration::from_secs(1), subscriber.recv())
            .await
            .expect("event before timeout")
            .expect("subscriber still open")
    }

    #[tokio::test]
    async fn known_card_publishes_load_instruction() {
        let students = FakeStudents::new(Behaviour::Known);
        let (scans, hub) = service(Arc::clone(&students));
        let mut subscriber = hub.subscribe().await.expect("hub running");

        let outcome = scans.ingest(" ACLC-2023-001 ").await.expect("scan accepted");
        assert_eq!(outcome.student_id, "2023-001");
        assert!(!outcome.cache_hit);

        let event = next_event(&mut subscriber).await;
        assert_eq!(event.topic(), TOPIC_STUDENT_CALLBACK);
        assert!(event.payload().contains(r#"hx-vals='{"rfid":"ACLC-2023-001"}'"#));
    }

    #[tokio::test]
    async fn repeated_scan_is_served_from_cache() {
        let students = FakeStudents::new(Behaviour::Known);
        let (scans, _hub) = service(Arc::clone(&students));

        scans.ingest("ACLC-2023-001").await.expect("first scan");
        let second = scans.ingest("ACLC-2023-001").await.expect("second scan");

        assert!(second.cache_hit);
        assert_eq!(students.info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_card_publishes_not_found() {
        let (scans, hub) = service(FakeStudents::new(Behaviour::Unknown));
        let mut subscriber = hub.subscribe().await.expect("hub running");

        let err = scans.ingest("UNKNOWN").await.expect_err("unknown card");
        assert!(matches!(err, AppError::NotFound(_)));

        let event = next_event(&mut subscriber).await;
        assert_eq!(event.topic(), TOPIC_NOT_FOUND);
        assert!(event.payload().contains("UNKNOWN"));
    }

    #[tokio::test]
    async fn lookup_failure_publishes_error() {
        let (scans, hub) = service(FakeStudents::new(Behaviour::Failing));
        let mut subscriber = hub.subscribe().await.expect("hub running");

        let err = scans.ingest("ACLC-2023-001").await.expect_err("lookup fails");
        assert!(matches!(err, AppError::Repo(RepoError::Timeout)));

        let event = next_event(&mut subscriber).await;
        assert_eq!(event.topic(), TOPIC_ERROR);
    }

    #[tokio::test]
    async fn blank_card_is_rejected_without_publishing() {
        let students = FakeStudents::new(Behaviour::Known);
        let (scans, hub) = service(Arc::clone(&students));
        let mut subscriber = hub.subscribe().await.expect("hub running");

        let err = scans.ingest("   ").await.expect_err("blank card");
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(students.info_calls.load(Ordering::SeqCst), 0);

        hub.publish("marker", "after");
        let event = next_event(&mut subscriber).await;
        assert_eq!(event.topic(), "marker");
    }

    #[tokio::test]
    async fn every_scan_outcome_is_logged() {
        let (scans, _hub, log) = service_with_log(FakeStudents::new(Behaviour::Known));
        scans.ingest("ACLC-2023-001").await.expect("first scan");
        scans.ingest("ACLC-2023-001").await.expect("cached scan");
        let _ = scans.ingest(" ").await;

        let entries = log.list(&LogFilter::default()).await.expect("listed");
        let kinds: Vec<&str> = entries.iter().map(|entry| entry.kind.as_str()).collect();
        assert_eq!(kinds, vec!["scan_rejected", "card_scanned", "card_scanned"]);
        assert!(entries[1].message.ends_with("(cached)"));
        assert_eq!(entries[1].student_id.as_deref(), Some("2023-001"));
        assert_eq!(entries[0].status(), LogStatus::Failure);

        let (scans, _hub, log) = service_with_log(FakeStudents::new(Behaviour::Unknown));
        let _ = scans.ingest("UNKNOWN").await;
        let entries = log.list(&LogFilter::default()).await.expect("listed");
        assert_eq!(entries[0].kind.as_str(), "student_not_found");
        assert_eq!(entries[0].status(), LogStatus::Warning);

        let (scans, _hub, log) = service_with_log(FakeStudents::new(Behaviour::Failing));
        let _ = scans.ingest("ACLC-2023-001").await;
        let entries = log.list(&LogFilter::default()).await.expect("listed");
        assert_eq!(entries[0].kind.as_str(), "db_error");
    }
}
