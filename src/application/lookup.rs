use std::sync::Arc;

use crate::application::caches::{Cached, StudentCaches, load_through};
use crate::application::error::AppError;
use crate::application::repos::StudentsRepo;
use crate::application::scan_log::ScanLogService;
use crate::domain::entities::{BillSummary, GradeSheet, StudentInfo, StudentRecord};
use crate::domain::scan_log::ScanEventKind;

/// Log event kinds for one lookup flavour.
struct LogKinds {
    success: ScanEventKind,
    invalid: ScanEventKind,
    not_found: ScanEventKind,
    failure: ScanEventKind,
}

const INFO_KINDS: LogKinds = LogKinds {
    success: ScanEventKind::InfoDisplayed,
    invalid: ScanEventKind::StudentInfoError,
    not_found: ScanEventKind::StudentNotFound,
    failure: ScanEventKind::DbError,
};

const GRADE_KINDS: LogKinds = LogKinds {
    success: ScanEventKind::GradeFetchSuccess,
    invalid: ScanEventKind::GradeFetchError,
    not_found: ScanEventKind::GradeNotFound,
    failure: ScanEventKind::GradeFetchError,
};

const BILL_KINDS: LogKinds = LogKinds {
    success: ScanEventKind::BillFetchSuccess,
    invalid: ScanEventKind::BillFetchError,
    not_found: ScanEventKind::BillNotFound,
    failure: ScanEventKind::BillFetchError,
};

/// Cached reads backing the dashboard partials. Each lookup outcome is
/// written to the scan log.
#[derive(Clone)]
pub struct LookupService {
    students: Arc<dyn StudentsRepo>,
    caches: Arc<StudentCaches>,
    scan_log: ScanLogService,
}

impl LookupService {
    pub fn new(
        students: Arc<dyn StudentsRepo>,
        caches: Arc<StudentCaches>,
        scan_log: ScanLogService,
    ) -> Self {
        Self {
            students,
            caches,
            scan_log,
        }
    }

    pub async fn student_info(&self, rfid: &str) -> Result<Cached<StudentInfo>, AppError> {
        let result = self.load_student_info(rfid).await;
        self.log_outcome(&INFO_KINDS, rfid.trim(), &result, |cached| {
            let shown = if cached.hit {
                "Displayed cached info"
            } else {
                "Displayed info"
            };
            (
                student_id(cached.value.student.as_ref()),
                format!("{shown} for student ID {}", rfid.trim()),
            )
        })
        .await;
        result
    }

    async fn load_student_info(&self, rfid: &str) -> Result<Cached<StudentInfo>, AppError> {
        let rfid = required(rfid, "Student ID is required")?;
        load_through(&self.caches.info, rfid, || {
            self.students.find_student_info(rfid)
        })
        .await?
        .ok_or(AppError::not_found("Student not found"))
    }

    pub async fn current_grades(&self, rfid: &str) -> Result<Cached<GradeSheet>, AppError> {
        let result = self.load_current_grades(rfid).await;
        self.log_outcome(&GRADE_KINDS, rfid.trim(), &result, |cached| {
            (
                student_id(cached.value.student.as_ref()),
                format!("Fetched {} grades", cached.value.grades.len()),
            )
        })
        .await;
        result
    }

    async fn load_current_grades(&self, rfid: &str) -> Result<Cached<GradeSheet>, AppError> {
        let rfid = required(rfid, "Student Id is required")?;
        load_through(&self.caches.grades, rfid, || {
            self.students.find_current_grades(rfid)
        })
        .await?
        .ok_or(AppError::not_found("Student not found"))
    }

    pub async fn semester_grades(
        &self,
        student_id: &str,
        semester: &str,
    ) -> Result<Cached<GradeSheet>, AppError> {
        let result = self.load_semester_grades(student_id, semester).await;
        let semester = semester.trim();
        self.log_outcome(&GRADE_KINDS, student_id.trim(), &result, |cached| {
            (
                Some(student_id.trim().to_string()),
                format!(
                    "Fetched {} grades for {semester}",
                    cached.value.grades.len()
                ),
            )
        })
        .await;
        result
    }

    async fn load_semester_grades(
        &self,
        student_id: &str,
        semester: &str,
    ) -> Result<Cached<GradeSheet>, AppError> {
        let student_id = required(student_id, "Student ID and semester are required")?;
        let semester = required(semester, "Student ID and semester are required")?;
        let key = StudentCaches::semester_key(student_id, semester);

        load_through(&self.caches.semester_grades, &key, || {
            self.students.find_semester_grades(student_id, semester)
        })
        .await?
        .ok_or(AppError::not_found("Grades not found"))
    }

    pub async fn bill(&self, rfid: &str) -> Result<Cached<BillSummary>, AppError> {
        let result = self.load_bill(rfid).await;
        self.log_outcome(&BILL_KINDS, rfid.trim(), &result, |cached| {
            let message = match cached.value.assessment.as_ref() {
                Some(assessment) => {
                    format!("Fetched bill for assessment {}", assessment.assessment_number)
                }
                None => "Fetched bill".to_string(),
            };
            (student_id(cached.value.student.as_ref()), message)
        })
        .await;
        result
    }

    async fn load_bill(&self, rfid: &str) -> Result<Cached<BillSummary>, AppError> {
        let rfid = required(rfid, "Student Id is required")?;
        load_through(&self.caches.bills, rfid, || self.students.find_bill(rfid))
            .await?
            .ok_or(AppError::not_found("No assessment found"))
    }

    async fn log_outcome<V>(
        &self,
        kinds: &LogKinds,
        card_id: &str,
        result: &Result<Cached<V>, AppError>,
        describe: impl FnOnce(&Cached<V>) -> (Option<String>, String),
    ) {
        let (kind, student_id, message) = match result {
            Ok(cached) => {
                let (student_id, message) = describe(cached);
                (kinds.success, student_id, message)
            }
            Err(AppError::Validation(message)) => (kinds.invalid, None, message.clone()),
            Err(AppError::NotFound(message)) => {
                (kinds.not_found, None, format!("{message}: {card_id}"))
            }
            Err(err) => (kinds.failure, None, err.to_string()),
        };
        self.scan_log
            .record(kind, card_id, student_id, message)
            .await;
    }
}

fn student_id(student: Option<&StudentRecord>) -> Option<String> {
    student.map(|student| student.student_id.clone())
}

fn required<'a>(value: &'a str, message: &'static str) -> Result<&'a str, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(message));
    }
    Ok(trimmed)
}
