//! In-memory student directory loaded from a TOML seed file.
//!
//! ```toml
//! [term]
//! academic_year = "2024-2025"
//! semester = "Second Semester"
//!
//! [[students]]
//! student_id = "2023-001"
//! rfid = "ACLC-2023-001"
//! last_name = "Reyes"
//!
//! [[students.grades]]
//! academic_year = "2024-2025"
//! semester = "First Semester"
//! subject_code = "IT101"
//! subject_name = "Introduction to Computing"
//! final_grade = 1.5
//! ```

use std::{collections::HashMap, path::Path};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::application::repos::{RepoError, StudentsRepo};
use crate::domain::entities::{
    AcademicTerm, Assessment, BillSummary, FIRST_SEMESTER, FeeBreakdown, GradeRecord, GradeSheet,
    PaymentRecord, PaymentSchedule, SECOND_SEMESTER, StudentInfo, StudentRecord,
    YearGradeSummary,
};
use crate::infra::error::InfraError;

#[derive(Debug, Deserialize)]
struct SeedFile {
    term: AcademicTerm,
    #[serde(default)]
    students: Vec<SeedStudent>,
}

#[derive(Debug, Deserialize)]
struct SeedStudent {
    #[serde(flatten)]
    record: StudentRecord,
    #[serde(default)]
    assessment: Option<Assessment>,
    #[serde(default)]
    payment_schedules: Vec<PaymentSchedule>,
    #[serde(default)]
    fees: Vec<FeeBreakdown>,
    #[serde(default)]
    payments: Vec<PaymentRecord>,
    #[serde(default)]
    grades: Vec<SeedGrade>,
}

#[derive(Debug, Deserialize)]
struct SeedGrade {
    academic_year: String,
    semester: String,
    subject_code: String,
    subject_name: String,
    #[serde(default)]
    prelim_grade: Option<f64>,
    #[serde(default)]
    midterm_grade: Option<f64>,
    #[serde(default)]
    prefinal_grade: Option<f64>,
    #[serde(default)]
    final_term_grade: Option<f64>,
    #[serde(default)]
    final_grade: Option<f64>,
}

impl SeedGrade {
    fn record(&self) -> GradeRecord {
        GradeRecord {
            subject_code: self.subject_code.clone(),
            subject_name: self.subject_name.clone(),
            prelim_grade: self.prelim_grade,
            midterm_grade: self.midterm_grade,
            prefinal_grade: self.prefinal_grade,
            final_term_grade: self.final_term_grade,
            final_grade: self.final_grade,
        }
    }
}

impl SeedStudent {
    fn grades_for(&self, academic_year: &str, semester: &str) -> Vec<GradeRecord> {
        self.grades
            .iter()
            .filter(|grade| grade.academic_year == academic_year && grade.semester == semester)
            .map(SeedGrade::record)
            .collect()
    }

    /// One row per academic year, oldest first, with each semester's GWA.
    fn grades_summary(&self) -> Vec<YearGradeSummary> {
        let mut years: Vec<&str> = self
            .grades
            .iter()
            .map(|grade| grade.academic_year.as_str())
            .collect();
        years.sort_unstable();
        years.dedup();

        years
            .into_iter()
            .map(|year| YearGradeSummary {
                year_name: year.to_string(),
                first_sem: self.semester_gwa(year, FIRST_SEMESTER),
                second_sem: self.semester_gwa(year, SECOND_SEMESTER),
            })
            .collect()
    }

    fn semester_gwa(&self, academic_year: &str, semester: &str) -> Option<String> {
        let sheet = GradeSheet {
            student: None,
            term: AcademicTerm {
                academic_year: academic_year.to_string(),
                semester: semester.to_string(),
            },
            grades: self.grades_for(academic_year, semester),
        };
        sheet.general_weighted_average().map(|gwa| format!("{gwa:.2}"))
    }
}

/// Student directory held entirely in memory.
#[derive(Debug)]
pub struct SeededDirectory {
    term: AcademicTerm,
    by_rfid: HashMap<String, SeedStudent>,
    rfid_by_student_id: HashMap<String, String>,
}

impl SeededDirectory {
    pub fn from_toml_str(raw: &str) -> Result<Self, InfraError> {
        let seed: SeedFile = toml::from_str(raw)
            .map_err(|err| InfraError::configuration(format!("invalid student seed: {err}")))?;

        let mut by_rfid = HashMap::with_capacity(seed.students.len());
        let mut rfid_by_student_id = HashMap::with_capacity(seed.students.len());

        for student in seed.students {
            let rfid = student.record.rfid.trim().to_string();
            let student_id = student.record.student_id.trim().to_string();
            if rfid.is_empty() || student_id.is_empty() {
                return Err(InfraError::configuration(
                    "student seed entries need both `rfid` and `student_id`",
                ));
            }
            if rfid_by_student_id
                .insert(student_id.clone(), rfid.clone())
                .is_some()
            {
                return Err(InfraError::configuration(format!(
                    "duplicate student_id `{student_id}` in student seed"
                )));
            }
            if by_rfid.insert(rfid.clone(), student).is_some() {
                return Err(InfraError::configuration(format!(
                    "duplicate rfid `{rfid}` in student seed"
                )));
            }
        }

        Ok(Self {
            term: seed.term,
            by_rfid,
            rfid_by_student_id,
        })
    }

    pub fn load(path: &Path) -> Result<Self, InfraError> {
        let raw = std::fs::read_to_string(path)?;
        let directory = Self::from_toml_str(&raw)?;
        info!(
            target = "rfidsystem::infra::directory",
            path = %path.display(),
            students = directory.len(),
            academic_year = directory.term.academic_year.as_str(),
            semester = directory.term.semester.as_str(),
            "student directory loaded"
        );
        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.by_rfid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_rfid.is_empty()
    }

    pub fn current_term(&self) -> &AcademicTerm {
        &self.term
    }

    fn by_student_id(&self, student_id: &str) -> Option<&SeedStudent> {
        self.rfid_by_student_id
            .get(student_id)
            .and_then(|rfid| self.by_rfid.get(rfid))
    }

    fn sheet(&self, student: &SeedStudent, semester: &str) -> GradeSheet {
        GradeSheet {
            student: Some(student.record.clone()),
            term: AcademicTerm {
                academic_year: self.term.academic_year.clone(),
                semester: semester.to_string(),
            },
            grades: student.grades_for(&self.term.academic_year, semester),
        }
    }
}

#[async_trait]
impl StudentsRepo for SeededDirectory {
    async fn find_student_info(&self, rfid: &str) -> Result<Option<StudentInfo>, RepoError> {
        Ok(self.by_rfid.get(rfid).map(|student| StudentInfo {
            student: Some(student.record.clone()),
            grades_summary: student.grades_summary(),
            assessment: student.assessment.clone(),
            payment_schedules: student.payment_schedules.clone(),
        }))
    }

    async fn find_current_grades(&self, rfid: &str) -> Result<Option<GradeSheet>, RepoError> {
        Ok(self
            .by_rfid
            .get(rfid)
            .map(|student| self.sheet(student, &self.term.semester)))
    }

    async fn find_semester_grades(
        &self,
        student_id: &str,
        semester: &str,
    ) -> Result<Option<GradeSheet>, RepoError> {
        if semester != FIRST_SEMESTER && semester != SECOND_SEMESTER {
            return Err(RepoError::InvalidInput {
                message: format!("unknown semester `{semester}`"),
            });
        }

        Ok(self
            .by_student_id(student_id)
            .map(|student| self.sheet(student, semester)))
    }

    async fn find_bill(&self, rfid: &str) -> Result<Option<BillSummary>, RepoError> {
        Ok(self.by_rfid.get(rfid).map(|student| BillSummary {
            student: Some(student.record.clone()),
            assessment: student.assessment.clone(),
            fee_breakdown: student.fees.clone(),
            payment_history: student.payments.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &str = r#"
[term]
academic_year = "2024-2025"
semester = "Second Semester"

[[students]]
student_id = "2023-001"
rfid = "ACLC-2023-001"
first_name = "Maria"
last_name = "Reyes"
year_level = 2

[students.assessment]
assessment_number = 1001
total_fee_amount = 25000
net_assessment_amount = 25000
remaining_balance = 10000

[[students.grades]]
academic_year = "2023-2024"
semester = "First Semester"
subject_code = "IT101"
subject_name = "Introduction to Computing"
final_grade = 1.5

[[students.grades]]
academic_year = "2024-2025"
semester = "Second Semester"
subject_code = "IT202"
subject_name = "Data Structures"
final_grade = 2.0

[[students]]
student_id = "2024-014"
rfid = "ACLC-2024-014"
"#;

    fn directory() -> SeededDirectory {
        SeededDirectory::from_toml_str(SEED).expect("seed parses")
    }

    #[tokio::test]
    async fn known_card_resolves_with_summary() {
        let info = directory()
            .find_student_info("ACLC-2023-001")
            .await
            .expect("lookup succeeds")
            .expect("card known");

        assert!(info.is_complete());
        assert_eq!(info.grades_summary.len(), 2);
        assert_eq!(info.grades_summary[0].year_name, "2023-2024");
        assert_eq!(info.grades_summary[0].first_sem.as_deref(), Some("1.50"));
        assert_eq!(info.grades_summary[0].second_sem, None);
    }

    #[tokio::test]
    async fn unknown_card_is_none() {
        let info = directory()
            .find_student_info("NOPE")
            .await
            .expect("lookup succeeds");
        assert!(info.is_none());
    }

    #[tokio::test]
    async fn current_grades_use_the_current_term() {
        let sheet = directory()
            .find_current_grades("ACLC-2023-001")
            .await
            .expect("lookup succeeds")
            .expect("card known");

        assert_eq!(sheet.term.semester, SECOND_SEMESTER);
        assert_eq!(sheet.grades.len(), 1);
        assert_eq!(sheet.grades[0].subject_code, "IT202");
    }

    #[tokio::test]
    async fn semester_grades_are_keyed_by_student_id() {
        let directory = directory();
        let sheet = directory
            .find_semester_grades("2023-001", FIRST_SEMESTER)
            .await
            .expect("lookup succeeds")
            .expect("student known");
        assert!(sheet.grades.is_empty());

        let invalid = directory
            .find_semester_grades("2023-001", "Summer")
            .await;
        assert!(matches!(invalid, Err(RepoError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn bill_without_assessment_is_incomplete() {
        let bill = directory()
            .find_bill("ACLC-2024-014")
            .await
            .expect("lookup succeeds")
            .expect("card known");
        assert!(!bill.is_complete());
    }

    #[test]
    fn duplicate_cards_are_rejected() {
        let seed = r#"
[term]
academic_year = "2024-2025"
semester = "First Semester"

[[students]]
student_id = "1"
rfid = "CARD"

[[students]]
student_id = "2"
rfid = "CARD"
"#;
        let err = SeededDirectory::from_toml_str(seed).expect_err("duplicate rfid");
        assert!(err.to_string().contains("duplicate rfid"));
    }
}
