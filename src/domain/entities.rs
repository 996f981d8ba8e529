//! Student directory records and the views assembled from them.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRecord {
    pub student_id: String,
    pub rfid: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub middle_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub year_level: Option<u8>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub block_section: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl StudentRecord {
    /// "Last, First Middle" with missing parts skipped.
    pub fn display_name(&self) -> String {
        let given: Vec<&str> = [self.first_name.as_deref(), self.middle_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

        match (self.last_name.as_deref(), given.is_empty()) {
            (Some(last), false) if !last.is_empty() => format!("{last}, {}", given.join(" ")),
            (Some(last), _) if !last.is_empty() => last.to_string(),
            _ if !given.is_empty() => given.join(" "),
            _ => self.student_id.clone(),
        }
    }

    pub fn year_level_label(&self) -> Option<String> {
        self.year_level.map(year_level_label)
    }
}

/// Ordinal word for a year level: "First" through "Fourth", then "5th", "6th", ...
pub fn year_level_label(year: u8) -> String {
    match year {
        1 => "First".to_string(),
        2 => "Second".to_string(),
        3 => "Third".to_string(),
        4 => "Fourth".to_string(),
        other => format!("{other}th"),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcademicTerm {
    pub academic_year: String,
    pub semester: String,
}

impl AcademicTerm {
    pub fn is_first_semester(&self) -> bool {
        self.semester == FIRST_SEMESTER
    }
}

pub const FIRST_SEMESTER: &str = "First Semester";
pub const SECOND_SEMESTER: &str = "Second Semester";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessment_number: i64,
    pub total_fee_amount: f64,
    #[serde(default)]
    pub total_discount_amount: f64,
    pub net_assessment_amount: f64,
    #[serde(default)]
    pub total_payment_amount: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSchedule {
    pub term_description: String,
    pub due_date: String,
    pub expected_amount: f64,
    #[serde(default)]
    pub sort_order: i32,
}

impl PaymentSchedule {
    /// Initial payments are settled at enrollment and never shown as upcoming.
    pub fn is_initial_payment(&self) -> bool {
        self.term_description == "Initial Payment"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub category: String,
    pub name: String,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_date: String,
    pub amount: f64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub reference_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeRecord {
    pub subject_code: String,
    pub subject_name: String,
    #[serde(default)]
    pub prelim_grade: Option<f64>,
    #[serde(default)]
    pub midterm_grade: Option<f64>,
    #[serde(default)]
    pub prefinal_grade: Option<f64>,
    #[serde(default)]
    pub final_term_grade: Option<f64>,
    #[serde(default)]
    pub final_grade: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearGradeSummary {
    pub year_name: String,
    pub first_sem: Option<String>,
    pub second_sem: Option<String>,
}

/// Everything shown when a card is scanned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentInfo {
    pub student: Option<StudentRecord>,
    pub grades_summary: Vec<YearGradeSummary>,
    pub assessment: Option<Assessment>,
    pub payment_schedules: Vec<PaymentSchedule>,
}

impl StudentInfo {
    pub fn is_complete(&self) -> bool {
        self.student.is_some()
    }
}

/// Grades of one student for one term.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeSheet {
    pub student: Option<StudentRecord>,
    pub term: AcademicTerm,
    pub grades: Vec<GradeRecord>,
}

impl GradeSheet {
    pub fn is_complete(&self) -> bool {
        self.student.is_some()
    }

    /// Plain average of recorded final grades, or `None` when nothing is recorded yet.
    pub fn general_weighted_average(&self) -> Option<f64> {
        let finals: Vec<f64> = self
            .grades
            .iter()
            .filter_map(|grade| grade.final_grade)
            .filter(|grade| *grade != 0.0)
            .collect();

        if finals.is_empty() {
            return None;
        }
        Some(finals.iter().sum::<f64>() / finals.len() as f64)
    }
}

/// Statement of account for a student's current assessment.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BillSummary {
    pub student: Option<StudentRecord>,
    pub assessment: Option<Assessment>,
    pub fee_breakdown: Vec<FeeBreakdown>,
    pub payment_history: Vec<PaymentRecord>,
}

impl BillSummary {
    pub fn is_complete(&self) -> bool {
        self.student.is_some() && self.assessment.is_some()
    }
}

/// Two-decimal grade, or `-` for grades not yet recorded.
pub fn format_grade(grade: Option<f64>) -> String {
    match grade {
        Some(value) if value != 0.0 => format!("{value:.2}"),
        _ => "-".to_string(),
    }
}

/// Peso amount with thousands separators, e.g. `₱12,345.50`.
pub fn format_amount(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (index, digit) in whole.chars().enumerate() {
        if index > 0 && (whole.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}₱{grouped}.{fraction:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> StudentRecord {
        StudentRecord {
            student_id: "2023-001".to_string(),
            rfid: "ACLC-2023-001".to_string(),
            first_name: Some("Maria".to_string()),
            middle_name: Some("Santos".to_string()),
            last_name: Some("Reyes".to_string()),
            email: None,
            year_level: Some(2),
            program: Some("BSIT".to_string()),
            block_section: None,
            status: None,
        }
    }

    #[test]
    fn year_levels_use_words_then_ordinals() {
        assert_eq!(year_level_label(1), "First");
        assert_eq!(year_level_label(4), "Fourth");
        assert_eq!(year_level_label(5), "5th");
    }

    #[test]
    fn display_name_skips_missing_parts() {
        assert_eq!(student().display_name(), "Reyes, Maria Santos");

        let mut partial = student();
        partial.first_name = None;
        partial.middle_name = None;
        assert_eq!(partial.display_name(), "Reyes");

        partial.last_name = None;
        assert_eq!(partial.display_name(), "2023-001");
    }

    #[test]
    fn gwa_ignores_unrecorded_grades() {
        let grade = |final_grade| GradeRecord {
            subject_code: "IT101".to_string(),
            subject_name: "Programming".to_string(),
            prelim_grade: None,
            midterm_grade: None,
            prefinal_grade: None,
            final_term_grade: None,
            final_grade,
        };
        let sheet = GradeSheet {
            student: Some(student()),
            term: AcademicTerm {
                academic_year: "2024-2025".to_string(),
                semester: FIRST_SEMESTER.to_string(),
            },
            grades: vec![grade(Some(1.5)), grade(Some(2.0)), grade(None), grade(Some(0.0))],
        };

        assert_eq!(sheet.general_weighted_average(), Some(1.75));

        let empty = GradeSheet {
            grades: vec![grade(None)],
            ..sheet
        };
        assert_eq!(empty.general_weighted_average(), None);
    }

    #[test]
    fn grades_and_amounts_format_for_display() {
        assert_eq!(format_grade(Some(1.25)), "1.25");
        assert_eq!(format_grade(Some(0.0)), "-");
        assert_eq!(format_grade(None), "-");

        assert_eq!(format_amount(0.0), "₱0.00");
        assert_eq!(format_amount(950.5), "₱950.50");
        assert_eq!(format_amount(1_234_567.891), "₱1,234,567.89");
        assert_eq!(format_amount(-1500.0), "-₱1,500.00");
    }

    #[test]
    fn completeness_rules() {
        let info = StudentInfo {
            student: None,
            grades_summary: Vec::new(),
            assessment: None,
            payment_schedules: Vec::new(),
        };
        assert!(!info.is_complete());

        let bill = BillSummary {
            student: Some(student()),
            assessment: None,
            fee_breakdown: Vec::new(),
            payment_history: Vec::new(),
        };
        assert!(!bill.is_complete());
    }
}
