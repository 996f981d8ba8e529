use crate::application::error::HttpError;
use crate::domain::entities::{
    Assessment, BillSummary, GradeSheet, StudentInfo, StudentRecord, format_amount, format_grade,
};
use crate::domain::scan_log::{LogStats, ScanLogEntry};
use askama::{Error as AskamaError, Template};
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use time::{OffsetDateTime, macros::format_description};

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }
}

impl From<TemplateRenderError> for HttpError {
    fn from(err: TemplateRenderError) -> Self {
        let TemplateRenderError {
            source,
            public_message,
            error,
        } = err;

        HttpError::from_error(
            source,
            StatusCode::INTERNAL_SERVER_ERROR,
            public_message,
            &error,
        )
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, HttpError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
        .into()
    })
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Render a fragment destined for the event stream.
pub fn render_fragment<T: Template>(template: T) -> Result<String, TemplateRenderError> {
    template
        .render()
        .map(|html| html.trim_end().to_string())
        .map_err(|err| {
            TemplateRenderError::new(
                "presentation::views::render_fragment",
                "Fragment rendering failed",
                err,
            )
        })
}

/// `{"rfid": ...}` encoded for a single-quoted HTML attribute.
pub fn rfid_hx_vals(rfid: &str) -> String {
    json!({ "rfid": rfid })
        .to_string()
        .replace('&', "&amp;")
        .replace('\'', "&#39;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Instruction telling the dashboard to load the student partial for a card.
#[derive(Template)]
#[template(path = "partials/student_callback.html")]
pub struct StudentCallbackTemplate {
    pub hx_vals: String,
}

impl StudentCallbackTemplate {
    pub fn for_rfid(rfid: &str) -> Self {
        Self {
            hx_vals: rfid_hx_vals(rfid),
        }
    }
}

#[derive(Template)]
#[template(path = "partials/scan_error.html")]
pub struct ScanErrorTemplate {
    pub title: &'static str,
    pub message: String,
}

#[derive(Clone)]
pub struct AssessmentView {
    pub total_fee: String,
    pub total_discount: String,
    pub net_amount: String,
    pub total_paid: String,
    pub remaining_balance: String,
}

impl From<&Assessment> for AssessmentView {
    fn from(assessment: &Assessment) -> Self {
        Self {
            total_fee: format_amount(assessment.total_fee_amount),
            total_discount: format_amount(assessment.total_discount_amount),
            net_amount: format_amount(assessment.net_assessment_amount),
            total_paid: format_amount(assessment.total_payment_amount),
            remaining_balance: format_amount(assessment.remaining_balance),
        }
    }
}

#[derive(Clone)]
pub struct YearSummaryView {
    pub year_name: String,
    pub first_sem: String,
    pub second_sem: String,
}

#[derive(Clone)]
pub struct ScheduleView {
    pub term_description: String,
    pub due_date: String,
    pub amount: String,
}

#[derive(Clone)]
pub struct StudentInfoView {
    pub student_id: String,
    pub name: String,
    pub program: Option<String>,
    pub year_level: Option<String>,
    pub block_section: Option<String>,
    pub hx_vals: String,
    pub grades_summary: Vec<YearSummaryView>,
    pub assessment: Option<AssessmentView>,
    pub schedules: Vec<ScheduleView>,
}

impl StudentInfoView {
    /// `None` when the info carries no student.
    pub fn build(info: &StudentInfo) -> Option<Self> {
        let student = info.student.as_ref()?;

        let grades_summary = info
            .grades_summary
            .iter()
            .map(|year| YearSummaryView {
                year_name: year.year_name.clone(),
                first_sem: year.first_sem.clone().unwrap_or_else(|| "-".to_string()),
                second_sem: year.second_sem.clone().unwrap_or_else(|| "-".to_string()),
            })
            .collect();

        let mut schedules: Vec<_> = info
            .payment_schedules
            .iter()
            .filter(|schedule| !schedule.is_initial_payment())
            .collect();
        schedules.sort_by_key(|schedule| schedule.sort_order);

        Some(Self {
            student_id: student.student_id.clone(),
            name: student.display_name(),
            program: student.program.clone(),
            year_level: student.year_level_label(),
            block_section: student.block_section.clone(),
            hx_vals: rfid_hx_vals(&student.rfid),
            grades_summary,
            assessment: info.assessment.as_ref().map(AssessmentView::from),
            schedules: schedules
                .into_iter()
                .map(|schedule| ScheduleView {
                    term_description: schedule.term_description.clone(),
                    due_date: schedule.due_date.clone(),
                    amount: format_amount(schedule.expected_amount),
                })
                .collect(),
        })
    }
}

#[derive(Template)]
#[template(path = "partials/student_info.html")]
pub struct StudentInfoTemplate {
    pub view: StudentInfoView,
}

#[derive(Clone)]
pub struct GradeRowView {
    pub subject_code: String,
    pub subject_name: String,
    pub prelim: String,
    pub midterm: String,
    pub prefinal: String,
    pub final_term: String,
    pub final_grade: String,
}

#[derive(Clone)]
pub struct GradesView {
    pub student_id: String,
    pub name: String,
    pub academic_year: String,
    pub semester: String,
    pub second_semester_available: bool,
    pub rows: Vec<GradeRowView>,
    pub gwa: String,
}

impl GradesView {
    /// `None` when the sheet carries no student.
    pub fn build(sheet: &GradeSheet) -> Option<Self> {
        let student: &StudentRecord = sheet.student.as_ref()?;

        let rows = sheet
            .grades
            .iter()
            .map(|grade| GradeRowView {
                subject_code: grade.subject_code.clone(),
                subject_name: grade.subject_name.clone(),
                prelim: format_grade(grade.prelim_grade),
                midterm: format_grade(grade.midterm_grade),
                prefinal: format_grade(grade.prefinal_grade),
                final_term: format_grade(grade.final_term_grade),
                final_grade: format_grade(grade.final_grade),
            })
            .collect();

        Some(Self {
            student_id: student.student_id.clone(),
            name: student.display_name(),
            academic_year: sheet.term.academic_year.clone(),
            semester: sheet.term.semester.clone(),
            second_semester_available: !sheet.term.is_first_semester(),
            rows,
            gwa: sheet
                .general_weighted_average()
                .map(|gwa| format!("{gwa:.2}"))
                .unwrap_or_else(|| "N/A".to_string()),
        })
    }
}

#[derive(Template)]
#[template(path = "partials/grades.html")]
pub struct GradesTemplate {
    pub view: GradesView,
}

#[derive(Template)]
#[template(path = "partials/grades_table.html")]
pub struct GradesTableTemplate {
    pub view: GradesView,
}

#[derive(Clone)]
pub struct FeeRowView {
    pub category: String,
    pub name: String,
    pub amount: String,
}

#[derive(Clone)]
pub struct PaymentRowView {
    pub date: String,
    pub description: String,
    pub method: String,
    pub reference: String,
    pub amount: String,
}

#[derive(Clone)]
pub struct BillView {
    pub student_id: String,
    pub name: String,
    pub assessment: AssessmentView,
    pub fees: Vec<FeeRowView>,
    pub payments: Vec<PaymentRowView>,
}

impl BillView {
    /// `None` unless both the student and the assessment are present.
    pub fn build(bill: &BillSummary) -> Option<Self> {
        let student = bill.student.as_ref()?;
        let assessment = bill.assessment.as_ref()?;

        Some(Self {
            student_id: student.student_id.clone(),
            name: student.display_name(),
            assessment: AssessmentView::from(assessment),
            fees: bill
                .fee_breakdown
                .iter()
                .map(|fee| FeeRowView {
                    category: fee.category.clone(),
                    name: fee.name.clone(),
                    amount: format_amount(fee.amount),
                })
                .collect(),
            payments: bill
                .payment_history
                .iter()
                .map(|payment| PaymentRowView {
                    date: payment.payment_date.clone(),
                    description: payment.description.clone().unwrap_or_default(),
                    method: payment.payment_method.clone().unwrap_or_default(),
                    reference: payment.reference_number.clone().unwrap_or_default(),
                    amount: format_amount(payment.amount),
                })
                .collect(),
        })
    }
}

#[derive(Template)]
#[template(path = "partials/bills.html")]
pub struct BillTemplate {
    pub view: BillView,
}

#[derive(Clone)]
pub struct LogRowView {
    pub id: u64,
    pub timestamp: String,
    pub card_id: String,
    pub student_id: String,
    pub event_type: &'static str,
    pub status: &'static str,
    pub message: String,
}

impl From<&ScanLogEntry> for LogRowView {
    fn from(entry: &ScanLogEntry) -> Self {
        Self {
            id: entry.id,
            timestamp: format_timestamp(entry.timestamp),
            card_id: entry.card_id.clone(),
            student_id: entry.student_id.clone().unwrap_or_default(),
            event_type: entry.kind.as_str(),
            status: entry.status().as_str(),
            message: entry.message.clone(),
        }
    }
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    ))
    .unwrap_or_default()
}

#[derive(Template)]
#[template(path = "partials/log_list.html")]
pub struct LogListTemplate {
    pub rows: Vec<LogRowView>,
}

impl LogListTemplate {
    pub fn from_entries(entries: &[ScanLogEntry]) -> Self {
        Self {
            rows: entries.iter().map(LogRowView::from).collect(),
        }
    }
}

pub struct StatsView {
    pub total: usize,
    pub errors: usize,
    pub warnings: usize,
    pub rate: String,
}

impl From<&LogStats> for StatsView {
    fn from(stats: &LogStats) -> Self {
        Self {
            total: stats.total,
            errors: stats.failures,
            warnings: stats.warnings,
            rate: format!("{:.2}", stats.rate_per_second),
        }
    }
}

#[derive(Template)]
#[template(path = "partials/stats.html")]
pub struct StatsTemplate {
    pub view: StatsView,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_fragment_targets_student_partial() {
        let html = render_fragment(StudentCallbackTemplate::for_rfid("ACLC-2023-001"))
            .expect("fragment renders");

        assert_eq!(
            html,
            r##"<div hx-post="/student-partial" hx-vals='{"rfid":"ACLC-2023-001"}' hx-trigger="load" hx-swap="innerHTML" hx-target="#student-data-container"></div>"##
        );
    }

    #[test]
    fn hx_vals_escapes_attribute_breakers() {
        assert_eq!(
            rfid_hx_vals("a'b<c>&"),
            r#"{"rfid":"a&#39;b&lt;c&gt;&amp;"}"#
        );
    }

    #[test]
    fn error_fragment_escapes_message() {
        let html = render_fragment(ScanErrorTemplate {
            title: "Student not found",
            message: "No student for card <script>".to_string(),
        })
        .expect("fragment renders");

        assert!(html.contains("Student not found"));
        assert!(html.contains("&#60;script&#62;"));
        assert!(!html.contains("<script>"));
        assert!(!html.contains('\n'));
    }

    #[test]
    fn log_rows_render_newest_first_with_status() {
        use crate::domain::scan_log::ScanEventKind;
        use time::macros::datetime;

        let entries = vec![
            ScanLogEntry {
                id: 2,
                timestamp: datetime!(2025-03-10 08:15:02 UTC),
                card_id: "UNKNOWN".to_string(),
                student_id: None,
                kind: ScanEventKind::StudentNotFound,
                message: "Student not found: UNKNOWN".to_string(),
            },
            ScanLogEntry {
                id: 1,
                timestamp: datetime!(2025-03-10 08:15:00 UTC),
                card_id: "ACLC-2023-001".to_string(),
                student_id: Some("2023-001".to_string()),
                kind: ScanEventKind::CardScanned,
                message: "Card scanned for student ID 2023-001".to_string(),
            },
        ];

        let html = LogListTemplate::from_entries(&entries)
            .render()
            .expect("log list renders");

        assert!(html.contains("2025-03-10 08:15:02"));
        assert!(html.contains(r#"data-status="warning""#));
        let unknown = html.find("UNKNOWN").expect("warning row");
        let scanned = html.find("ACLC-2023-001").expect("success row");
        assert!(unknown < scanned);
    }

    #[test]
    fn empty_log_renders_placeholder_row() {
        let html = LogListTemplate { rows: Vec::new() }
            .render()
            .expect("log list renders");
        assert!(html.contains("No log entries"));
    }

    #[test]
    fn stats_rate_uses_two_decimals() {
        let view = StatsView::from(&LogStats {
            total: 4,
            failures: 1,
            warnings: 2,
            rate_per_second: 1.0 / 3.0,
        });
        assert_eq!(view.rate, "0.33");

        let html = StatsTemplate { view }.render().expect("stats render");
        assert!(html.contains(r#"id="total-logs">4<"#));
        assert!(html.contains(r#"id="error-logs">1<"#));
        assert!(html.contains(r#"id="warning-logs">2<"#));
    }
}
