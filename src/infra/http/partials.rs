//! Dashboard fragments loaded by htmx after a scan.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    application::error::AppError,
    presentation::views::{
        BillTemplate, BillView, GradesTableTemplate, GradesTemplate, GradesView,
        StudentInfoTemplate, StudentInfoView, render_template_response,
    },
};

use super::{HttpState, forms::RfidForm, middleware::tag_card};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct GradesQuery {
    #[serde(rename = "student-id")]
    student_id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct SemesterQuery {
    semester: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct BillsQuery {
    rfid: String,
}

pub(super) async fn student_partial(
    State(state): State<HttpState>,
    RfidForm(rfid): RfidForm,
) -> Response {
    student_info(&state, &rfid).await
}

pub(super) async fn student_partial_by_path(
    State(state): State<HttpState>,
    Path(rfid): Path<String>,
) -> Response {
    student_info(&state, &rfid).await
}

async fn student_info(state: &HttpState, rfid: &str) -> Response {
    tag_card(render_student_info(state, rfid).await, rfid)
}

async fn render_student_info(state: &HttpState, rfid: &str) -> Response {
    let cached = match state.lookups.student_info(rfid).await {
        Ok(cached) => cached,
        Err(err) => return err.into_response(),
    };

    match StudentInfoView::build(&cached.value) {
        Some(view) => render_template_response(StudentInfoTemplate { view }, StatusCode::OK),
        None => AppError::not_found("Student not found").into_response(),
    }
}

pub(super) async fn grades(State(state): State<HttpState>, RfidForm(rfid): RfidForm) -> Response {
    current_grades(&state, &rfid).await
}

pub(super) async fn grades_by_query(
    State(state): State<HttpState>,
    Query(query): Query<GradesQuery>,
) -> Response {
    current_grades(&state, &query.student_id).await
}

async fn current_grades(state: &HttpState, rfid: &str) -> Response {
    tag_card(render_current_grades(state, rfid).await, rfid)
}

async fn render_current_grades(state: &HttpState, rfid: &str) -> Response {
    let cached = match state.lookups.current_grades(rfid).await {
        Ok(cached) => cached,
        Err(err) => return err.into_response(),
    };

    match GradesView::build(&cached.value) {
        Some(view) => render_template_response(GradesTemplate { view }, StatusCode::OK),
        None => AppError::not_found("Student not found").into_response(),
    }
}

pub(super) async fn semester_grades(
    State(state): State<HttpState>,
    Path(student_id): Path<String>,
    Query(query): Query<SemesterQuery>,
) -> Response {
    let cached = match state
        .lookups
        .semester_grades(&student_id, &query.semester)
        .await
    {
        Ok(cached) => cached,
        Err(err) => return err.into_response(),
    };

    match GradesView::build(&cached.value) {
        Some(mut view) => {
            view.semester = query.semester.trim().to_string();
            render_template_response(GradesTableTemplate { view }, StatusCode::OK)
        }
        None => AppError::not_found("Grades not found").into_response(),
    }
}

pub(super) async fn bills(State(state): State<HttpState>, RfidForm(rfid): RfidForm) -> Response {
    bill(&state, &rfid).await
}

pub(super) async fn bills_by_query(
    State(state): State<HttpState>,
    Query(query): Query<BillsQuery>,
) -> Response {
    bill(&state, &query.rfid).await
}

async fn bill(state: &HttpState, rfid: &str) -> Response {
    tag_card(render_bill(state, rfid).await, rfid)
}

async fn render_bill(state: &HttpState, rfid: &str) -> Response {
    let cached = match state.lookups.bill(rfid).await {
        Ok(cached) => cached,
        Err(err) => return err.into_response(),
    };

    match BillView::build(&cached.value) {
        Some(view) => render_template_response(BillTemplate { view }, StatusCode::OK),
        None => AppError::not_found("No assessment found").into_response(),
    }
}
