//! Scan log fragments for the admin dashboard.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::{
    application::{error::AppError, scan_log::parse_filter},
    presentation::views::{LogListTemplate, StatsTemplate, StatsView, render_template_response},
};

use super::HttpState;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(super) struct LogQuery {
    search: String,
    level: String,
    #[serde(rename = "startDate")]
    start_date: String,
    #[serde(rename = "endDate")]
    end_date: String,
}

pub(super) async fn log_partial(
    State(state): State<HttpState>,
    Query(query): Query<LogQuery>,
) -> Result<Response, AppError> {
    let filter = parse_filter(
        &query.search,
        &query.level,
        &query.start_date,
        &query.end_date,
    )?;
    let entries = state.scan_logs.entries(&filter).await?;
    Ok(render_template_response(
        LogListTemplate::from_entries(&entries),
        StatusCode::OK,
    ))
}

pub(super) async fn stats_partial(State(state): State<HttpState>) -> Result<Response, AppError> {
    let stats = state.scan_logs.stats().await?;
    Ok(render_template_response(
        StatsTemplate {
            view: StatsView::from(&stats),
        },
        StatusCode::OK,
    ))
}

pub(super) async fn clear_logs(State(state): State<HttpState>) -> Result<Response, AppError> {
    state.scan_logs.clear().await?;
    Ok(StatusCode::NO_CONTENT.into_response())
}
