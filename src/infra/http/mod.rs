mod forms;
mod logs;
mod middleware;
mod partials;
mod scans;

use std::sync::Arc;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};

use crate::{
    application::{lookup::LookupService, scan::ScanService, scan_log::ScanLogService},
    hub::EventHub,
};

pub use forms::RfidForm;
pub use middleware::{CardContext, REQUEST_ID_HEADER, RequestContext, tag_card};

use middleware::{log_responses, set_request_context};

#[derive(Clone)]
pub struct HttpState {
    pub scans: Arc<ScanService>,
    pub lookups: Arc<LookupService>,
    pub scan_logs: ScanLogService,
    pub hub: EventHub,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/card-scan", post(scans::card_scan))
        .route("/stream", get(scans::event_stream))
        .route("/student-partial", post(partials::student_partial))
        .route(
            "/student-partial/{rfid}",
            get(partials::student_partial_by_path),
        )
        .route(
            "/grades",
            post(partials::grades).get(partials::grades_by_query),
        )
        .route(
            "/grades/semester/{student_id}",
            get(partials::semester_grades),
        )
        .route("/bills", post(partials::bills).get(partials::bills_by_query))
        .route("/log/partial", get(logs::log_partial))
        .route("/log", delete(logs::clear_logs))
        .route("/stats/partial", get(logs::stats_partial))
        .route("/ping", get(ping))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}

async fn ping() -> &'static str {
    "RFID service is running"
}
