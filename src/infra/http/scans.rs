use axum::{
    body::Body,
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};

use crate::{application::error::AppError, hub::stream::live_frames};

use super::{HttpState, forms::RfidForm, middleware::tag_card};

pub(super) async fn card_scan(State(state): State<HttpState>, RfidForm(rfid): RfidForm) -> Response {
    let response = match state.scans.ingest(&rfid).await {
        Ok(_) => "Processing".into_response(),
        Err(err) => err.into_response(),
    };
    tag_card(response, &rfid)
}

/// Long-lived event stream for one dashboard.
pub(super) async fn event_stream(State(state): State<HttpState>) -> Result<Response, AppError> {
    let subscriber = state.hub.subscribe().await?;
    let heartbeat = state.hub.config().heartbeat_interval;

    let body = Body::from_stream(live_frames(subscriber, heartbeat));
    Ok((
        [
            (CONTENT_TYPE, "text/event-stream"),
            (CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response())
}
