use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Method, Request, Uri},
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

const UNMATCHED_ROUTE: &str = "unmatched";

#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
}

/// Card a handler acted on, carried to the response log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardContext(pub String);

/// Attach the scanned card to `response` for the response log.
pub fn tag_card(mut response: Response, rfid: &str) -> Response {
    let rfid = rfid.trim();
    if !rfid.is_empty() {
        response
            .extensions_mut()
            .insert(CardContext(rfid.to_string()));
    }
    response
}

/// Tag the request with an id, echoing it back in `x-request-id`.
pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let ctx = RequestContext {
        request_id: request_id.clone(),
    };
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response.extensions_mut().insert(ctx);
    response
}

struct Diagnostics {
    source: &'static str,
    detail: String,
    chain: Vec<String>,
}

impl Diagnostics {
    fn take(response: &mut Response) -> Self {
        let (source, chain) = match response.extensions_mut().remove::<ErrorReport>() {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = chain
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());
        Self {
            source,
            detail,
            chain,
        }
    }
}

/// Request facts captured before the handler consumes the request.
struct RequestLine {
    method: Method,
    uri: Uri,
    route: String,
    request_id: String,
    started: Instant,
}

impl RequestLine {
    fn capture(request: &Request<Body>) -> Self {
        Self {
            method: request.method().clone(),
            uri: request.uri().clone(),
            route: request
                .extensions()
                .get::<MatchedPath>()
                .map(|path| path.as_str().to_string())
                .unwrap_or_else(|| UNMATCHED_ROUTE.to_string()),
            request_id: request
                .extensions()
                .get::<RequestContext>()
                .map(|ctx| ctx.request_id.clone())
                .unwrap_or_default(),
            started: Instant::now(),
        }
    }
}

fn card_of(response: &Response) -> String {
    response
        .extensions()
        .get::<CardContext>()
        .map(|card| card.0.clone())
        .unwrap_or_default()
}

/// Log every response; failures carry the diagnostic chain attached by the handler.
pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let line = RequestLine::capture(&request);

    let mut response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = line.started.elapsed().as_millis();
    let rfid = card_of(&response);

    if !(status.is_client_error() || status.is_server_error()) {
        debug!(
            target = "rfidsystem::http::response",
            status = status.as_u16(),
            method = %line.method,
            route = line.route.as_str(),
            elapsed_ms = elapsed_ms,
            rfid = rfid.as_str(),
            request_id = line.request_id.as_str(),
            "request completed",
        );
        return response;
    }

    let diagnostics = Diagnostics::take(&mut response);
    if status.is_server_error() {
        error!(
            target = "rfidsystem::http::response",
            status = status.as_u16(),
            method = %line.method,
            route = line.route.as_str(),
            path = %line.uri.path(),
            query = line.uri.query().unwrap_or(""),
            elapsed_ms = elapsed_ms,
            rfid = rfid.as_str(),
            source = diagnostics.source,
            detail = %diagnostics.detail,
            chain = ?diagnostics.chain,
            request_id = line.request_id.as_str(),
            "request failed",
        );
    } else {
        warn!(
            target = "rfidsystem::http::response",
            status = status.as_u16(),
            method = %line.method,
            route = line.route.as_str(),
            path = %line.uri.path(),
            query = line.uri.query().unwrap_or(""),
            elapsed_ms = elapsed_ms,
            rfid = rfid.as_str(),
            source = diagnostics.source,
            detail = %diagnostics.detail,
            chain = ?diagnostics.chain,
            request_id = line.request_id.as_str(),
            "client request error",
        );
    }

    response
}
