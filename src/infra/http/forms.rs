use axum::{
    Form, Json,
    extract::{FromRequest, Request},
    http::{StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::application::error::HttpError;

const SOURCE: &str = "infra::http::forms::RfidForm";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RfidPayload {
    rfid: String,
}

/// The `rfid` field of a form-encoded or JSON body.
///
/// Bodies of any other content type yield an empty card so the handler can
/// answer with its own validation message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfidForm(pub String);

impl<S> FromRequest<S> for RfidForm
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("application/json") {
            let Json(payload) = Json::<RfidPayload>::from_request(req, state)
                .await
                .map_err(|err| malformed(&err))?;
            return Ok(Self(payload.rfid));
        }

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(payload) = Form::<RfidPayload>::from_request(req, state)
                .await
                .map_err(|err| malformed(&err))?;
            return Ok(Self(payload.rfid));
        }

        Ok(Self(String::new()))
    }
}

fn malformed(err: &dyn std::error::Error) -> Response {
    HttpError::from_error(
        SOURCE,
        StatusCode::BAD_REQUEST,
        "Malformed request body",
        err,
    )
    .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;

    use super::*;

    async fn extract(content_type: Option<&str>, body: &'static str) -> Result<RfidForm, Response> {
        let mut builder = Request::builder().method("POST").uri("/card-scan");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder.body(Body::from(body)).expect("request");
        RfidForm::from_request(request, &()).await
    }

    #[tokio::test]
    async fn reads_json_bodies() {
        let form = extract(Some("application/json"), r#"{"rfid":"ACLC-2023-001"}"#)
            .await
            .expect("json accepted");
        assert_eq!(form.0, "ACLC-2023-001");
    }

    #[tokio::test]
    async fn reads_form_bodies() {
        let form = extract(
            Some("application/x-www-form-urlencoded"),
            "rfid=ACLC-2023-001",
        )
        .await
        .expect("form accepted");
        assert_eq!(form.0, "ACLC-2023-001");
    }

    #[tokio::test]
    async fn missing_field_and_unknown_types_yield_blank_card() {
        let form = extract(Some("application/json"), "{}")
            .await
            .expect("json accepted");
        assert!(form.0.is_empty());

        let form = extract(None, "rfid=ignored").await.expect("accepted");
        assert!(form.0.is_empty());
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let rejection = extract(Some("application/json"), "{not json")
            .await
            .expect_err("rejected");
        assert_eq!(rejection.status(), StatusCode::BAD_REQUEST);
    }
}
