use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, Extensions, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::convert::Infallible;
use std::fmt::Display;
use tracing::{error, warn};

use super::middleware::request_context::correlation_id;
use crate::errors::Exception;
use crate::metrics::HTTP_EXCEPTIONS_TOTAL;
use crate::response::{render, Envelope, RenderError, ResponseFormat};

/// Turns envelopes into HTTP responses for the current request.
///
/// Extracted in handlers; carries the correlation id set by the request
/// context middleware and the representation negotiated from `Accept`.
///
/// ```ignore
/// async fn get_user(respond: Responder, Path(id): Path<i64>) -> Response {
///     match find_user(id).await {
///         Ok(user) => respond.data(&user),
///         Err(exc) => respond.exception(exc),
///     }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct Responder {
    request_id: String,
    format: ResponseFormat,
}

impl Responder {
    pub fn new(request_id: impl Into<String>, format: ResponseFormat) -> Self {
        Self {
            request_id: request_id.into(),
            format,
        }
    }

    pub fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let accept = headers
            .get(header::ACCEPT)
            .and_then(|value| value.to_str().ok());
        Self::new(correlation_id(extensions), ResponseFormat::negotiate(accept))
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn format(&self) -> ResponseFormat {
        self.format
    }

    /// Attach the correlation id, render and set status and content type
    pub fn envelope(&self, envelope: Envelope) -> Response {
        let envelope = envelope.with_request_id(self.request_id.clone());
        let status =
            StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match render(&envelope, self.format) {
            Ok(body) => (
                status,
                [(header::CONTENT_TYPE, self.format.content_type())],
                body,
            )
                .into_response(),
            Err(e) => self.render_failure(e),
        }
    }

    /// Answer with an internal envelope in JSON, which always renders
    fn render_failure(&self, e: RenderError) -> Response {
        error!(request_id = %self.request_id, error = %e, "Failed to render response");

        let envelope = Envelope::from_exception(
            &Exception::internal("failed to render response").with_cause(e),
        )
        .with_request_id(self.request_id.clone());

        (StatusCode::INTERNAL_SERVER_ERROR, Json(envelope)).into_response()
    }

    pub fn success(&self) -> Response {
        self.envelope(Envelope::success())
    }

    pub fn created(&self) -> Response {
        self.envelope(Envelope::created())
    }

    pub fn data<T: Serialize>(&self, payload: &T) -> Response {
        match serde_json::to_value(payload) {
            Ok(data) => self.envelope(Envelope::with_data(data)),
            Err(e) => self.exception(
                Exception::internal("failed to serialize response data").with_cause(e),
            ),
        }
    }

    pub fn exception(&self, exc: Exception) -> Response {
        record_exception(&self.request_id, &exc);
        self.envelope(Envelope::from_exception(&exc))
    }

    pub fn bad_request(&self, message: impl Into<String>, cause: Option<&dyn Display>) -> Response {
        self.envelope(Envelope::bad_request(message, cause))
    }
}

fn record_exception(request_id: &str, exc: &Exception) {
    HTTP_EXCEPTIONS_TOTAL
        .with_label_values(&[exc.kind().code()])
        .inc();

    let cause = exc.cause().map(|c| c.to_string()).unwrap_or_default();
    if exc.status_code() >= 500 {
        error!(request_id = %request_id, kind = %exc.kind(), cause = %cause, "{}", exc.message());
    } else {
        warn!(request_id = %request_id, kind = %exc.kind(), "{}", exc.message());
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Responder
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(&parts.headers, &parts.extensions))
    }
}

/// Renders a provisional JSON envelope and keeps the exception in the response
/// extensions so `shape_exceptions` can redo it for the actual request.
impl IntoResponse for Exception {
    fn into_response(self) -> Response {
        let mut response = Responder::default().envelope(Envelope::from_exception(&self));
        response.extensions_mut().insert(self);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FieldErrors;
    use serde_json::{json, Value};

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_data_response_carries_request_id() {
        let responder = Responder::new("req-7", ResponseFormat::Json);
        let response = responder.data(&json!({"id": 1}));

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(body["request_id"], "req-7");
        assert_eq!(body["data"]["id"], 1);
        assert!(body["error"].is_null());
    }

    #[tokio::test]
    async fn test_exception_sets_http_status() {
        let responder = Responder::new("req-8", ResponseFormat::Json);
        let mut fields = FieldErrors::new();
        fields.insert("email".to_string(), "invalid".to_string());

        let response = responder.exception(Exception::invalid_parameter("bad input", fields));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"]["error_code"], "INVALID_PARAMETER");
        assert_eq!(body["error"]["details"], json!({"email": "invalid"}));
    }

    #[tokio::test]
    async fn test_xml_content_type() {
        let responder = Responder::new("", ResponseFormat::Xml);
        let response = responder.created();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
    }

    #[tokio::test]
    async fn test_exception_into_response_keeps_exception() {
        let response = Exception::already_exists("email taken").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let stashed = response.extensions().get::<Exception>().unwrap();
        assert_eq!(stashed.message(), "email taken");

        let body = body_json(response).await;
        assert_eq!(body["request_id"], "");
        assert_eq!(body["error"]["error_code"], "ALREADY_EXISTS");
    }

    #[tokio::test]
    async fn test_xml_exception_with_spaced_labels() {
        let responder = Responder::new("req-1", ResponseFormat::Xml);
        let mut fields = FieldErrors::new();
        fields.insert("Email Address".to_string(), "Email Address is required".to_string());
        fields.insert("1".to_string(), "1 must be numeric".to_string());

        let response = responder.exception(Exception::invalid_parameter("bad input", fields));
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(xml.contains("<request_id>req-1</request_id>"));
        assert!(xml.contains("<error_code>INVALID_PARAMETER</error_code>"));
        assert!(xml.contains("<field name=\"Email Address\">Email Address is required</field>"));
        assert!(xml.contains("<field name=\"1\">1 must be numeric</field>"));
    }

    #[tokio::test]
    async fn test_xml_data_with_numeric_keys() {
        let responder = Responder::new("req-2", ResponseFormat::Xml);
        let response = responder.data(&json!({"1": "a", "user id": 1}));
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let xml = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(xml.contains("<field name=\"1\">a</field>"));
        assert!(xml.contains("<field name=\"user id\">1</field>"));
    }

    #[tokio::test]
    async fn test_render_failure_is_an_internal_envelope() {
        let responder = Responder::new("req-9", ResponseFormat::Xml);
        let response = responder.render_failure(RenderError::Xml("writer closed".to_string()));

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/json"
        );

        let body = body_json(response).await;
        assert_eq!(body["request_id"], "req-9");
        assert_eq!(body["status_code"], 500);
        assert_eq!(body["message"], "failed to render response");
        assert_eq!(body["error"]["error_code"], "INTERNAL_ERROR");
        assert_eq!(
            body["error"]["details"],
            "failed to render XML envelope: writer closed"
        );
    }

    #[test]
    fn test_from_parts_without_context() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, "application/xml".parse().unwrap());

        let responder = Responder::from_parts(&headers, &Extensions::new());
        assert_eq!(responder.request_id(), "");
        assert_eq!(responder.format(), ResponseFormat::Xml);
    }
}
