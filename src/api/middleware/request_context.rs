use axum::{
    extract::{ConnectInfo, Request},
    http::{header, Extensions, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Caller-supplied ids longer than this are replaced with a generated one
const MAX_REQUEST_ID_LENGTH: usize = 64;

/// Per-request values shared with handlers, logs and response envelopes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    pub request_id: String,
    pub trace_id: String,
    pub tenant_id: Option<String>,
    pub host: String,
    pub client_ip: Option<String>,
    pub lang: String,
}

impl RequestContext {
    /// Derive the context from request headers and connection info
    pub fn from_parts(headers: &HeaderMap, extensions: &Extensions) -> Self {
        let request_id = header_str(headers, REQUEST_ID_HEADER)
            .filter(|id| id.len() <= MAX_REQUEST_ID_LENGTH)
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let trace_id = header_str(headers, TRACE_ID_HEADER)
            .map(str::to_string)
            .unwrap_or_else(|| request_id.clone());

        let client_ip = extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .or_else(|| {
                header_str(headers, FORWARDED_FOR_HEADER)
                    .and_then(|value| value.split(',').next())
                    .map(|ip| ip.trim().to_string())
            });

        Self {
            request_id,
            trace_id,
            tenant_id: header_str(headers, TENANT_ID_HEADER).map(str::to_string),
            host: header_str(headers, header::HOST.as_str())
                .unwrap_or_default()
                .to_string(),
            client_ip,
            lang: header_str(headers, header::ACCEPT_LANGUAGE.as_str())
                .unwrap_or_default()
                .to_string(),
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Correlation id of the current request, or an empty string outside the middleware
pub fn correlation_id(extensions: &Extensions) -> String {
    extensions
        .get::<RequestContext>()
        .map(|ctx| ctx.request_id.clone())
        .unwrap_or_default()
}

/// Middleware populating [`RequestContext`] and echoing the request id back
pub async fn request_context(mut request: Request, next: Next) -> Response {
    let ctx = RequestContext::from_parts(request.headers(), request.extensions());
    let request_id = ctx.request_id.clone();
    request.extensions_mut().insert(ctx);

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
