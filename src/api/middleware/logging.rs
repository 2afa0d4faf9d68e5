use axum::{
    extract::Request,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};

use super::request_context::RequestContext;

/// Middleware to log all HTTP requests and responses with structured data.
///
/// Everything logged while the request is handled runs inside a span carrying
/// the request, trace and tenant ids.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let ctx = request
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_default();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().unwrap_or("").to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let span = info_span!(
        "request",
        request_id = %ctx.request_id,
        trace_id = %ctx.trace_id,
        tenant_id = ctx.tenant_id.as_deref().unwrap_or(""),
    );

    async move {
        info!(
            method = %method,
            path = %path,
            query = %sanitize_query(&query),
            user_agent = %user_agent,
            client_ip = ctx.client_ip.as_deref().unwrap_or("unknown"),
            "Incoming request"
        );

        let response = next.run(request).await;

        let duration = start.elapsed();
        let status = response.status();

        if status.is_server_error() {
            error!(
                method = %method,
                path = %path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "Request failed (server error)"
            );
        } else if status.is_client_error() {
            warn!(
                method = %method,
                path = %path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "Request failed (client error)"
            );
        } else {
            info!(
                method = %method,
                path = %path,
                status = %status.as_u16(),
                duration_ms = %duration.as_millis(),
                "Request completed"
            );
        }

        response
    }
    .instrument(span)
    .await
}

/// Sanitize query parameters to hide sensitive data
fn sanitize_query(query: &str) -> String {
    if query.is_empty() {
        return String::new();
    }

    query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if is_sensitive(key) => format!("{}=***", key),
            _ => pair.to_string(),
        })
        .collect::<Vec<_>>()
        .join("&")
}

fn is_sensitive(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    ["api_key", "token", "password", "secret"]
        .iter()
        .any(|needle| key.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_query() {
        assert_eq!(sanitize_query(""), "");
        assert_eq!(sanitize_query("q=alice"), "q=alice");
        assert_eq!(sanitize_query("api_key=secret123"), "api_key=***");
        assert_eq!(
            sanitize_query("q=test&access_token=abc&limit=10"),
            "q=test&access_token=***&limit=10"
        );
        assert_eq!(
            sanitize_query("password=a&Password=b"),
            "password=***&Password=***"
        );
    }

    #[test]
    fn test_sanitize_keeps_flags_without_values() {
        assert_eq!(sanitize_query("verbose&token=x"), "verbose&token=***");
    }
}
