use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::any::Any;

use crate::api::responder::Responder;
use crate::errors::Exception;

/// Re-render exceptions returned by handlers with the request's correlation id
/// and negotiated format
pub async fn shape_exceptions(request: Request, next: Next) -> Response {
    let responder = Responder::from_parts(request.headers(), request.extensions());
    let response = next.run(request).await;

    match response.extensions().get::<Exception>().cloned() {
        Some(exc) => responder.exception(exc),
        None => response,
    }
}

/// Panic handler for `CatchPanicLayer`: the panic becomes an internal exception
pub fn recover_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };

    Exception::internal("Internal Server Error")
        .with_cause(detail)
        .into_response()
}
