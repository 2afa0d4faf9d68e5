pub mod envelope;
pub mod logging;
pub mod request_context;

pub use envelope::{recover_panic, shape_exceptions};
pub use logging::logging_middleware;
pub use request_context::{correlation_id, request_context, RequestContext};
