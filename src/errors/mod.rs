//! Application failure taxonomy

pub mod codes;
pub mod exception;

pub use codes::{status_for_code, ErrorKind};
pub use exception::{Cause, Exception, FieldErrors};
