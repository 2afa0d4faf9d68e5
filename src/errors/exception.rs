//! The exception type returned by application code.
//!
//! Constructors take the message only; the underlying error is attached with
//! [`Exception::with_cause`]:
//!
//! ```
//! use service_kit::errors::{ErrorKind, Exception};
//!
//! let exc = Exception::not_found("user missing").with_cause("no rows returned");
//! assert_eq!(exc.kind(), ErrorKind::NotFound);
//! assert_eq!(exc.cause().unwrap().to_string(), "no rows returned");
//! ```

use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::sync::Arc;
use thiserror::Error;

use super::codes::ErrorKind;

/// Field name (or label) to human-readable message
pub type FieldErrors = BTreeMap<String, String>;

/// Shared, type-erased underlying error
pub type Cause = Arc<dyn StdError + Send + Sync>;

/// A recoverable application failure.
///
/// Built where the failure is detected, returned up the call chain and turned
/// into a response envelope at the HTTP boundary. The kind decides the status
/// code; `field_errors` is only ever set for [`ErrorKind::InvalidParameter`].
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct Exception {
    kind: ErrorKind,
    message: String,
    #[source]
    cause: Option<Cause>,
    field_errors: Option<FieldErrors>,
}

impl Exception {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            cause: None,
            field_errors: None,
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, message)
    }

    pub fn permission_denied(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PermissionDenied, message)
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthenticated, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidData, message)
    }

    /// Validation failure. The map may be empty but is always present.
    pub fn invalid_parameter(message: impl Into<String>, field_errors: FieldErrors) -> Self {
        Self {
            field_errors: Some(field_errors),
            ..Self::new(ErrorKind::InvalidParameter, message)
        }
    }

    /// Attach the underlying error while constructing the exception
    pub fn with_cause<E>(mut self, cause: E) -> Self
    where
        E: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.cause = Some(Arc::from(cause.into()));
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        self.field_errors.as_ref()
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

/// Uncaught errors reaching the boundary become opaque internal failures
impl From<anyhow::Error> for Exception {
    fn from(err: anyhow::Error) -> Self {
        Self::internal("Internal Server Error").with_cause(err)
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for Exception {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::not_found("record not found").with_cause(err),
            other => Self::internal("database error").with_cause(other),
        }
    }
}
