use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Display;
use utoipa::ToSchema;

use crate::errors::{ErrorKind, Exception, FieldErrors};

/// Error code used by [`Envelope::bad_request`], outside the exception taxonomy
pub const BAD_REQUEST_CODE: &str = "BAD_REQUEST";

/// Uniform wrapper for every response, success or failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Envelope {
    /// HTTP status code, repeated in the body
    pub status_code: u16,
    /// Correlation id of the request (empty when unknown)
    pub request_id: String,
    /// Human-readable summary
    pub message: String,
    /// Present only for failures
    pub error: Option<ErrorBlock>,
    /// Success payload
    #[schema(value_type = Option<Object>)]
    pub data: Option<Value>,
}

/// Error block of a failed response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorBlock {
    /// Error code for programmatic handling
    #[serde(rename = "error_code")]
    pub code: String,
    /// Field errors for validation failures, stringified cause otherwise
    #[schema(value_type = Option<Object>)]
    pub details: Option<ErrorDetails>,
}

/// The two mutually exclusive shapes of `details`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetails {
    FieldErrors(FieldErrors),
    Cause(String),
}

impl Envelope {
    fn new(status_code: u16, message: impl Into<String>) -> Self {
        Self {
            status_code,
            request_id: String::new(),
            message: message.into(),
            error: None,
            data: None,
        }
    }

    pub fn success() -> Self {
        Self::new(200, "success")
    }

    /// Reports 200, not 201; clients rely on the historical status.
    pub fn created() -> Self {
        Self::new(200, "created")
    }

    /// A `null` payload is stored as no payload, matching how it reads back
    pub fn with_data(data: Value) -> Self {
        Self {
            data: Some(data).filter(|data| !data.is_null()),
            ..Self::success()
        }
    }

    pub fn from_exception(exc: &Exception) -> Self {
        let details = match exc.kind() {
            ErrorKind::InvalidParameter => exc
                .field_errors()
                .cloned()
                .map(ErrorDetails::FieldErrors),
            _ => exc
                .cause()
                .map(|cause| ErrorDetails::Cause(cause.to_string())),
        };

        Self {
            error: Some(ErrorBlock {
                code: exc.kind().code().to_string(),
                details,
            }),
            ..Self::new(exc.status_code(), exc.message())
        }
    }

    /// 400 outside the taxonomy; the error block is only set when a cause is given
    pub fn bad_request(message: impl Into<String>, cause: Option<&dyn Display>) -> Self {
        Self {
            error: cause.map(|cause| ErrorBlock {
                code: BAD_REQUEST_CODE.to_string(),
                details: Some(ErrorDetails::Cause(cause.to_string())),
            }),
            ..Self::new(400, message)
        }
    }

    /// Attach the correlation id of the current request
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
