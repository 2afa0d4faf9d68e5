use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a recoverable application failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Request parameters failed validation
    #[serde(rename = "INVALID_PARAMETER")]
    InvalidParameter,

    /// Request body or stored data is malformed
    #[serde(rename = "INVALID_DATA")]
    InvalidData,

    /// Looked-up record does not exist
    #[serde(rename = "NOT_FOUND")]
    NotFound,

    /// Record collides with an existing one
    #[serde(rename = "ALREADY_EXISTS")]
    AlreadyExists,

    /// Caller is known but not allowed
    #[serde(rename = "PERMISSION_DENIED")]
    PermissionDenied,

    /// Caller could not be identified
    #[serde(rename = "UNAUTHENTICATED")]
    Unauthenticated,

    /// Anything else. Unknown codes deserialize here.
    #[serde(rename = "INTERNAL_ERROR", other)]
    Internal,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 7] = [
        Self::InvalidParameter,
        Self::InvalidData,
        Self::NotFound,
        Self::AlreadyExists,
        Self::PermissionDenied,
        Self::Unauthenticated,
        Self::Internal,
    ];

    /// Wire code of this kind
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::InvalidData => "INVALID_DATA",
            Self::NotFound => "NOT_FOUND",
            Self::AlreadyExists => "ALREADY_EXISTS",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Parse a wire code. Anything unrecognized closes over to `Internal`.
    pub fn from_code(code: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .unwrap_or(Self::Internal)
    }

    /// Get HTTP status code for this kind
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidParameter | Self::InvalidData => 400,
            Self::Unauthenticated => 401,
            Self::PermissionDenied => 403,
            Self::NotFound => 404,
            Self::AlreadyExists => 409,
            Self::Internal => 500,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// HTTP status for an arbitrary wire code; unknown codes map to 500
pub fn status_for_code(code: &str) -> u16 {
    ErrorKind::from_code(code).status_code()
}
