//! Response envelope and its wire representations

pub mod envelope;
pub mod format;

pub use envelope::{Envelope, ErrorBlock, ErrorDetails, BAD_REQUEST_CODE};
pub use format::{render, RenderError, ResponseFormat};
