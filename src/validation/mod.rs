//! Declarative request validation.
//!
//! ```
//! use serde_json::json;
//! use service_kit::validation::{Rule, Schema};
//!
//! let schema = Schema::new()
//!     .labeled("email", "Email", &[Rule::Required, Rule::Email])
//!     .tagged("name", "required,min=3")
//!     .unwrap();
//!
//! let errors = schema.validate(&json!({"email": "nope"})).unwrap_err();
//! assert_eq!(errors["Email"], "Email is not a valid email");
//! assert_eq!(errors["name"], "name is required");
//! ```

pub mod rules;
pub mod schema;

pub use rules::{Rule, RuleParseError};
pub use schema::{validate_value, Schema, Validate, INVALID_PARAMETERS_MESSAGE};
