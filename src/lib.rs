// Library exports for testing
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod logging;
pub mod metrics;
pub mod response;
pub mod telemetry;
pub mod validation;
