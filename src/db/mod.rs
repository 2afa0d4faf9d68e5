pub mod migration;
pub mod probe;

#[cfg(feature = "postgres")]
pub mod postgres;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "redis_cache")]
pub mod redis;

pub use migration::Migration;
pub use probe::{check_all, Probe, ProbeStatus, ReadinessProbe};
