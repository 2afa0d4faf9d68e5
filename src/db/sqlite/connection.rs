use anyhow::{bail, Context, Result};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::path::Path;
use tracing::info;

use crate::config::SqliteConfig;

pub type SqlitePool = Pool<SqliteConnectionManager>;

pub fn create_pool(config: &SqliteConfig) -> Result<SqlitePool> {
    if config.path.trim().is_empty() {
        bail!("SQLite database path cannot be empty");
    }

    // Ensure parent directory exists
    if let Some(parent) = Path::new(&config.path).parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let manager = SqliteConnectionManager::file(&config.path);

    let pool = Pool::builder()
        .max_size(config.max_connections)
        .connection_timeout(config.connection_timeout)
        .build(manager)
        .context("Failed to create SQLite connection pool")?;

    info!(path = %config.path, "SQLite connection established");
    Ok(pool)
}

pub fn test_connection(pool: &SqlitePool) -> Result<()> {
    let conn = pool.get().context("Failed to get connection from pool")?;
    conn.query_row("SELECT 1", params![], |_| Ok(()))
        .context("Failed to test database connection")?;
    Ok(())
}
