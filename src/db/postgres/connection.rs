use anyhow::{Context, Result};
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions, PgSslMode},
    PgPool,
};
use std::str::FromStr;
use tracing::info;

use crate::config::PostgresConfig;

/// Connection options from the URL when one is set, else from the discrete
/// fields with TLS disabled
pub fn connect_options(config: &PostgresConfig) -> Result<PgConnectOptions> {
    if let Some(url) = &config.url {
        return PgConnectOptions::from_str(url).context("Invalid PostgreSQL connection URL");
    }

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.username)
        .password(&config.password)
        .database(&config.database)
        .ssl_mode(PgSslMode::Disable))
}

pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    let config = config.clone().with_defaults();
    let options = connect_options(&config)?;

    let pool = PgPoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect_with(options)
        .await
        .context("Failed to create database connection pool")?;

    info!(
        max_connections = config.max_connections,
        "PostgreSQL connection established"
    );
    Ok(pool)
}

pub async fn test_connection(pool: &PgPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .context("Failed to test database connection")?;
    Ok(())
}
