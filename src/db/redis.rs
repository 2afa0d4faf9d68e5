use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::{aio::ConnectionManager, Client};
use tracing::info;

use crate::config::RedisConfig;
use crate::db::probe::ReadinessProbe;

/// Open a multiplexed, auto-reconnecting connection
pub async fn connect(config: &RedisConfig) -> Result<ConnectionManager> {
    let client = open_client(config)?;

    let manager = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;

    info!(host = %config.host, port = config.port, db = config.db, "Redis connection established");
    Ok(manager)
}

fn open_client(config: &RedisConfig) -> Result<Client> {
    Client::open(config.connection_url().as_str()).context("Invalid Redis connection URL")
}

pub async fn test_connection(conn: &ConnectionManager) -> Result<()> {
    let mut conn = conn.clone();
    redis::cmd("PING")
        .query_async::<_, String>(&mut conn)
        .await
        .context("Redis PING failed")?;
    Ok(())
}

#[async_trait]
impl ReadinessProbe for ConnectionManager {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        test_connection(self).await
    }
}
