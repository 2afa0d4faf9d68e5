use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info, warn};

use service_kit::api::handlers::AppStateInner;
use service_kit::api::routes::create_router;
use service_kit::api::{JwtSecret, Server};
use service_kit::config::{AppConfig, DEV_JWT_SECRET};
use service_kit::db::Probe;
use service_kit::logging::Logger;
use service_kit::metrics;
use service_kit::telemetry::Telemetry;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    // Telemetry first so the logger can bridge spans and events into it
    let telemetry = match &config.telemetry {
        Some(telemetry_config) => Some(Telemetry::init(telemetry_config)?),
        None => None,
    };
    let extra_layers = telemetry
        .iter()
        .flat_map(|telemetry| [telemetry.tracing_layer(), telemetry.log_layer()])
        .collect();

    // Initialize logging
    Logger::build(&config.log, extra_layers)?.install()?;

    info!(
        "Starting {} v{}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    info!(config = ?config, "Configuration loaded");

    if let Some(telemetry) = &telemetry {
        telemetry
            .meter("service-kit")
            .u64_counter("service.starts")
            .with_description("Process starts")
            .build()
            .add(1, &[]);
    }

    // Initialize metrics
    metrics::init_metrics();
    info!("Metrics registry initialized");

    if config.jwt.secret == DEV_JWT_SECRET {
        warn!("JWT_SECRET is not set, tokens are signed with the development secret");
    }

    let probes = connect_databases(&config).await?;
    info!("{} backing service(s) connected", probes.len());

    let state = Arc::new(AppStateInner {
        probes,
        jwt_secret: JwtSecret::new(&config.jwt.secret),
        token_ttl: config.jwt.expiry,
    });

    let server = Server::new(config.server.clone(), create_router(state));
    let result = server.serve().await;

    if let Some(telemetry) = telemetry {
        if let Err(e) = telemetry.shutdown() {
            error!("{:#}", e);
        }
    }

    result
}

/// Connect every configured store. SQL failures abort startup; Redis is
/// optional and skipped when unreachable.
#[allow(unused_mut)]
async fn connect_databases(config: &AppConfig) -> Result<Vec<Probe>> {
    let mut probes: Vec<Probe> = Vec::new();

    #[cfg(feature = "postgres")]
    {
        use service_kit::db::postgres;

        if let Some(postgres_config) = &config.postgres {
            info!("Initializing PostgreSQL connection");
            let pool = postgres::create_pool(postgres_config).await?;
            postgres::test_connection(&pool).await?;
            probes.push(Arc::new(pool));
        }
    }

    #[cfg(feature = "sqlite")]
    {
        use service_kit::db::sqlite;

        if let Some(sqlite_config) = &config.sqlite {
            info!("Initializing SQLite connection");
            let pool = sqlite::create_pool(sqlite_config)?;
            sqlite::test_connection(&pool)?;
            probes.push(Arc::new(pool));
        }
    }

    #[cfg(feature = "redis_cache")]
    {
        use service_kit::db::redis;

        if let Some(redis_config) = &config.redis {
            info!("Initializing Redis connection");
            match redis::connect(redis_config).await {
                Ok(connection) => probes.push(Arc::new(connection)),
                Err(e) => {
                    warn!("Failed to connect to Redis: {:#}. Continuing without it.", e);
                }
            }
        }
    }

    #[cfg(not(feature = "postgres"))]
    if config.postgres.is_some() {
        warn!("PostgreSQL is configured but the `postgres` feature is disabled");
    }

    #[cfg(not(feature = "sqlite"))]
    if config.sqlite.is_some() {
        warn!("SQLite is configured but the `sqlite` feature is disabled");
    }

    #[cfg(not(feature = "redis_cache"))]
    if config.redis.is_some() {
        warn!("Redis is configured but the `redis_cache` feature is disabled");
    }

    Ok(probes)
}
