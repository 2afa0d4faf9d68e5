pub mod connection;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{error, info};

use crate::db::migration::{ensure_migrations, split_sql_statements, Migration};
use crate::db::probe::ReadinessProbe;

pub use connection::{connect_options, create_pool, test_connection};

#[async_trait]
impl ReadinessProbe for PgPool {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> Result<()> {
        test_connection(self).await
    }
}

/// Create each table in order, stopping at the first failure
pub async fn run_migrations(pool: &PgPool, migrations: &[&dyn Migration]) -> Result<()> {
    ensure_migrations(migrations)?;
    info!("Running database migrations...");

    for migration in migrations {
        let table = migration.table_name();

        for statement in split_sql_statements(migration.create_sql()) {
            if let Err(e) = sqlx::query(&statement).execute(pool).await {
                error!(table = %table, error = %e, "Migration failed");
                return Err(e).with_context(|| format!("Failed to migrate table {}", table));
            }
        }

        info!(table = %table, "Migration applied");
    }

    info!("Database migrations completed successfully");
    Ok(())
}
