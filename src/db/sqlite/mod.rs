pub mod connection;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{error, info};

use crate::db::migration::{ensure_migrations, Migration};
use crate::db::probe::ReadinessProbe;

pub use connection::{create_pool, test_connection, SqlitePool};

#[async_trait]
impl ReadinessProbe for SqlitePool {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn ping(&self) -> Result<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || test_connection(&pool)).await?
    }
}

/// Create each table in order, stopping at the first failure
pub fn run_migrations(pool: &SqlitePool, migrations: &[&dyn Migration]) -> Result<()> {
    ensure_migrations(migrations)?;
    let conn = pool.get().context("Failed to get connection from pool")?;

    for migration in migrations {
        let table = migration.table_name();

        if let Err(e) = conn.execute_batch(migration.create_sql()) {
            error!(table = %table, error = %e, "Migration failed");
            return Err(e).with_context(|| format!("Failed to migrate table {}", table));
        }

        info!(table = %table, "Migration applied");
    }

    Ok(())
}
