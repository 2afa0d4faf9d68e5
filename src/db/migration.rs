use anyhow::{bail, Result};

/// A table the application owns, created on startup if missing
pub trait Migration: Send + Sync {
    fn table_name(&self) -> &str;

    /// DDL creating the table and its indexes; may hold several statements
    fn create_sql(&self) -> &str;
}

pub(crate) fn ensure_migrations(migrations: &[&dyn Migration]) -> Result<()> {
    if migrations.is_empty() {
        bail!("No migrations provided");
    }
    Ok(())
}

/// Split DDL into individual statements, keeping `$$` quoted bodies intact
pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_dollar_quote = false;

    for line in sql.lines() {
        let trimmed = line.trim();

        // Skip comments
        if trimmed.starts_with("--") && !in_dollar_quote {
            continue;
        }

        if trimmed.matches("$$").count() % 2 == 1 {
            in_dollar_quote = !in_dollar_quote;
        }

        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') && !in_dollar_quote {
            statements.push(current.trim().to_string());
            current.clear();
        }
    }

    // Add any remaining content
    if !current.trim().is_empty() {
        statements.push(current.trim().to_string());
    }

    statements
}
