use crate::pool::DbPool;
use anyhow::Context;
use rust_embed::RustEmbed;
use std::collections::HashSet;
use tracing::{debug, info};

#[derive(RustEmbed)]
#[folder = "migrations"]
pub struct Migrations;

/// Names of every embedded migration, sorted so they apply in order
pub fn available_migrations() -> Vec<String> {
    let mut names: Vec<String> = Migrations::iter().map(|name| name.to_string()).collect();
    names.sort();
    names
}

/// SQL text of an embedded migration
pub fn migration_sql(name: &str) -> anyhow::Result<String> {
    let file = Migrations::get(name).with_context(|| format!("migration {name} not found"))?;
    String::from_utf8(file.data.into_owned())
        .with_context(|| format!("migration {name} is not valid UTF-8"))
}

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each script runs as one `batch_execute` inside its own transaction, so
/// statements are never split client-side.
pub async fn run(pool: &DbPool) -> anyhow::Result<()> {
    let mut client = pool.get().await?;

    client
        .batch_execute(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                name TEXT PRIMARY KEY,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )",
        )
        .await
        .context("failed to create schema_migrations table")?;

    let applied: HashSet<String> = client
        .query("SELECT name FROM schema_migrations", &[])
        .await?
        .into_iter()
        .map(|row| row.get(0))
        .collect();

    for name in available_migrations() {
        if applied.contains(&name) {
            debug!("Migration {} already applied", name);
            continue;
        }

        let sql = migration_sql(&name)?;

        info!("Applying migration {}", name);
        let txn = client.transaction().await?;
        txn.batch_execute(&sql)
            .await
            .with_context(|| format!("migration {name} failed"))?;
        txn.execute("INSERT INTO schema_migrations (name) VALUES ($1)", &[&name])
            .await?;
        txn.commit().await?;
    }

    info!("Database migrations up to date");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_are_sorted_and_non_empty() {
        let names = available_migrations();
        assert!(!names.is_empty());

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);

        for name in &names {
            assert!(name.ends_with(".sql"), "{name}");
            assert!(!migration_sql(name).unwrap().trim().is_empty(), "{name}");
        }
    }

    #[test]
    fn test_unknown_migration_is_an_error() {
        let err = migration_sql("9999_missing.sql").unwrap_err();
        assert!(err.to_string().contains("9999_missing.sql"));
    }

    #[test]
    fn test_subscriptions_migration_declares_constraints() {
        let sql = migration_sql("0001_create_subscriptions.sql").unwrap();
        assert!(sql.contains("CHECK (price > 0)"));
        assert!(sql.contains("CHECK (service_name <> '')"));
        assert!(sql.contains("subscriptions_end_after_start"));
        assert!(sql.contains("end_date >= start_date"));
    }
}
