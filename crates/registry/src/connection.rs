//! Pool setup for the durable address registry.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tiperc20_config::RegistryConfig;
use tokio::fs;
use tracing::info;

/// Concurrent CLI invocations and the running bot share one file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the registry database, creating the file and its directory on first use.
pub async fn prepare_database(config: &RegistryConfig) -> Result<SqlitePool> {
    if let Some(file) = registry_file(&config.url) {
        create_parent_dir(file).await?;
    }

    let options = SqliteConnectOptions::from_str(&config.url)
        .with_context(|| format!("invalid registry database url {}", config.url))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections.max(1))
        .connect_with(options)
        .await
        .with_context(|| format!("failed to connect to registry database {}", config.url))?;

    info!(url = %config.url, "registry database connection established");
    Ok(pool)
}

/// On-disk location named by a `sqlite://` url; `None` for in-memory registries.
fn registry_file(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    let path = path.split('?').next().unwrap_or(path);
    (!path.is_empty() && path != ":memory:").then(|| Path::new(path))
}

async fn create_parent_dir(file: &Path) -> Result<()> {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir)
            .await
            .with_context(|| format!("failed to create registry directory {}", dir.display())),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tiperc20_config::RegistryBackend;

    fn config_for(url: String) -> RegistryConfig {
        RegistryConfig {
            backend: RegistryBackend::Sqlite,
            url,
            max_connections: 1,
        }
    }

    #[test]
    fn registry_file_ignores_memory_and_query_strings() {
        assert_eq!(registry_file("sqlite://:memory:"), None);
        assert_eq!(registry_file("postgres://db/registry"), None);
        assert_eq!(
            registry_file("sqlite://data/registry.db?mode=rwc"),
            Some(Path::new("data/registry.db"))
        );
    }

    #[tokio::test]
    async fn prepare_creates_nested_directories() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested/deeper/registry.db");

        let pool = prepare_database(&config_for(format!("sqlite://{}", db_path.display())))
            .await
            .unwrap();

        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
        assert!(db_path.exists());

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[tokio::test]
    async fn prepare_accepts_in_memory_database() {
        let pool = prepare_database(&config_for("sqlite://:memory:".to_string()))
            .await
            .unwrap();

        let one: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await.unwrap();
        assert_eq!(one, 1);
    }
}
