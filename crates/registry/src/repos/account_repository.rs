//! SQLite-backed account repository.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::ensure_binding_fields;
use crate::entities::AccountBinding;
use crate::errors::RegistryResult;
use crate::AddressRegistry;

/// Repository for account bindings stored in the `accounts` table
pub struct SqliteAccountRepository {
    pool: SqlitePool,
}

impl SqliteAccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl AddressRegistry for SqliteAccountRepository {
    async fn lookup(&self, identity: &str) -> RegistryResult<Option<String>> {
        let address = sqlx::query_scalar::<_, String>(
            "SELECT ethereum_address FROM accounts WHERE slack_user_id = ? LIMIT 1",
        )
        .bind(identity)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    async fn upsert(&self, identity: &str, address: &str) -> RegistryResult<()> {
        ensure_binding_fields(identity, address)?;

        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO accounts (slack_user_id, ethereum_address, created_at, updated_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (slack_user_id)
             DO UPDATE SET ethereum_address = excluded.ethereum_address,
                           updated_at = excluded.updated_at",
        )
        .bind(identity)
        .bind(address)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        debug!(identity, "account binding upserted");
        Ok(())
    }

    async fn list(&self) -> RegistryResult<Vec<AccountBinding>> {
        let rows = sqlx::query(
            "SELECT slack_user_id, ethereum_address, created_at, updated_at
             FROM accounts ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> RegistryResult<AccountBinding> {
                Ok(AccountBinding {
                    slack_user_id: row.try_get("slack_user_id")?,
                    ethereum_address: row.try_get("ethereum_address")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }
}
