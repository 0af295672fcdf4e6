//! tiperc20 Registry Crate
//!
//! Durable mapping from a chat identity to the ledger address it registered.
//! The [`AddressRegistry`] contract is implemented by a SQLite-backed
//! repository and by a transient in-memory map; [`open_registry`] picks one
//! from configuration so callers never depend on the backing store.

use std::sync::Arc;

use async_trait::async_trait;
use tiperc20_config::{RegistryBackend, RegistryConfig};
use tracing::info;

pub mod connection;
pub mod entities;
pub mod errors;
pub mod migrations;
pub mod repos;

pub use connection::prepare_database;
pub use entities::AccountBinding;
pub use errors::{RegistryError, RegistryResult};
pub use migrations::run_migrations;
pub use repos::{MemoryAccountRepository, SqliteAccountRepository};

/// Lookup and upsert of identity bindings.
///
/// `lookup` of an identity that never registered is `Ok(None)`; a store
/// that cannot answer reports [`RegistryError::Unavailable`] instead.
#[async_trait]
pub trait AddressRegistry: Send + Sync {
    async fn lookup(&self, identity: &str) -> RegistryResult<Option<String>>;

    /// Insert or overwrite the binding for `identity`. Last write wins.
    async fn upsert(&self, identity: &str, address: &str) -> RegistryResult<()>;

    async fn list(&self) -> RegistryResult<Vec<AccountBinding>>;
}

/// Build the registry selected by `config.backend`, running migrations for durable stores.
pub async fn open_registry(config: &RegistryConfig) -> RegistryResult<Arc<dyn AddressRegistry>> {
    match config.backend {
        RegistryBackend::Sqlite => {
            let pool = prepare_database(config)
                .await
                .map_err(|e| RegistryError::Unavailable(format!("{e:#}")))?;

            run_migrations(&pool)
                .await
                .map_err(|e| RegistryError::Migration(format!("{e:#}")))?;

            Ok(Arc::new(SqliteAccountRepository::new(pool)))
        }
        RegistryBackend::Memory => {
            info!("using in-memory address registry; bindings are lost on restart");
            Ok(Arc::new(MemoryAccountRepository::new()))
        }
    }
}
