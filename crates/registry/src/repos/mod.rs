//! Registry backends

pub mod account_repository;
pub mod memory_repository;

pub use account_repository::SqliteAccountRepository;
pub use memory_repository::MemoryAccountRepository;

use crate::errors::{RegistryError, RegistryResult};

fn ensure_binding_fields(identity: &str, address: &str) -> RegistryResult<()> {
    if identity.trim().is_empty() {
        return Err(RegistryError::Validation("identity cannot be empty".to_string()));
    }
    if address.trim().is_empty() {
        return Err(RegistryError::Validation("address cannot be empty".to_string()));
    }
    Ok(())
}
