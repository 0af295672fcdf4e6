//! In-memory account repository; bindings live only as long as the process.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::ensure_binding_fields;
use crate::entities::AccountBinding;
use crate::errors::RegistryResult;
use crate::AddressRegistry;

#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: RwLock<HashMap<String, AccountBinding>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AddressRegistry for MemoryAccountRepository {
    async fn lookup(&self, identity: &str) -> RegistryResult<Option<String>> {
        let accounts = self.accounts.read().await;
        Ok(accounts
            .get(identity)
            .map(|binding| binding.ethereum_address.clone()))
    }

    async fn upsert(&self, identity: &str, address: &str) -> RegistryResult<()> {
        ensure_binding_fields(identity, address)?;

        let mut accounts = self.accounts.write().await;
        match accounts.get_mut(identity) {
            Some(existing) => {
                existing.ethereum_address = address.to_string();
                existing.updated_at = chrono::Utc::now().to_rfc3339();
            }
            None => {
                accounts.insert(identity.to_string(), AccountBinding::new(identity, address));
            }
        }
        Ok(())
    }

    async fn list(&self) -> RegistryResult<Vec<AccountBinding>> {
        let accounts = self.accounts.read().await;
        let mut bindings: Vec<AccountBinding> = accounts.values().cloned().collect();
        bindings.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.slack_user_id.cmp(&b.slack_user_id))
        });
        Ok(bindings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn later_register_replaces_earlier_one() {
        let repo = MemoryAccountRepository::new();

        repo.upsert("U1", "0xaaa").await.unwrap();
        let created = repo.list().await.unwrap()[0].created_at.clone();
        repo.upsert("U1", "0xbbb").await.unwrap();

        assert_eq!(repo.lookup("U1").await.unwrap().as_deref(), Some("0xbbb"));
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].created_at, created);
    }

    #[tokio::test]
    async fn unknown_identity_is_absent() {
        let repo = MemoryAccountRepository::new();
        assert!(repo.lookup("nobody").await.unwrap().is_none());
    }
}
