//! Account binding entity

use serde::{Deserialize, Serialize};

/// A chat identity and the ledger address it registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBinding {
    pub slack_user_id: String,
    pub ethereum_address: String,
    pub created_at: String,
    pub updated_at: String,
}

impl AccountBinding {
    pub fn new(slack_user_id: impl Into<String>, ethereum_address: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            slack_user_id: slack_user_id.into(),
            ethereum_address: ethereum_address.into(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}
