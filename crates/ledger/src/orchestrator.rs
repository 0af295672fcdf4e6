use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tiperc20_config::AppConfig;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::address::LedgerAddress;
use crate::error::TransferError;
use crate::keystore::{Keystore, KeystoreError, Signer};
use crate::rpc::LedgerClient;
use crate::token::TokenContract;
use crate::transaction::LegacyTransaction;

/// What the node told us after accepting a transfer into its pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub transaction_hash: String,
    /// Always true: inclusion is never awaited.
    pub pending: bool,
}

#[async_trait]
pub trait TokenTransfer: Send + Sync {
    /// Submit one transfer of the configured amount to `destination`.
    async fn transfer(&self, destination: &str) -> Result<TransferReceipt, TransferError>;
}

pub struct TransferOrchestrator {
    client: LedgerClient,
    token_address: LedgerAddress,
    amount: u128,
    key_json: Zeroizing<String>,
    passphrase: Zeroizing<String>,
    chain_id: Option<u64>,
    gas_limit: Option<u64>,
    contract: OnceCell<TokenContract>,
    signer: OnceCell<Signer>,
}

impl TransferOrchestrator {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let ledger = &config.ledger;

        let client = LedgerClient::new(
            &ledger.endpoint,
            Duration::from_secs(ledger.request_timeout_seconds),
        )?;

        let token_address = LedgerAddress::parse(&ledger.token_address)
            .with_context(|| format!("invalid ledger.token_address `{}`", ledger.token_address))?;

        let key_json = match (&ledger.key_json, &ledger.key_file) {
            (Some(json), _) if !json.trim().is_empty() => json.clone(),
            (_, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read key file {}", path.display()))?,
            _ => anyhow::bail!("no signing key material configured"),
        };

        Ok(Self {
            client,
            token_address,
            amount: u128::from(config.tip.amount),
            key_json: Zeroizing::new(key_json),
            passphrase: Zeroizing::new(ledger.passphrase.clone()),
            chain_id: ledger.chain_id,
            gas_limit: ledger.gas_limit,
            contract: OnceCell::new(),
            signer: OnceCell::new(),
        })
    }

    pub fn token_address(&self) -> LedgerAddress {
        self.token_address
    }

    async fn contract(&self) -> Result<&TokenContract, TransferError> {
        self.contract
            .get_or_try_init(|| async {
                let code = self
                    .client
                    .code_at(&self.token_address)
                    .await
                    .map_err(TransferError::from_resolution)?;
                if code.is_empty() {
                    return Err(TransferError::ContractResolution(format!(
                        "no contract deployed at {}",
                        self.token_address
                    )));
                }
                debug!(token = %self.token_address, code_len = code.len(), "token contract resolved");
                Ok(TokenContract::new(self.token_address))
            })
            .await
    }

    async fn signer(&self) -> Result<&Signer, TransferError> {
        self.signer
            .get_or_try_init(|| async {
                let keystore = Keystore::from_json(&self.key_json)?;
                let signer = keystore.decrypt(&self.passphrase)?;
                debug!(sender = %signer.address(), "signing key unlocked");
                Ok(signer)
            })
            .await
    }
}

#[async_trait]
impl TokenTransfer for TransferOrchestrator {
    async fn transfer(&self, destination: &str) -> Result<TransferReceipt, TransferError> {
        let to = LedgerAddress::parse(destination).map_err(|source| {
            TransferError::MalformedDestination {
                address: destination.to_string(),
                source,
            }
        })?;

        let contract = self.contract().await?;
        let signer = self.signer().await?;
        let sender = signer.address();

        let chain_id = match self.chain_id {
            Some(chain_id) => chain_id,
            None => self
                .client
                .chain_id()
                .await
                .map_err(TransferError::from_submission)?,
        };
        let nonce = self
            .client
            .pending_nonce(&sender)
            .await
            .map_err(TransferError::from_submission)?;
        let gas_price = self
            .client
            .gas_price()
            .await
            .map_err(TransferError::from_submission)?;

        let data = contract.transfer_call(&to, self.amount);
        let gas_limit = match self.gas_limit {
            Some(limit) => limit,
            None => self
                .client
                .estimate_gas(&sender, &contract.address(), &data)
                .await
                .map_err(TransferError::from_submission)?,
        };

        let transaction = LegacyTransaction {
            nonce,
            gas_price,
            gas_limit,
            to: contract.address(),
            value: 0,
            data,
            chain_id,
        };
        let signed = transaction
            .sign(signer.key())
            .map_err(|_| TransferError::SigningCredential(KeystoreError::InvalidKey))?;

        let transaction_hash = self
            .client
            .send_raw_transaction(&signed.raw)
            .await
            .map_err(TransferError::from_submission)?;
        if !transaction_hash.eq_ignore_ascii_case(&signed.hash_hex()) {
            warn!(
                node_hash = %transaction_hash,
                local_hash = %signed.hash_hex(),
                "node reported a different transaction hash"
            );
        }

        info!(
            destination = %to,
            amount = %self.amount,
            nonce,
            tx_hash = %transaction_hash,
            "token transfer submitted"
        );

        Ok(TransferReceipt {
            transaction_hash,
            pending: true,
        })
    }
}
