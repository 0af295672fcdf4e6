use thiserror::Error;

use crate::address::AddressError;
use crate::keystore::KeystoreError;

/// Failures of a JSON-RPC exchange with the ledger node.
#[derive(Debug, Clone, Error)]
pub enum RpcError {
    #[error("node request failed: {0}")]
    Transport(String),
    #[error("node returned error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("unexpected node response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for RpcError {
    fn from(error: reqwest::Error) -> Self {
        RpcError::Transport(error.to_string())
    }
}

/// Why a transfer was not submitted. None of these is fatal to the caller.
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("`{address}` is not a valid address: {source}")]
    MalformedDestination {
        address: String,
        #[source]
        source: AddressError,
    },
    #[error("ledger node is unreachable: {0}")]
    NodeUnreachable(String),
    #[error("token contract could not be resolved: {0}")]
    ContractResolution(String),
    #[error("signing credentials are unusable: {0}")]
    SigningCredential(#[from] KeystoreError),
    #[error("ledger node rejected the transfer: {0}")]
    NodeRejected(String),
}

impl TransferError {
    /// Map an RPC failure during submission: transport problems mean the node
    /// is unreachable, anything the node answered counts as a rejection.
    pub(crate) fn from_submission(error: RpcError) -> Self {
        match error {
            RpcError::Transport(message) => TransferError::NodeUnreachable(message),
            RpcError::Rpc { message, .. } => TransferError::NodeRejected(message),
            RpcError::InvalidResponse(message) => TransferError::NodeRejected(message),
        }
    }

    pub(crate) fn from_resolution(error: RpcError) -> Self {
        match error {
            RpcError::Transport(message) => TransferError::NodeUnreachable(message),
            other => TransferError::ContractResolution(other.to_string()),
        }
    }
}
