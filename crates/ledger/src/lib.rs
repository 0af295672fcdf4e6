//! Submission of fixed-amount ERC-20 transfers to an Ethereum JSON-RPC node.
//!
//! [`TransferOrchestrator`] owns a long-lived [`rpc::LedgerClient`], resolves the
//! configured token contract once, unlocks the keystore once, and then signs and
//! submits one `transfer(address,uint256)` call per [`TokenTransfer::transfer`].
//! It returns as soon as the node accepts the transaction into its pool.

pub mod address;
pub mod error;
pub mod hash;
pub mod keystore;
pub mod orchestrator;
pub mod rlp;
pub mod rpc;
pub mod token;
pub mod transaction;

pub use address::{AddressError, LedgerAddress};
pub use error::{RpcError, TransferError};
pub use keystore::{Keystore, KeystoreError, Signer};
pub use orchestrator::{TokenTransfer, TransferOrchestrator, TransferReceipt};
