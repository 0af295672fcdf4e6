//! Calls against a standard fungible-token (ERC-20) contract.

use crate::address::LedgerAddress;

/// `keccak256("transfer(address,uint256)")[..4]`
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenContract {
    address: LedgerAddress,
}

impl TokenContract {
    pub fn new(address: LedgerAddress) -> Self {
        Self { address }
    }

    pub fn address(&self) -> LedgerAddress {
        self.address
    }

    /// ABI-encoded calldata for `transfer(destination, amount)`.
    pub fn transfer_call(&self, destination: &LedgerAddress, amount: u128) -> Vec<u8> {
        let mut data = Vec::with_capacity(4 + 32 + 32);
        data.extend_from_slice(&TRANSFER_SELECTOR);

        let mut word = [0u8; 32];
        word[12..].copy_from_slice(destination.as_bytes());
        data.extend_from_slice(&word);

        let mut word = [0u8; 32];
        word[16..].copy_from_slice(&amount.to_be_bytes());
        data.extend_from_slice(&word);

        data
    }
}
