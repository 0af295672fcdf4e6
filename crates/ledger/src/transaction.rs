//! EIP-155 replay-protected legacy transactions.

use k256::ecdsa::SigningKey;

use crate::address::LedgerAddress;
use crate::hash::keccak256;
use crate::rlp::{self, Item};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: LedgerAddress,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    pub raw: Vec<u8>,
    pub hash: [u8; 32],
}

impl SignedTransaction {
    pub fn hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }
}

impl LegacyTransaction {
    fn fields(&self) -> Vec<Item<'_>> {
        vec![
            Item::Uint(u128::from(self.nonce)),
            Item::Uint(self.gas_price),
            Item::Uint(u128::from(self.gas_limit)),
            Item::Bytes(self.to.as_bytes()),
            Item::Uint(self.value),
            Item::Bytes(&self.data),
        ]
    }

    /// keccak256 of `rlp([nonce, gasPrice, gas, to, value, data, chainId, 0, 0])`.
    pub fn signing_hash(&self) -> [u8; 32] {
        let mut fields = self.fields();
        fields.push(Item::Uint(u128::from(self.chain_id)));
        fields.push(Item::Uint(0));
        fields.push(Item::Uint(0));
        keccak256(&rlp::encode(&Item::List(fields)))
    }

    pub fn sign(&self, key: &SigningKey) -> Result<SignedTransaction, k256::ecdsa::Error> {
        let (signature, recovery_id) = key.sign_prehash_recoverable(&self.signing_hash())?;
        let v = u128::from(self.chain_id) * 2 + 35 + u128::from(recovery_id.is_y_odd());

        let signature_bytes = signature.to_bytes();
        let (r, s) = signature_bytes.split_at(32);

        let mut fields = self.fields();
        fields.push(Item::Uint(v));
        fields.push(Item::Bytes(rlp::trim_leading_zeros(r)));
        fields.push(Item::Bytes(rlp::trim_leading_zeros(s)));

        let raw = rlp::encode(&Item::List(fields));
        let hash = keccak256(&raw);
        Ok(SignedTransaction { raw, hash })
    }
}
