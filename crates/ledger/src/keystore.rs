//! Web3 Secret Storage (version 3) keystores.
//!
//! The signing key is stored encrypted with aes-128-ctr under a key derived
//! from the passphrase by scrypt or pbkdf2 (hmac-sha256); a keccak256 MAC over
//! the second half of the derived key and the ciphertext detects a wrong
//! passphrase before the plaintext is used.
//!
//! scrypt parameters must satisfy `log2(n) < 16 * r`. Keys written by geth
//! (`r = 8`) always do; hand-built keystores with `r = 1` and a large `n` are
//! rejected as [`KeystoreError::InvalidField`].

use aes::cipher::{KeyIvInit, StreamCipher};
use k256::ecdsa::SigningKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

use crate::address::LedgerAddress;
use crate::hash::keccak256;

type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

#[derive(Debug, Error)]
pub enum KeystoreError {
    #[error("keystore is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported keystore version {0}")]
    UnsupportedVersion(u64),
    #[error("unsupported key derivation function {0}")]
    UnsupportedKdf(String),
    #[error("unsupported cipher {0}")]
    UnsupportedCipher(String),
    #[error("invalid keystore field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("passphrase does not unlock this keystore")]
    MacMismatch,
    #[error("decrypted key is not a valid secp256k1 scalar")]
    InvalidKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Keystore {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(alias = "Crypto")]
    pub crypto: CryptoSection,
    #[serde(default)]
    pub id: Option<String>,
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CryptoSection {
    pub cipher: String,
    pub ciphertext: String,
    pub cipherparams: CipherParams,
    pub kdf: String,
    pub kdfparams: serde_json::Value,
    pub mac: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CipherParams {
    pub iv: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScryptParams {
    pub dklen: usize,
    pub n: u64,
    pub p: u32,
    pub r: u32,
    pub salt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    pub c: u32,
    pub dklen: usize,
    pub prf: String,
    pub salt: String,
}

/// A decrypted signing key together with the address it controls.
pub struct Signer {
    key: SigningKey,
    address: LedgerAddress,
}

impl Signer {
    pub fn from_key(key: SigningKey) -> Self {
        let address = LedgerAddress::from_verifying_key(key.verifying_key());
        Self { key, address }
    }

    pub fn address(&self) -> LedgerAddress {
        self.address
    }

    pub fn key(&self) -> &SigningKey {
        &self.key
    }
}

impl std::fmt::Debug for Signer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signer").field("address", &self.address).finish()
    }
}

impl Keystore {
    pub fn from_json(json: &str) -> Result<Self, KeystoreError> {
        let keystore: Keystore = serde_json::from_str(json)?;
        if keystore.version != 3 {
            return Err(KeystoreError::UnsupportedVersion(keystore.version));
        }
        Ok(keystore)
    }

    pub fn decrypt(&self, passphrase: &str) -> Result<Signer, KeystoreError> {
        let crypto = &self.crypto;

        if crypto.cipher != "aes-128-ctr" {
            return Err(KeystoreError::UnsupportedCipher(crypto.cipher.clone()));
        }

        let kdfparams = crypto.kdfparams.clone();
        let derived = match crypto.kdf.as_str() {
            "scrypt" => derive_scrypt(passphrase, &serde_json::from_value(kdfparams)?)?,
            "pbkdf2" => derive_pbkdf2(passphrase, &serde_json::from_value(kdfparams)?)?,
            other => return Err(KeystoreError::UnsupportedKdf(other.to_string())),
        };

        let ciphertext = decode_field("ciphertext", &crypto.ciphertext)?;
        let expected_mac = decode_field("mac", &crypto.mac)?;
        if mac(&derived, &ciphertext) != expected_mac.as_slice() {
            return Err(KeystoreError::MacMismatch);
        }

        let iv = decode_field("cipherparams.iv", &crypto.cipherparams.iv)?;
        let mut plaintext = Zeroizing::new(ciphertext);
        apply_cipher(&derived[..16], &iv, &mut plaintext)?;

        let key = SigningKey::from_slice(&plaintext).map_err(|_| KeystoreError::InvalidKey)?;
        Ok(Signer::from_key(key))
    }
}

fn derive_scrypt(
    passphrase: &str,
    params: &ScryptParams,
) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
    if !params.n.is_power_of_two() || params.n < 2 {
        return Err(KeystoreError::InvalidField {
            field: "kdfparams.n",
            reason: format!("{} is not a power of two", params.n),
        });
    }
    if params.dklen < 32 {
        return Err(KeystoreError::InvalidField {
            field: "kdfparams.dklen",
            reason: format!("{} is shorter than 32 bytes", params.dklen),
        });
    }

    let log_n = params.n.trailing_zeros() as u8;
    let scrypt_params = scrypt::Params::new(log_n, params.r, params.p, params.dklen).map_err(
        |error| KeystoreError::InvalidField {
            field: "kdfparams",
            reason: error.to_string(),
        },
    )?;

    let salt = decode_field("kdfparams.salt", &params.salt)?;
    let mut derived = Zeroizing::new(vec![0u8; params.dklen]);
    scrypt::scrypt(passphrase.as_bytes(), &salt, &scrypt_params, &mut derived).map_err(
        |error| KeystoreError::InvalidField {
            field: "kdfparams.dklen",
            reason: error.to_string(),
        },
    )?;
    Ok(derived)
}

fn derive_pbkdf2(
    passphrase: &str,
    params: &Pbkdf2Params,
) -> Result<Zeroizing<Vec<u8>>, KeystoreError> {
    if params.prf != "hmac-sha256" {
        return Err(KeystoreError::UnsupportedKdf(format!("pbkdf2/{}", params.prf)));
    }
    if params.c == 0 {
        return Err(KeystoreError::InvalidField {
            field: "kdfparams.c",
            reason: "iteration count must be positive".to_string(),
        });
    }
    if params.dklen < 32 {
        return Err(KeystoreError::InvalidField {
            field: "kdfparams.dklen",
            reason: format!("{} is shorter than 32 bytes", params.dklen),
        });
    }

    let salt = decode_field("kdfparams.salt", &params.salt)?;
    let mut derived = Zeroizing::new(vec![0u8; params.dklen]);
    pbkdf2::pbkdf2_hmac::<Sha256>(passphrase.as_bytes(), &salt, params.c, &mut derived);
    Ok(derived)
}

fn mac(derived: &[u8], ciphertext: &[u8]) -> [u8; 32] {
    let mut input = Vec::with_capacity(16 + ciphertext.len());
    input.extend_from_slice(&derived[16..32]);
    input.extend_from_slice(ciphertext);
    keccak256(&input)
}

fn apply_cipher(key: &[u8], iv: &[u8], buffer: &mut [u8]) -> Result<(), KeystoreError> {
    let mut cipher =
        Aes128Ctr::new_from_slices(key, iv).map_err(|error| KeystoreError::InvalidField {
            field: "cipherparams.iv",
            reason: error.to_string(),
        })?;
    cipher.apply_keystream(buffer);
    Ok(())
}

fn decode_field(field: &'static str, value: &str) -> Result<Vec<u8>, KeystoreError> {
    hex::decode(value.trim_start_matches("0x")).map_err(|error| KeystoreError::InvalidField {
        field,
        reason: error.to_string(),
    })
}

/// Build an encrypted keystore; used to provision fixtures with cheap scrypt parameters.
pub fn encrypt(
    secret: &[u8; 32],
    passphrase: &str,
    log_n: u8,
    salt: &[u8],
    iv: &[u8; 16],
) -> Result<Keystore, KeystoreError> {
    let params = ScryptParams {
        dklen: 32,
        n: 1u64 << log_n,
        p: 1,
        r: 8,
        salt: hex::encode(salt),
    };
    let derived = derive_scrypt(passphrase, &params)?;

    let mut ciphertext = secret.to_vec();
    apply_cipher(&derived[..16], iv, &mut ciphertext)?;

    let key = SigningKey::from_slice(secret).map_err(|_| KeystoreError::InvalidKey)?;
    let address = LedgerAddress::from_verifying_key(key.verifying_key());

    Ok(Keystore {
        address: Some(hex::encode(address.as_bytes())),
        crypto: CryptoSection {
            cipher: "aes-128-ctr".to_string(),
            ciphertext: hex::encode(&ciphertext),
            cipherparams: CipherParams { iv: hex::encode(iv) },
            kdf: "scrypt".to_string(),
            kdfparams: serde_json::to_value(&params)?,
            mac: hex::encode(mac(&derived, &ciphertext)),
        },
        id: None,
        version: 3,
    })
}
