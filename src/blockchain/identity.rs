// src/blockchain/identity.rs
//! Identity boundary.
//!
//! The engine never manages credentials. It receives an `IdentityProvider`
//! at construction and asks it for a signer whenever a write is needed.

use crate::error::{AnchorError, AnchorResult};
use ethers::signers::{LocalWallet, Signer, Wallet};
use ethers_core::types::Address;
use ethers_core::utils::hex;
use k256::ecdsa::SigningKey;

/// Opaque capability that yields a transaction signer.
pub trait IdentityProvider: Send + Sync {
    /// Address transactions will be sent from.
    fn address(&self) -> Address;

    /// Wallet bound to `chain_id`, ready to sign.
    fn signer(&self, chain_id: u64) -> LocalWallet;
}

/// Identity backed by a secp256k1 private key held in memory.
#[derive(Clone)]
pub struct PrivateKeyIdentity {
    wallet: LocalWallet,
}

impl PrivateKeyIdentity {
    /// Builds an identity from a hex-encoded private key.
    ///
    /// # Arguments
    /// * `private_key` - 32-byte key in hex, with or without 0x prefix
    ///
    /// # Errors
    /// `AnchorError::Input` if the key is not valid hex or not a valid scalar.
    pub fn from_hex(private_key: &str) -> AnchorResult<Self> {
        let digits = private_key.trim().trim_start_matches("0x");
        let key_bytes = hex::decode(digits)
            .map_err(|e| AnchorError::Input(format!("private key is not hex: {}", e)))?;
        let signing_key = SigningKey::from_slice(&key_bytes)
            .map_err(|e| AnchorError::Input(format!("invalid private key: {}", e)))?;

        Ok(Self { wallet: Wallet::from(signing_key) })
    }
}

impl IdentityProvider for PrivateKeyIdentity {
    fn address(&self) -> Address {
        self.wallet.address()
    }

    fn signer(&self, chain_id: u64) -> LocalWallet {
        self.wallet.clone().with_chain_id(chain_id)
    }
}
