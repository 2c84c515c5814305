// src/models/fingerprint.rs
//! Document fingerprint: the identity of a document on the ledger.
//!
//! A fingerprint is a 256-bit digest held as 64 lowercase hex characters.
//! Parsing accepts an optional `0x` prefix and any letter case, so values
//! copied from explorers, wallets or contract storage all compare equal.

use crate::error::{AnchorError, AnchorResult};
use ethers_core::utils::hex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Length of the digest in bytes.
pub const FINGERPRINT_BYTES: usize = 32;

/// Lowercase hex SHA-256 digest of a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds a fingerprint from raw digest bytes.
    pub fn from_digest(digest: [u8; FINGERPRINT_BYTES]) -> Self {
        Fingerprint(hex::encode(digest))
    }

    /// Parses a hex fingerprint, with or without `0x`, in any case.
    ///
    /// # Errors
    /// `AnchorError::Input` unless the value is exactly 64 hex digits.
    pub fn parse(value: &str) -> AnchorResult<Self> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.len() != FINGERPRINT_BYTES * 2 {
            return Err(AnchorError::Input(format!(
                "fingerprint must be {} hex digits, got {}",
                FINGERPRINT_BYTES * 2,
                digits.len()
            )));
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(AnchorError::Input(format!("fingerprint is not hex: {}", value)));
        }

        Ok(Fingerprint(digits.to_ascii_lowercase()))
    }

    /// Bare lowercase hex digits.
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Hex digits with the `0x` marker used for ledger data.
    pub fn to_prefixed(&self) -> String {
        format!("0x{}", self.0)
    }

    /// Raw digest, as stored in a `bytes32` contract slot.
    pub fn to_bytes32(&self) -> [u8; FINGERPRINT_BYTES] {
        let mut out = [0u8; FINGERPRINT_BYTES];
        // Construction guarantees 64 valid hex digits, so decoding cannot fail.
        hex::decode_to_slice(&self.0, &mut out).map(|_| out).unwrap_or_default()
    }

    /// Whether a transaction payload carries this fingerprint.
    ///
    /// Matches when the hex rendering of the payload contains the digest
    /// (payload is exactly the digest, or embeds it among ABI fields), or when
    /// the payload is text that contains the hex digest in any case.
    pub fn appears_in(&self, payload: &[u8]) -> bool {
        if payload.is_empty() {
            return false;
        }
        if hex::encode(payload).contains(self.0.as_str()) {
            return true;
        }
        payload.len() >= self.0.len()
            && payload
                .to_ascii_lowercase()
                .windows(self.0.len())
                .any(|window| window == self.0.as_bytes())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", self.0)
    }
}

impl FromStr for Fingerprint {
    type Err = AnchorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Fingerprint::parse(s)
    }
}

impl TryFrom<String> for Fingerprint {
    type Error = AnchorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Fingerprint::parse(&value)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.to_prefixed()
    }
}
