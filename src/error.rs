// src/error.rs
//! Error taxonomy for certificate anchoring and verification.
//!
//! The variants separate three families of failure that callers must never
//! confuse with one another:
//! - local input problems (`Input`), never retried
//! - infrastructure problems (`LedgerUnavailable`, `ConfirmationTimeout`,
//!   `ScanIncomplete`), which say nothing about the certificate itself
//! - ledger verdicts (`SubmissionRejected`, `CallReverted`, `AlreadyRegistered`)
//!
//! "No record" is not an error: lookups return `Option`.

use crate::models::fingerprint::Fingerprint;
use ethers_core::types::H256;

/// Every failure the anchoring engine can surface.
#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    /// Malformed or unreadable input (empty document, bad hex, bad address).
    #[error("invalid input: {0}")]
    Input(String),

    /// Connectivity or node fault. Retryable by the caller with backoff.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// The ledger refused the write. Terminal, never resent automatically.
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),

    /// The write may or may not have landed.
    #[error("transaction {hash:#x} not confirmed to depth {confirmations} before timeout")]
    ConfirmationTimeout { hash: H256, confirmations: u64 },

    /// Remote execution reverted. Lookups translate this into "not found".
    #[error("contract call reverted: {0}")]
    CallReverted(String),

    /// Deadline reached before the scan window was exhausted.
    ///
    /// `partial_match` is set when a lower block already matched while a
    /// higher one was still outstanding.
    #[error("scan incomplete: {scanned} of {window} blocks checked (partial match: {partial_match})")]
    ScanIncomplete {
        scanned: u64,
        window: u64,
        partial_match: bool,
    },

    /// The record store already holds a certificate for this fingerprint.
    #[error("certificate {0} is already registered")]
    AlreadyRegistered(Fingerprint),
}

impl AnchorError {
    /// Whether retrying the same read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnchorError::LedgerUnavailable(_))
    }

    /// Whether the failure is about infrastructure rather than the certificate.
    ///
    /// None of these may ever be reported to a user as "certificate invalid".
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            AnchorError::LedgerUnavailable(_)
                | AnchorError::ConfirmationTimeout { .. }
                | AnchorError::ScanIncomplete { .. }
        )
    }
}

pub type AnchorResult<T> = Result<T, AnchorError>;
