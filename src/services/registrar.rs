// src/services/registrar.rs
//! Registrar Service
//!
//! Anchors a fingerprint and its certificate metadata on the ledger with
//! exactly one state mutation, in one of two modes:
//! - record contract: `storeCertificate` call, proves existence and authorship metadata
//! - raw payload: the digest as calldata of a self-addressed transaction,
//!   proves existence at a point in time only

use crate::blockchain::ledger_client::{ConfirmationPolicy, LedgerClient};
use crate::contracts::certificate_registry;
use crate::error::{AnchorError, AnchorResult};
use crate::models::certificate::CertificateMetadata;
use crate::models::fingerprint::Fingerprint;
use crate::models::ledger::TransactionRef;
use ethers_core::types::{Address, Bytes, U256};
use log::{info, warn};
use std::sync::Arc;

/// Where certificates live on the ledger. Shared by the write and read paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorMode {
    /// Structured records in the registry contract at this address
    RecordContract(Address),
    /// Digest embedded as transaction payload, found only by scanning
    RawPayload,
}

impl AnchorMode {
    pub fn record_contract(&self) -> Option<Address> {
        match self {
            AnchorMode::RecordContract(address) => Some(*address),
            AnchorMode::RawPayload => None,
        }
    }
}

/// Whether `register` returns on submission or after confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    Submitted,
    Confirmed(ConfirmationPolicy),
}

/// Builds and submits registration transactions.
#[derive(Clone)]
pub struct Registrar {
    /// Ledger the registrations are written to
    client: Arc<dyn LedgerClient>,
    mode: AnchorMode,
    wait: WaitPolicy,
}

impl Registrar {
    pub fn new(client: Arc<dyn LedgerClient>, mode: AnchorMode, wait: WaitPolicy) -> Self {
        Self { client, mode, wait }
    }

    pub fn mode(&self) -> AnchorMode {
        self.mode
    }

    /// Registers a certificate for `fingerprint`.
    ///
    /// An expiry in the past only logs a warning: parties' clocks disagree.
    /// The submission is never retried; on `ConfirmationTimeout` the write
    /// may still land, so callers must look the fingerprint up before trying again.
    ///
    /// # Errors
    /// - `AnchorError::Input` for metadata that could never be read back, or no signer in raw mode
    /// - `AnchorError::SubmissionRejected` / `LedgerUnavailable` from submission
    /// - `AnchorError::ConfirmationTimeout` when waiting is configured and depth is not reached
    pub async fn register(
        &self,
        fingerprint: &Fingerprint,
        metadata: &CertificateMetadata,
    ) -> AnchorResult<TransactionRef> {
        if let Some(expiry) = metadata.expiry_timestamp {
            let now = chrono::Utc::now().timestamp();
            if (expiry as i64) <= now {
                warn!("certificate {} registered with expiry {} already in the past", fingerprint, expiry);
            }
        }

        let (to, data) = match self.mode {
            AnchorMode::RecordContract(contract) => {
                if metadata.issuer.trim().is_empty() && metadata.subject_name.trim().is_empty() {
                    return Err(AnchorError::Input(
                        "issuer and subject name cannot both be empty".into(),
                    ));
                }
                (contract, certificate_registry::encode_store(fingerprint, metadata)?)
            }
            AnchorMode::RawPayload => {
                let own = self.client.signer_address().ok_or_else(|| {
                    AnchorError::Input("raw payload anchoring needs a signer".into())
                })?;
                (own, Bytes::from(fingerprint.to_bytes32().to_vec()))
            }
        };

        let submitted = self.client.submit_transaction(to, data, U256::zero()).await?;
        info!("certificate {} submitted in transaction {:#x}", fingerprint, submitted.hash);

        match &self.wait {
            WaitPolicy::Submitted => Ok(submitted),
            WaitPolicy::Confirmed(policy) => {
                let confirmed = self.client.wait_for_confirmation(submitted, policy).await?;
                info!(
                    "certificate {} confirmed in block {}",
                    fingerprint,
                    confirmed.block_number.unwrap_or_default()
                );
                Ok(confirmed)
            }
        }
    }
}
