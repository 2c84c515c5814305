// src/services/lookup.rs
//! Structured certificate lookup against the record contract.

use crate::blockchain::ledger_client::LedgerClient;
use crate::contracts::certificate_registry;
use crate::error::{AnchorError, AnchorResult};
use crate::models::certificate::CertificateRecord;
use crate::models::fingerprint::Fingerprint;
use crate::services::registrar::AnchorMode;
use log::debug;
use std::sync::Arc;

/// Keyed, O(1) read of a certificate record.
#[derive(Clone)]
pub struct StructuredLookup {
    client: Arc<dyn LedgerClient>,
    mode: AnchorMode,
}

impl StructuredLookup {
    pub fn new(client: Arc<dyn LedgerClient>, mode: AnchorMode) -> Self {
        Self { client, mode }
    }

    /// Looks up the certificate stored for `fingerprint`.
    ///
    /// # Returns
    /// - `Ok(Some(record))` for a stored certificate
    /// - `Ok(None)` when the call reverts, the identity fields are both empty,
    ///   the contract returns nothing, or no record contract is configured
    ///
    /// # Errors
    /// `AnchorError::LedgerUnavailable` for every other fault.
    pub async fn lookup(&self, fingerprint: &Fingerprint) -> AnchorResult<Option<CertificateRecord>> {
        let Some(contract) = self.mode.record_contract() else {
            return Ok(None);
        };

        let (selector, args) = certificate_registry::lookup_call(fingerprint)?;
        let output = match self.client.call_read_only(contract, selector, &args).await {
            Ok(output) => output,
            Err(AnchorError::CallReverted(reason)) => {
                debug!("no record for {}: call reverted ({})", fingerprint, reason);
                return Ok(None);
            }
            Err(AnchorError::LedgerUnavailable(reason)) => return Err(AnchorError::LedgerUnavailable(reason)),
            Err(other) => return Err(AnchorError::LedgerUnavailable(other.to_string())),
        };

        if output.is_empty() {
            debug!("no record for {}: {:#x} returned no data", fingerprint, contract);
            return Ok(None);
        }

        let record = certificate_registry::decode_record(&output)?;
        if record.is_blank() {
            debug!("no record for {}: blank record", fingerprint);
            return Ok(None);
        }
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::InMemoryLedger;
    use crate::models::certificate::CertificateMetadata;
    use crate::services::registrar::{Registrar, WaitPolicy};
    use crate::utils::crypto::fingerprint;
    use ethers_core::types::Address;

    fn registry() -> Address {
        Address::from_low_u64_be(0xce47)
    }

    #[tokio::test]
    async fn register_then_lookup_round_trips() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        let mode = AnchorMode::RecordContract(registry());
        let registrar = Registrar::new(ledger.clone(), mode, WaitPolicy::Submitted);
        let lookup = StructuredLookup::new(ledger.clone(), mode);
        let fp = fingerprint(b"%PDF-1.4 certificate").unwrap();
        let metadata = CertificateMetadata::new("Acme", "Jane Doe", "Security-101", Some(1_999_999_999));

        registrar.register(&fp, &metadata).await.unwrap();
        let record = lookup.lookup(&fp).await.unwrap().unwrap();

        assert_eq!(record.issuer, metadata.issuer);
        assert_eq!(record.subject_name, metadata.subject_name);
        assert_eq!(record.certification_label, metadata.certification_label);
        assert_eq!(record.expiry_timestamp, 1_999_999_999);
        assert!(record.issue_timestamp > 0);
    }

    #[tokio::test]
    async fn blank_record_is_not_found() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        let lookup = StructuredLookup::new(ledger, AnchorMode::RecordContract(registry()));
        let fp = fingerprint(b"unknown").unwrap();

        assert_eq!(lookup.lookup(&fp).await.unwrap(), None);
    }

    #[tokio::test]
    async fn revert_is_not_found() {
        let ledger = Arc::new(
            InMemoryLedger::new()
                .with_record_contract(registry())
                .reverting_on_missing_record(),
        );
        let lookup = StructuredLookup::new(ledger, AnchorMode::RecordContract(registry()));
        let fp = fingerprint(b"unknown").unwrap();

        assert_eq!(lookup.lookup(&fp).await.unwrap(), None);
    }

    #[tokio::test]
    async fn raw_mode_never_calls_the_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.disconnect();
        let lookup = StructuredLookup::new(ledger, AnchorMode::RawPayload);
        let fp = fingerprint(b"anything").unwrap();

        assert_eq!(lookup.lookup(&fp).await.unwrap(), None);
    }

    #[tokio::test]
    async fn address_without_code_is_not_found() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        let lookup = StructuredLookup::new(ledger, AnchorMode::RecordContract(Address::from_low_u64_be(1)));
        let fp = fingerprint(b"anything").unwrap();

        assert_eq!(lookup.lookup(&fp).await.unwrap(), None);
    }

    #[tokio::test]
    async fn disconnection_is_unavailable() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        ledger.disconnect();
        let lookup = StructuredLookup::new(ledger, AnchorMode::RecordContract(registry()));
        let fp = fingerprint(b"anything").unwrap();

        assert!(matches!(lookup.lookup(&fp).await, Err(AnchorError::LedgerUnavailable(_))));
    }
}
