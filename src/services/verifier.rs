// src/services/verifier.rs
//! Certificate verification service.
//!
//! Combines the structured lookup and the history scan into one decision:
//! 1. Structured record found: valid, basis `STRUCTURED_RECORD`
//! 2. Otherwise scan the configured window: a hit is valid, basis `SCAN_MATCH`
//! 3. Exhausted window: invalid, basis `NOT_FOUND`
//!
//! Infrastructure failures from either stage fail the whole verification.
//! A verifier that could not check must never answer "invalid".

use crate::error::{AnchorError, AnchorResult};
use crate::models::fingerprint::Fingerprint;
use crate::models::outcome::VerificationOutcome;
use crate::services::lookup::StructuredLookup;
use crate::services::scanner::ScanVerifier;
use log::{info, warn};
use tokio::time::{timeout_at, Instant};

/// Verification orchestrator with a fixed precedence: record, then scan.
#[derive(Clone)]
pub struct VerificationOrchestrator {
    lookup: StructuredLookup,
    scanner: ScanVerifier,
}

impl VerificationOrchestrator {
    pub fn new(lookup: StructuredLookup, scanner: ScanVerifier) -> Self {
        Self { lookup, scanner }
    }

    pub fn lookup(&self) -> &StructuredLookup {
        &self.lookup
    }

    /// Verifies `fingerprint` within the scanner's configured deadline.
    pub async fn verify(&self, fingerprint: &Fingerprint) -> AnchorResult<VerificationOutcome> {
        let deadline = Instant::now() + self.scanner.options().deadline;
        self.verify_until(fingerprint, deadline).await
    }

    /// Verifies `fingerprint`, giving up at `deadline`.
    ///
    /// # Errors
    /// - `AnchorError::LedgerUnavailable` from the lookup or the scan
    /// - `AnchorError::ScanIncomplete` when the deadline cuts the scan short
    pub async fn verify_until(
        &self,
        fingerprint: &Fingerprint,
        deadline: Instant,
    ) -> AnchorResult<VerificationOutcome> {
        let record = timeout_at(deadline, self.lookup.lookup(fingerprint))
            .await
            .map_err(|_| AnchorError::LedgerUnavailable("record lookup timed out".into()))??;

        if let Some(record) = record {
            info!("certificate {} verified by structured record from {}", fingerprint, record.issuer);
            return Ok(VerificationOutcome::structured(record));
        }

        let window = self.scanner.options().window;
        let report = match self.scanner.scan_until(fingerprint, window, deadline).await {
            Ok(report) => report,
            Err(e) => {
                warn!("verification of {} could not complete: {}", fingerprint, e);
                return Err(e);
            }
        };

        Ok(match report.matched {
            Some(anchor) => VerificationOutcome::scan_match(anchor),
            None => {
                info!("certificate {} not found in the last {} blocks", fingerprint, report.blocks_scanned);
                VerificationOutcome::not_found()
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::InMemoryLedger;
    use crate::models::certificate::CertificateMetadata;
    use crate::models::outcome::VerificationBasis;
    use crate::services::registrar::{AnchorMode, Registrar, WaitPolicy};
    use crate::services::scanner::ScanOptions;
    use crate::utils::crypto::fingerprint;
    use ethers_core::types::Address;
    use std::sync::Arc;
    use std::time::Duration;

    fn registry() -> Address {
        Address::from_low_u64_be(0xce47)
    }

    fn orchestrator(ledger: Arc<InMemoryLedger>, mode: AnchorMode, window: u64) -> VerificationOrchestrator {
        let options = ScanOptions {
            window,
            concurrency: 4,
            fetch_retries: 1,
            retry_backoff: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        };
        VerificationOrchestrator::new(
            StructuredLookup::new(ledger.clone(), mode),
            ScanVerifier::new(ledger, options),
        )
    }

    #[tokio::test]
    async fn structured_record_takes_precedence_over_scan() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        let mode = AnchorMode::RecordContract(registry());
        let fp = fingerprint(b"both paths").unwrap();
        Registrar::new(ledger.clone(), mode, WaitPolicy::Submitted)
            .register(&fp, &CertificateMetadata::new("Acme", "Jane Doe", "Security-101", None))
            .await
            .unwrap();
        // The storeCertificate calldata itself also carries the digest.
        ledger.anchor_payload(fp.to_bytes32().to_vec());

        let outcome = orchestrator(ledger, mode, 10).verify(&fp).await.unwrap();

        assert_eq!(outcome.basis, VerificationBasis::StructuredRecord);
        assert!(outcome.valid);
        assert!(outcome.anchor.is_none());
    }

    #[tokio::test]
    async fn falls_back_to_scan_match() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        let fp = fingerprint(b"raw anchor").unwrap();
        ledger.mine_empty_blocks(4);
        let block = ledger.anchor_payload(fp.to_prefixed().into_bytes());
        ledger.mine_empty_blocks(2);

        let outcome = orchestrator(ledger, AnchorMode::RecordContract(registry()), 10)
            .verify(&fp)
            .await
            .unwrap();

        assert_eq!(outcome.basis, VerificationBasis::ScanMatch);
        assert!(outcome.valid);
        assert!(outcome.record.is_none());
        assert_eq!(outcome.anchor.unwrap().block_number, block);
    }

    #[tokio::test]
    async fn exhausted_window_is_not_found() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.mine_empty_blocks(25);
        let fp = fingerprint(b"never registered").unwrap();

        let outcome = orchestrator(ledger.clone(), AnchorMode::RawPayload, 10)
            .verify(&fp)
            .await
            .unwrap();

        assert_eq!(outcome, VerificationOutcome::not_found());
        assert_eq!(ledger.fetch_count(), 10);
    }

    #[tokio::test]
    async fn lookup_outage_fails_verification() {
        let ledger = Arc::new(InMemoryLedger::new().with_record_contract(registry()));
        ledger.disconnect();
        let fp = fingerprint(b"any").unwrap();

        let err = orchestrator(ledger, AnchorMode::RecordContract(registry()), 10)
            .verify(&fp)
            .await
            .unwrap_err();
        assert!(matches!(err, AnchorError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn scan_outage_fails_verification() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.mine_empty_blocks(30);
        ledger.disconnect_after_fetches(5);
        let fp = fingerprint(b"any").unwrap();

        let err = orchestrator(ledger, AnchorMode::RawPayload, 20).verify(&fp).await.unwrap_err();
        assert!(matches!(err, AnchorError::LedgerUnavailable(_)));
    }

    #[tokio::test]
    async fn deadline_fails_with_incomplete_scan() {
        let ledger = Arc::new(InMemoryLedger::new());
        ledger.mine_empty_blocks(30);
        ledger.set_fetch_latency(30, Duration::from_secs(5));
        let fp = fingerprint(b"any").unwrap();

        let err = orchestrator(ledger, AnchorMode::RawPayload, 20)
            .verify_until(&fp, Instant::now() + Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, AnchorError::ScanIncomplete { .. }));
        assert!(err.is_infrastructure());
    }
}
