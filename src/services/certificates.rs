// src/services/certificates.rs
//! Caller-facing certificate operations.
//!
//! Accepts either a document or an already computed fingerprint, applies the
//! deployment's admission rules (PDF guard, duplicate refusal) and hands the
//! fingerprint to the registrar or the verification orchestrator.

use crate::blockchain::ledger_client::LedgerClient;
use crate::error::{AnchorError, AnchorResult};
use crate::models::certificate::CertificateMetadata;
use crate::models::fingerprint::Fingerprint;
use crate::models::ledger::TransactionRef;
use crate::models::outcome::VerificationOutcome;
use crate::services::lookup::StructuredLookup;
use crate::services::registrar::Registrar;
use crate::services::scanner::ScanVerifier;
use crate::services::verifier::VerificationOrchestrator;
use crate::settings::Settings;
use crate::utils::crypto;
use log::info;
use serde::Serialize;
use std::sync::Arc;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// What a caller identifies a certificate by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentInput {
    /// Raw document bytes, fingerprinted on arrival
    Document(Vec<u8>),
    /// Hex fingerprint computed elsewhere
    Fingerprint(String),
}

impl DocumentInput {
    pub fn fingerprint(&self) -> AnchorResult<Fingerprint> {
        match self {
            DocumentInput::Document(bytes) => crypto::fingerprint(bytes),
            DocumentInput::Fingerprint(hex) => Fingerprint::parse(hex),
        }
    }
}

/// Result of a successful registration.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub fingerprint: Fingerprint,
    pub transaction: TransactionRef,
}

/// Result of a completed verification, tagged with the fingerprint checked.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub fingerprint: Fingerprint,
    #[serde(flatten)]
    pub outcome: VerificationOutcome,
}

#[derive(Clone)]
pub struct CertificateService {
    registrar: Registrar,
    verifier: VerificationOrchestrator,
    require_pdf: bool,
    dedupe: bool,
}

impl CertificateService {
    pub fn new(registrar: Registrar, verifier: VerificationOrchestrator) -> Self {
        Self { registrar, verifier, require_pdf: false, dedupe: false }
    }

    /// Wires registrar, lookup and scanner over one ledger client.
    pub fn from_settings(client: Arc<dyn LedgerClient>, settings: &Settings) -> AnchorResult<Self> {
        let mode = settings.anchor_mode()?;
        let registrar = Registrar::new(client.clone(), mode, settings.wait_policy());
        let verifier = VerificationOrchestrator::new(
            StructuredLookup::new(client.clone(), mode),
            ScanVerifier::new(client, settings.scan_options()),
        );

        Ok(Self::new(registrar, verifier)
            .require_pdf(settings.require_pdf)
            .dedupe(settings.dedupe_registrations))
    }

    /// Refuse documents that do not start with the PDF signature.
    pub fn require_pdf(mut self, require_pdf: bool) -> Self {
        self.require_pdf = require_pdf;
        self
    }

    /// Look the fingerprint up before writing, in record-contract mode.
    pub fn dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    /// Fingerprints `input` after the admission checks.
    pub fn fingerprint(&self, input: &DocumentInput) -> AnchorResult<Fingerprint> {
        if let DocumentInput::Document(bytes) = input {
            if self.require_pdf && !bytes.starts_with(PDF_MAGIC) {
                return Err(AnchorError::Input("document is not a PDF".into()));
            }
        }
        input.fingerprint()
    }

    /// Anchors `input` with `metadata`.
    ///
    /// # Errors
    /// - `AnchorError::AlreadyRegistered` when deduplication finds an existing record
    /// - everything `Registrar::register` returns
    pub async fn register_certificate(
        &self,
        input: &DocumentInput,
        metadata: &CertificateMetadata,
    ) -> AnchorResult<Registration> {
        let fingerprint = self.fingerprint(input)?;

        if self.dedupe && self.registrar.mode().record_contract().is_some() {
            if let Some(existing) = self.verifier.lookup().lookup(&fingerprint).await? {
                info!("refusing to re-register {}: already issued by {}", fingerprint, existing.issuer);
                return Err(AnchorError::AlreadyRegistered(fingerprint));
            }
        }

        let transaction = self.registrar.register(&fingerprint, metadata).await?;
        Ok(Registration { fingerprint, transaction })
    }

    pub async fn verify_certificate(&self, input: &DocumentInput) -> AnchorResult<Verification> {
        let fingerprint = self.fingerprint(input)?;
        let outcome = self.verifier.verify(&fingerprint).await?;
        Ok(Verification { fingerprint, outcome })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::memory::InMemoryLedger;
    use crate::models::outcome::VerificationBasis;
    use ethers_core::types::Address;
    use tokio_test::{assert_err, assert_ok};

    const REGISTRY: &str = "0x5fbdb2315678afecb367f032d93f642f64180aa3";

    fn settings(overrides: &[(&str, &str)]) -> Settings {
        let mut builder = Settings::defaults().unwrap().set_override("wait_for_confirmation", false).unwrap();
        for (key, value) in overrides {
            builder = builder.set_override(*key, *value).unwrap();
        }
        Settings::from_config(builder.build().unwrap()).unwrap()
    }

    fn record_ledger() -> Arc<InMemoryLedger> {
        let address: Address = REGISTRY.parse().unwrap();
        Arc::new(InMemoryLedger::new().with_record_contract(address))
    }

    fn acme() -> CertificateMetadata {
        CertificateMetadata::new("Acme", "Jane Doe", "Security-101", Some(1_999_999_999))
    }

    fn pdf(body: &str) -> DocumentInput {
        DocumentInput::Document(format!("%PDF-1.7\n{}", body).into_bytes())
    }

    #[tokio::test]
    async fn register_then_verify_by_record() {
        let ledger = record_ledger();
        let service = CertificateService::from_settings(ledger, &settings(&[("record_contract", REGISTRY)])).unwrap();
        let document = pdf("Jane Doe completed Security-101");

        let registration = assert_ok!(service.register_certificate(&document, &acme()).await);
        assert_eq!(registration.fingerprint, document.fingerprint().unwrap());

        let verification = assert_ok!(service.verify_certificate(&document).await);
        assert_eq!(verification.fingerprint, registration.fingerprint);
        assert_eq!(verification.outcome.basis, VerificationBasis::StructuredRecord);
        let record = verification.outcome.record.unwrap();
        assert_eq!(record.issuer, "Acme");
        assert_eq!(record.subject_name, "Jane Doe");
        assert_eq!(record.certification_label, "Security-101");
        assert_eq!(record.expiry_timestamp, 1_999_999_999);
    }

    #[tokio::test]
    async fn verify_by_fingerprint_matches_verify_by_document() {
        let ledger = Arc::new(InMemoryLedger::new());
        let service = CertificateService::from_settings(ledger.clone(), &settings(&[])).unwrap();
        let document = pdf("raw anchored");
        let fingerprint = document.fingerprint().unwrap();
        ledger.anchor_payload(fingerprint.to_bytes32().to_vec());

        let by_hex = DocumentInput::Fingerprint(fingerprint.as_hex().to_uppercase());
        let first = service.verify_certificate(&document).await.unwrap();
        let second = service.verify_certificate(&by_hex).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.outcome.basis, VerificationBasis::ScanMatch);
    }

    #[tokio::test]
    async fn duplicate_registration_is_refused() {
        let ledger = record_ledger();
        let service =
            CertificateService::from_settings(ledger.clone(), &settings(&[("record_contract", REGISTRY)])).unwrap();
        let document = pdf("once only");

        assert_ok!(service.register_certificate(&document, &acme()).await);
        let err = assert_err!(service.register_certificate(&document, &acme()).await);

        assert!(matches!(err, AnchorError::AlreadyRegistered(ref fp) if *fp == document.fingerprint().unwrap()));
        assert_eq!(ledger.record_count(), 1);
    }

    #[tokio::test]
    async fn dedupe_can_be_disabled() {
        let ledger = record_ledger();
        let service = CertificateService::from_settings(
            ledger,
            &settings(&[("record_contract", REGISTRY), ("dedupe_registrations", "false")]),
        )
        .unwrap();
        let document = pdf("twice");

        assert_ok!(service.register_certificate(&document, &acme()).await);
        // Without the pre-check the ledger itself refuses the second write.
        let err = assert_err!(service.register_certificate(&document, &acme()).await);
        assert!(matches!(err, AnchorError::SubmissionRejected(_)));
    }

    #[tokio::test]
    async fn pdf_guard_applies_to_documents_only() {
        let ledger = Arc::new(InMemoryLedger::new());
        let service = CertificateService::from_settings(ledger.clone(), &settings(&[("require_pdf", "true")])).unwrap();

        let plain = DocumentInput::Document(b"plain text".to_vec());
        let err = assert_err!(service.register_certificate(&plain, &acme()).await);
        assert!(matches!(err, AnchorError::Input(_)));
        assert!(matches!(service.verify_certificate(&plain).await, Err(AnchorError::Input(_))));

        let by_hex = DocumentInput::Fingerprint(crypto::fingerprint(b"plain text").unwrap().to_prefixed());
        assert!(service.verify_certificate(&by_hex).await.is_ok());
        assert_eq!(ledger.fetch_count(), 0);
    }

    #[tokio::test]
    async fn malformed_input_fails_before_touching_the_ledger() {
        let ledger = Arc::new(InMemoryLedger::new());
        let service = CertificateService::from_settings(ledger.clone(), &settings(&[])).unwrap();

        let empty = DocumentInput::Document(Vec::new());
        let bad_hex = DocumentInput::Fingerprint("0xnot-a-digest".into());
        assert!(matches!(service.verify_certificate(&empty).await, Err(AnchorError::Input(_))));
        assert!(matches!(service.verify_certificate(&bad_hex).await, Err(AnchorError::Input(_))));
        assert_eq!(ledger.fetch_count(), 0);
    }
}
