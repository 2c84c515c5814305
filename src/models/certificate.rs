// src/models/certificate.rs
//! Certificate data model.
//!
//! Defines the record held by the ledger's record store and the metadata a
//! registrant supplies when anchoring a document.

use serde::{Deserialize, Serialize};

/// A certificate as stored in the record contract, keyed by fingerprint.
///
/// Immutable once written: the contract exposes no update or delete.
///
/// # Fields
/// - `issuer`: identity of the issuing party
/// - `subject_name`: person or entity the certificate is about
/// - `certification_label`: what was certified
/// - `issue_timestamp`: block time of the registration, in seconds
/// - `expiry_timestamp`: expiry in seconds, `0` when the certificate never expires
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CertificateRecord {
    /// Identity of the issuer
    /// Example: "Acme"
    pub issuer: String,

    /// Certified person or entity
    /// Example: "Jane Doe"
    pub subject_name: String,

    /// Name of the certification
    /// Example: "Security-101"
    pub certification_label: String,

    /// Seconds since the Unix epoch at which the record was written
    pub issue_timestamp: u64,

    /// Seconds since the Unix epoch after which the certificate lapses
    pub expiry_timestamp: u64,
}

impl CertificateRecord {
    /// Whether the record has lapsed at `now` (seconds). Zero expiry never lapses.
    pub fn is_expired_at(&self, now: i64) -> bool {
        self.expiry_timestamp != 0 && (self.expiry_timestamp as i64) <= now
    }

    /// Whether the store returned zero-valued identity fields, meaning "absent".
    pub fn is_blank(&self) -> bool {
        self.issuer.is_empty() && self.subject_name.is_empty()
    }
}

/// Metadata supplied at registration time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CertificateMetadata {
    pub issuer: String,
    pub subject_name: String,
    pub certification_label: String,
    /// `None` registers a certificate without expiry
    #[serde(default)]
    pub expiry_timestamp: Option<u64>,
}

impl CertificateMetadata {
    pub fn new(
        issuer: impl Into<String>,
        subject_name: impl Into<String>,
        certification_label: impl Into<String>,
        expiry_timestamp: Option<u64>,
    ) -> Self {
        Self {
            issuer: issuer.into(),
            subject_name: subject_name.into(),
            certification_label: certification_label.into(),
            expiry_timestamp,
        }
    }

    /// Expiry as written to the contract.
    pub fn expiry_or_zero(&self) -> u64 {
        self.expiry_timestamp.unwrap_or(0)
    }
}
