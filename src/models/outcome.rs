// src/models/outcome.rs
//! Verification results handed back to callers.

use crate::models::certificate::CertificateRecord;
use ethers_core::types::H256;
use serde::{Deserialize, Serialize};

/// Which evidence decided a verification.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationBasis {
    StructuredRecord,
    ScanMatch,
    NotFound,
}

/// Location of a fingerprint found by scanning.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanMatch {
    pub block_number: u64,
    pub tx_hash: H256,
}

/// Result of one verification call. Built once, never mutated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct VerificationOutcome {
    pub valid: bool,
    pub basis: VerificationBasis,
    pub record: Option<CertificateRecord>,
    /// Set only for `ScanMatch`
    pub anchor: Option<ScanMatch>,
}

impl VerificationOutcome {
    pub fn structured(record: CertificateRecord) -> Self {
        Self {
            valid: true,
            basis: VerificationBasis::StructuredRecord,
            record: Some(record),
            anchor: None,
        }
    }

    pub fn scan_match(anchor: ScanMatch) -> Self {
        Self {
            valid: true,
            basis: VerificationBasis::ScanMatch,
            record: None,
            anchor: Some(anchor),
        }
    }

    /// Only valid after an exhaustive, successfully completed search.
    pub fn not_found() -> Self {
        Self {
            valid: false,
            basis: VerificationBasis::NotFound,
            record: None,
            anchor: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basis_serializes_in_screaming_case() {
        let json = serde_json::to_value(VerificationOutcome::not_found()).unwrap();
        assert_eq!(json["basis"], "NOT_FOUND");
        assert_eq!(json["valid"], false);
        assert!(json["record"].is_null());
    }

    #[test]
    fn scan_match_carries_anchor_without_record() {
        let outcome = VerificationOutcome::scan_match(ScanMatch {
            block_number: 42,
            tx_hash: H256::repeat_byte(7),
        });
        assert!(outcome.valid);
        assert_eq!(outcome.basis, VerificationBasis::ScanMatch);
        assert!(outcome.record.is_none());
        assert_eq!(outcome.anchor.unwrap().block_number, 42);
    }
}
