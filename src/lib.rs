// src/lib.rs

//! # Certificate anchoring and verification
//!
//! Anchors a SHA-256 fingerprint of a document to an append-only ledger and
//! later proves the anchor exists, either through a keyed record contract or
//! by scanning recent block history for the fingerprint.
//!
//! ## Layers
//! 1. **Models**: fingerprints, certificate records, ledger views, outcomes
//! 2. **Blockchain**: the `LedgerClient` boundary, a JSON-RPC client and an in-memory ledger
//! 3. **Contracts**: record contract ABI encoding
//! 4. **Services**: registrar, lookup, scanner, verification and the API server

pub mod blockchain;
pub mod contracts;
pub mod error;
pub mod models;
pub mod services;
pub mod settings;
pub mod utils;

pub use error::{AnchorError, AnchorResult};
pub use models::fingerprint::Fingerprint;
pub use models::outcome::{VerificationBasis, VerificationOutcome};
pub use services::certificates::{CertificateService, DocumentInput};
pub use settings::Settings;
