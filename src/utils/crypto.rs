// src/utils/crypto.rs
//! Document fingerprinting.
//!
//! Uses SHA-256 (via `ring`), the digest verifiers already compute in the
//! browser with `crypto.subtle`, so a fingerprint made here matches one made
//! anywhere else from the same bytes.

use crate::error::{AnchorError, AnchorResult};
use crate::models::fingerprint::{Fingerprint, FINGERPRINT_BYTES};
use ring::digest::{digest, SHA256};
use std::path::Path;

/// Computes the SHA-256 fingerprint of a document.
///
/// # Arguments
/// * `document` - Raw document bytes (typically a PDF)
///
/// # Returns
/// Lowercase hex fingerprint. Identical bytes always give the identical value:
/// no salt, no randomness, stable across restarts.
///
/// # Errors
/// `AnchorError::Input` if the document is empty.
///
/// # Example
/// ```
/// let fp = cert_anchor::utils::crypto::fingerprint(b"abc").unwrap();
/// assert_eq!(fp.as_hex(), "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
/// ```
pub fn fingerprint(document: &[u8]) -> AnchorResult<Fingerprint> {
    if document.is_empty() {
        return Err(AnchorError::Input("document is empty".into()));
    }

    let mut out = [0u8; FINGERPRINT_BYTES];
    out.copy_from_slice(digest(&SHA256, document).as_ref());
    Ok(Fingerprint::from_digest(out))
}

/// Reads a document from disk and fingerprints it.
///
/// # Errors
/// `AnchorError::Input` if the file cannot be read or is empty.
pub async fn fingerprint_file(path: impl AsRef<Path>) -> AnchorResult<Fingerprint> {
    let path = path.as_ref();
    let document = tokio::fs::read(path)
        .await
        .map_err(|e| AnchorError::Input(format!("cannot read {}: {}", path.display(), e)))?;
    fingerprint(&document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn matches_sha256_test_vector() {
        let fp = fingerprint(b"abc").unwrap();
        assert_eq!(
            fp.as_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn empty_document_is_input_error() {
        assert!(matches!(fingerprint(b""), Err(AnchorError::Input(_))));
    }

    #[test]
    fn deterministic_and_distinct_for_random_documents() {
        let mut rng = rand::thread_rng();
        for _ in 0..32 {
            let mut a = vec![0u8; 1 + (rng.next_u32() % 4096) as usize];
            rng.fill_bytes(&mut a);
            let mut b = a.clone();
            b[0] ^= 0x01;

            assert_eq!(fingerprint(&a).unwrap(), fingerprint(&a).unwrap());
            assert_ne!(fingerprint(&a).unwrap(), fingerprint(&b).unwrap());
        }
    }

    #[tokio::test]
    async fn file_fingerprint_equals_byte_fingerprint() {
        let path = std::env::temp_dir().join(format!("cert-anchor-{}.pdf", std::process::id()));
        tokio::fs::write(&path, b"%PDF-1.7 test document").await.unwrap();

        let from_file = fingerprint_file(&path).await.unwrap();
        assert_eq!(from_file, fingerprint(b"%PDF-1.7 test document").unwrap());

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn unreadable_file_is_input_error() {
        let missing = std::env::temp_dir().join("cert-anchor-definitely-missing.pdf");
        assert!(matches!(fingerprint_file(missing).await, Err(AnchorError::Input(_))));
    }
}
