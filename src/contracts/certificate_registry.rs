// src/contracts/certificate_registry.rs
//! Certificate registry contract interface.
//!
//! ABI encoding and decoding for the two logical operations of the record
//! contract:
//! - `storeCertificate(bytes32,string,string,string,uint256)` (state-mutating)
//! - `getCertificate(bytes32) -> (string,string,string,uint256,uint256)` (view;
//!   reverts or returns zero-valued fields when absent)
//!
//! Transport is not handled here; callers pass the bytes to a `LedgerClient`.

use crate::error::{AnchorError, AnchorResult};
use crate::models::certificate::{CertificateMetadata, CertificateRecord};
use crate::models::fingerprint::Fingerprint;
use ethers_contract::BaseContract;
use ethers_core::abi::{self, parse_abi, Tokenize};
use ethers_core::types::{Bytes, U256};
use once_cell::sync::Lazy;

const STORE_CERTIFICATE: &str = "storeCertificate";
const GET_CERTIFICATE: &str = "getCertificate";

static REGISTRY: Lazy<BaseContract> = Lazy::new(|| {
    let abi = parse_abi(&[
        "function storeCertificate(bytes32,string,string,string,uint256)",
        "function getCertificate(bytes32) view returns (string,string,string,uint256,uint256)",
    ])
    .expect("certificate registry ABI is well-formed");
    BaseContract::from(abi)
});

type StoreArgs = ([u8; 32], String, String, String, U256);
type RecordTuple = (String, String, String, U256, U256);

/// Calldata for `storeCertificate`.
///
/// # Errors
/// `AnchorError::Input` if the arguments cannot be ABI-encoded.
pub fn encode_store(fingerprint: &Fingerprint, metadata: &CertificateMetadata) -> AnchorResult<Bytes> {
    let args: StoreArgs = (
        fingerprint.to_bytes32(),
        metadata.issuer.clone(),
        metadata.subject_name.clone(),
        metadata.certification_label.clone(),
        U256::from(metadata.expiry_or_zero()),
    );
    REGISTRY
        .encode(STORE_CERTIFICATE, args)
        .map_err(|e| AnchorError::Input(format!("cannot encode {}: {}", STORE_CERTIFICATE, e)))
}

/// Decodes `storeCertificate` calldata back into its fields.
pub fn decode_store(calldata: &[u8]) -> AnchorResult<(Fingerprint, CertificateMetadata)> {
    expect_selector(calldata, STORE_CERTIFICATE)?;
    let (digest, issuer, subject_name, certification_label, expiry): StoreArgs = REGISTRY
        .decode(STORE_CERTIFICATE, calldata)
        .map_err(|e| AnchorError::Input(format!("malformed {} calldata: {}", STORE_CERTIFICATE, e)))?;

    let expiry = saturating_u64(expiry);
    let metadata = CertificateMetadata {
        issuer,
        subject_name,
        certification_label,
        expiry_timestamp: (expiry != 0).then_some(expiry),
    };
    Ok((Fingerprint::from_digest(digest), metadata))
}

/// Selector and encoded arguments for a `getCertificate` call.
pub fn lookup_call(fingerprint: &Fingerprint) -> AnchorResult<([u8; 4], Vec<u8>)> {
    let calldata = REGISTRY
        .encode(GET_CERTIFICATE, (fingerprint.to_bytes32(),))
        .map_err(|e| AnchorError::Input(format!("cannot encode {}: {}", GET_CERTIFICATE, e)))?;

    let mut selector = [0u8; 4];
    selector.copy_from_slice(&calldata[..4]);
    Ok((selector, calldata[4..].to_vec()))
}

/// Fingerprint argument of a `getCertificate` call.
pub fn decode_lookup_args(selector: [u8; 4], args: &[u8]) -> AnchorResult<Fingerprint> {
    let mut calldata = selector.to_vec();
    calldata.extend_from_slice(args);
    expect_selector(&calldata, GET_CERTIFICATE)?;
    let digest: [u8; 32] = REGISTRY
        .decode(GET_CERTIFICATE, calldata)
        .map_err(|e| AnchorError::Input(format!("malformed {} calldata: {}", GET_CERTIFICATE, e)))?;
    Ok(Fingerprint::from_digest(digest))
}

/// Decodes the return data of `getCertificate`.
///
/// # Errors
/// `AnchorError::LedgerUnavailable` when the node returned bytes that are not
/// a valid record tuple.
pub fn decode_record(output: &[u8]) -> AnchorResult<CertificateRecord> {
    let (issuer, subject_name, certification_label, issued, expiry): RecordTuple = REGISTRY
        .decode_output(GET_CERTIFICATE, output)
        .map_err(|e| {
            AnchorError::LedgerUnavailable(format!("malformed {} output: {}", GET_CERTIFICATE, e))
        })?;

    Ok(CertificateRecord {
        issuer,
        subject_name,
        certification_label,
        issue_timestamp: saturating_u64(issued),
        expiry_timestamp: saturating_u64(expiry),
    })
}

/// Return data of `getCertificate` for a record (zero-valued for absent ones).
pub fn encode_record(record: &CertificateRecord) -> Bytes {
    let tokens = (
        record.issuer.clone(),
        record.subject_name.clone(),
        record.certification_label.clone(),
        U256::from(record.issue_timestamp),
        U256::from(record.expiry_timestamp),
    )
        .into_tokens();
    Bytes::from(abi::encode(&tokens))
}

/// Four-byte selector of `storeCertificate`.
pub fn store_selector() -> [u8; 4] {
    selector_of(STORE_CERTIFICATE)
}

/// Four-byte selector of `getCertificate`.
pub fn lookup_selector() -> [u8; 4] {
    selector_of(GET_CERTIFICATE)
}

fn selector_of(name: &str) -> [u8; 4] {
    REGISTRY
        .abi()
        .function(name)
        .map(|function| function.short_signature())
        .unwrap_or_default()
}

fn expect_selector(calldata: &[u8], name: &str) -> AnchorResult<()> {
    if calldata.len() < 4 || calldata[..4] != selector_of(name) {
        return Err(AnchorError::Input(format!("calldata is not a {} call", name)));
    }
    Ok(())
}

fn saturating_u64(value: U256) -> u64 {
    if value > U256::from(u64::MAX) {
        u64::MAX
    } else {
        value.as_u64()
    }
}
