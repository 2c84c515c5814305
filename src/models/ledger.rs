// src/models/ledger.rs
//! Read-only views of ledger data, independent of any RPC library.

use ethers_core::types::{Bytes, H256};
use serde::{Deserialize, Serialize};

/// A transaction as seen by this engine.
///
/// `block_number` is `None` until the transaction has been included.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionRef {
    pub hash: H256,
    pub block_number: Option<u64>,
    pub payload: Bytes,
}

impl TransactionRef {
    pub fn pending(hash: H256, payload: Bytes) -> Self {
        Self { hash, block_number: None, payload }
    }

    pub fn included_in(self, block_number: u64) -> Self {
        Self { block_number: Some(block_number), ..self }
    }
}

/// A block with the transactions requested from the ledger.
///
/// Blocks fetched without transactions carry an empty list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub number: u64,
    pub timestamp: u64,
    pub transactions: Vec<TransactionRef>,
}

/// Inclusion facts from a transaction receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InclusionReceipt {
    pub block_number: u64,
    /// `false` when execution reverted inside the block
    pub success: bool,
}
