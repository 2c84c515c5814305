// src/blockchain/memory.rs
//! In-process ledger for tests and local demos.
//!
//! Automines every submission into its own block, emulates the certificate
//! registry contract through the real ABI encoding, and can inject the
//! faults a remote node produces: pruned blocks, transient read failures,
//! slow blocks, disconnection and refused writes.

use crate::blockchain::ledger_client::LedgerClient;
use crate::contracts::certificate_registry;
use crate::error::{AnchorError, AnchorResult};
use crate::models::certificate::{CertificateMetadata, CertificateRecord};
use crate::models::fingerprint::Fingerprint;
use crate::models::ledger::{Block, InclusionReceipt, TransactionRef};
use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};
use ethers_core::utils::keccak256;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Seconds between synthetic blocks.
const BLOCK_TIME: u64 = 12;

type RecordWrite = (Fingerprint, CertificateMetadata);

/// Ledger held entirely in memory.
pub struct InMemoryLedger {
    signer: Address,
    record_contract: Option<Address>,
    revert_on_missing: bool,
    genesis_time: u64,
    state: Mutex<LedgerState>,
}

struct LedgerState {
    blocks: Vec<Block>,
    records: HashMap<Fingerprint, CertificateRecord>,
    receipts: HashMap<H256, InclusionReceipt>,
    pending: Vec<(TransactionRef, Option<RecordWrite>)>,
    automine: bool,
    nonce: u64,
    pruned: HashSet<u64>,
    flaky: HashMap<u64, u32>,
    latency: HashMap<u64, Duration>,
    fetched: Vec<u64>,
    disconnected: bool,
    disconnect_after: Option<usize>,
    rejection: Option<String>,
}

impl Default for InMemoryLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryLedger {
    /// Ledger holding only a genesis block, with no record contract deployed.
    pub fn new() -> Self {
        let genesis_time = chrono::Utc::now().timestamp().max(0) as u64;
        Self {
            signer: Address::from_low_u64_be(0xa11ce),
            record_contract: None,
            revert_on_missing: false,
            genesis_time,
            state: Mutex::new(LedgerState {
                blocks: vec![Block { number: 0, timestamp: genesis_time, transactions: Vec::new() }],
                records: HashMap::new(),
                receipts: HashMap::new(),
                pending: Vec::new(),
                automine: true,
                nonce: 0,
                pruned: HashSet::new(),
                flaky: HashMap::new(),
                latency: HashMap::new(),
                fetched: Vec::new(),
                disconnected: false,
                disconnect_after: None,
                rejection: None,
            }),
        }
    }

    /// Deploys the certificate registry at `address`.
    pub fn with_record_contract(mut self, address: Address) -> Self {
        self.record_contract = Some(address);
        self
    }

    /// Makes `getCertificate` revert for unknown fingerprints instead of
    /// returning zero-valued fields.
    pub fn reverting_on_missing_record(mut self) -> Self {
        self.revert_on_missing = true;
        self
    }

    fn state(&self) -> MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Appends `count` empty blocks and returns the new head.
    pub fn mine_empty_blocks(&self, count: u64) -> u64 {
        let mut state = self.state();
        for _ in 0..count {
            self.mine(&mut state, Vec::new());
        }
        state.head()
    }

    /// Mines every pending submission into one block and returns its number.
    pub fn mine_pending(&self) -> u64 {
        let mut state = self.state();
        let pending = std::mem::take(&mut state.pending);
        self.mine(&mut state, pending)
    }

    /// Mines one block holding third-party transactions with the given payloads.
    pub fn push_block(&self, payloads: Vec<Vec<u8>>) -> u64 {
        let mut state = self.state();
        let txs = payloads
            .into_iter()
            .map(|payload| {
                state.nonce += 1;
                let hash = tx_hash(Address::from_low_u64_be(0xb0b), state.nonce);
                (TransactionRef::pending(hash, Bytes::from(payload)), None)
            })
            .collect();
        self.mine(&mut state, txs)
    }

    /// Mines a block with a single third-party transaction carrying `payload`.
    pub fn anchor_payload(&self, payload: impl Into<Vec<u8>>) -> u64 {
        self.push_block(vec![payload.into()])
    }

    /// Makes `height` permanently unavailable, as a pruned node would.
    pub fn prune_block(&self, height: u64) {
        self.state().pruned.insert(height);
    }

    /// Fails the next `times` fetches of `height` with `LedgerUnavailable`.
    pub fn fail_block_fetches(&self, height: u64, times: u32) {
        self.state().flaky.insert(height, times);
    }

    /// Delays every fetch of `height`.
    pub fn set_fetch_latency(&self, height: u64, latency: Duration) {
        self.state().latency.insert(height, latency);
    }

    /// Drops the connection: every call fails until `reconnect`.
    pub fn disconnect(&self) {
        self.state().disconnected = true;
    }

    /// Serves `fetches` block fetches, then drops the connection.
    pub fn disconnect_after_fetches(&self, fetches: usize) {
        self.state().disconnect_after = Some(fetches);
    }

    pub fn reconnect(&self) {
        let mut state = self.state();
        state.disconnected = false;
        state.disconnect_after = None;
    }

    /// Refuses every submission with `reason`.
    pub fn reject_submissions(&self, reason: &str) {
        self.state().rejection = Some(reason.to_string());
    }

    /// With automine off, submissions wait in the pool for `mine_pending`.
    pub fn set_automine(&self, automine: bool) {
        self.state().automine = automine;
    }

    /// Number of block fetches served or attempted.
    pub fn fetch_count(&self) -> usize {
        self.state().fetched.len()
    }

    /// Heights requested by block fetches, in request order.
    pub fn fetched_heights(&self) -> Vec<u64> {
        self.state().fetched.clone()
    }

    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    fn mine(&self, state: &mut LedgerState, txs: Vec<(TransactionRef, Option<RecordWrite>)>) -> u64 {
        let number = state.blocks.len() as u64;
        let timestamp = self.genesis_time + number * BLOCK_TIME;

        let mut transactions = Vec::with_capacity(txs.len());
        for (tx, write) in txs {
            if let Some((fingerprint, metadata)) = write {
                state.records.entry(fingerprint).or_insert_with(|| CertificateRecord {
                    issuer: metadata.issuer,
                    subject_name: metadata.subject_name,
                    certification_label: metadata.certification_label,
                    issue_timestamp: timestamp,
                    expiry_timestamp: metadata.expiry_timestamp.unwrap_or(0),
                });
            }
            state.receipts.insert(tx.hash, InclusionReceipt { block_number: number, success: true });
            transactions.push(tx.included_in(number));
        }

        state.blocks.push(Block { number, timestamp, transactions });
        number
    }

    /// Runs the registry contract's checks for a write, as gas estimation would.
    fn execute_store(&self, state: &LedgerState, data: &[u8]) -> AnchorResult<RecordWrite> {
        let (fingerprint, metadata) = certificate_registry::decode_store(data)
            .map_err(|e| AnchorError::SubmissionRejected(format!("execution reverted: {}", e)))?;
        let queued = state
            .pending
            .iter()
            .any(|(_, write)| matches!(write, Some((pending, _)) if *pending == fingerprint));
        if state.records.contains_key(&fingerprint) || queued {
            return Err(AnchorError::SubmissionRejected(
                "execution reverted: certificate already registered".into(),
            ));
        }
        Ok((fingerprint, metadata))
    }
}

impl LedgerState {
    fn head(&self) -> u64 {
        self.blocks.len() as u64 - 1
    }

    fn ensure_connected(&self) -> AnchorResult<()> {
        if self.disconnected {
            return Err(AnchorError::LedgerUnavailable("connection refused".into()));
        }
        Ok(())
    }
}

fn tx_hash(from: Address, nonce: u64) -> H256 {
    let mut preimage = from.as_bytes().to_vec();
    preimage.extend_from_slice(&nonce.to_be_bytes());
    H256::from(keccak256(preimage))
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    fn signer_address(&self) -> Option<Address> {
        Some(self.signer)
    }

    async fn current_height(&self) -> AnchorResult<u64> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.head())
    }

    async fn get_block(&self, number: u64, include_transactions: bool) -> AnchorResult<Option<Block>> {
        let latency = {
            let mut state = self.state();
            state.fetched.push(number);
            if let Some(limit) = state.disconnect_after {
                if state.fetched.len() > limit {
                    state.disconnected = true;
                }
            }
            state.ensure_connected()?;

            if let Some(remaining) = state.flaky.get_mut(&number) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(AnchorError::LedgerUnavailable(format!("timeout fetching block {}", number)));
                }
            }
            state.latency.get(&number).copied()
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let state = self.state();
        state.ensure_connected()?;
        if state.pruned.contains(&number) {
            return Ok(None);
        }
        Ok(state.blocks.get(number as usize).map(|block| {
            let mut block = block.clone();
            if !include_transactions {
                block.transactions.clear();
            }
            block
        }))
    }

    async fn submit_transaction(&self, to: Address, data: Bytes, _value: U256) -> AnchorResult<TransactionRef> {
        let mut state = self.state();
        state.ensure_connected()?;
        if let Some(reason) = &state.rejection {
            return Err(AnchorError::SubmissionRejected(reason.clone()));
        }

        let write = match self.record_contract {
            Some(contract) if contract == to => Some(self.execute_store(&state, &data)?),
            _ => None,
        };

        state.nonce += 1;
        let tx = TransactionRef::pending(tx_hash(self.signer, state.nonce), data);
        if state.automine {
            self.mine(&mut state, vec![(tx.clone(), write)]);
        } else {
            state.pending.push((tx.clone(), write));
        }
        Ok(tx)
    }

    async fn transaction_receipt(&self, hash: H256) -> AnchorResult<Option<InclusionReceipt>> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.receipts.get(&hash).copied())
    }

    async fn call_read_only(&self, contract: Address, selector: [u8; 4], args: &[u8]) -> AnchorResult<Bytes> {
        let state = self.state();
        state.ensure_connected()?;

        // Calling an address without code succeeds with empty output.
        if self.record_contract != Some(contract) {
            return Ok(Bytes::new());
        }
        if selector != certificate_registry::lookup_selector() {
            return Err(AnchorError::CallReverted("unknown function selector".into()));
        }

        let fingerprint = certificate_registry::decode_lookup_args(selector, args)
            .map_err(|e| AnchorError::CallReverted(e.to_string()))?;
        match state.records.get(&fingerprint) {
            Some(record) => Ok(certificate_registry::encode_record(record)),
            None if self.revert_on_missing => Err(AnchorError::CallReverted("certificate not found".into())),
            None => Ok(certificate_registry::encode_record(&CertificateRecord {
                issuer: String::new(),
                subject_name: String::new(),
                certification_label: String::new(),
                issue_timestamp: 0,
                expiry_timestamp: 0,
            })),
        }
    }
}
