// src/blockchain/ledger_client.rs
//! The single point of contact with a remote ledger.
//!
//! `LedgerClient` is a stateless facade: reads are idempotent and may be
//! retried by callers, writes happen at most once per call. Nothing here
//! resends a transaction, since a resend can register a certificate twice.

use crate::error::{AnchorError, AnchorResult};
use crate::models::ledger::{Block, InclusionReceipt, TransactionRef};
use async_trait::async_trait;
use ethers_core::types::{Address, Bytes, H256, U256};
use log::{debug, warn};
use std::time::Duration;

/// How long and how deep to wait for a submitted transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Blocks at or above the inclusion block, inclusion block counted. Zero acts as one.
    pub confirmations: u64,
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            confirmations: 1,
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Semantic operations the anchoring engine needs from a ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Address of the signer supplied by the identity provider, if any.
    fn signer_address(&self) -> Option<Address>;

    /// Latest known block number.
    async fn current_height(&self) -> AnchorResult<u64>;

    /// Block by number. `None` when beyond the head, pruned, or not yet available.
    async fn get_block(&self, number: u64, include_transactions: bool) -> AnchorResult<Option<Block>>;

    /// Signs and sends one transaction. Never retried internally.
    async fn submit_transaction(&self, to: Address, data: Bytes, value: U256) -> AnchorResult<TransactionRef>;

    /// Receipt facts for a transaction, `None` while it is still pending.
    async fn transaction_receipt(&self, hash: H256) -> AnchorResult<Option<InclusionReceipt>>;

    /// Read-only contract execution.
    ///
    /// # Errors
    /// `AnchorError::CallReverted` when the remote execution reverts.
    async fn call_read_only(&self, contract: Address, selector: [u8; 4], args: &[u8]) -> AnchorResult<Bytes>;

    /// Polls until `tx` is buried under the requested number of blocks.
    ///
    /// Transient read failures while polling are logged and polling goes on;
    /// only the deadline ends the wait.
    ///
    /// # Errors
    /// - `AnchorError::ConfirmationTimeout` when the deadline passes first
    /// - `AnchorError::SubmissionRejected` when the receipt reports a revert
    async fn wait_for_confirmation(
        &self,
        tx: TransactionRef,
        policy: &ConfirmationPolicy,
    ) -> AnchorResult<TransactionRef> {
        let depth = policy.confirmations.max(1);
        let hash = tx.hash;

        let polling = async {
            loop {
                match confirmation_depth(self, hash).await {
                    Ok(Some((receipt, _))) if !receipt.success => {
                        return Err(AnchorError::SubmissionRejected(format!(
                            "transaction {:#x} reverted in block {}",
                            hash, receipt.block_number
                        )));
                    }
                    Ok(Some((receipt, buried))) if buried >= depth => {
                        return Ok(receipt.block_number);
                    }
                    Ok(Some((_, buried))) => {
                        debug!("transaction {:#x} has {}/{} confirmations", hash, buried, depth);
                    }
                    Ok(None) => debug!("transaction {:#x} still pending", hash),
                    Err(e) => warn!("confirmation poll for {:#x} failed: {}", hash, e),
                }
                tokio::time::sleep(policy.poll_interval).await;
            }
        };

        match tokio::time::timeout(policy.timeout, polling).await {
            Ok(Ok(block_number)) => Ok(tx.included_in(block_number)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(AnchorError::ConfirmationTimeout { hash, confirmations: depth }),
        }
    }
}

/// Receipt of `hash` and how many blocks, its own included, now sit on top of it.
async fn confirmation_depth<C>(client: &C, hash: H256) -> AnchorResult<Option<(InclusionReceipt, u64)>>
where
    C: LedgerClient + ?Sized,
{
    let Some(receipt) = client.transaction_receipt(hash).await? else {
        return Ok(None);
    };
    let head = client.current_height().await?;
    let buried = (head + 1).saturating_sub(receipt.block_number);
    Ok(Some((receipt, buried)))
}
