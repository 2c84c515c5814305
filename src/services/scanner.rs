// src/services/scanner.rs
//! Verification by scanning recent ledger history.
//!
//! Used when a fingerprint was anchored as raw transaction payload, or when
//! no structured record exists. Walks the newest `window` blocks from the
//! head downwards and reports the most recent transaction whose payload
//! carries the fingerprint.
//!
//! # Fetch pipeline
//! Up to `concurrency` blocks are outstanding at once (in flight, or fetched
//! but not yet checked). Results are checked strictly in descending height
//! order, so a hit in a lower block that arrives early never beats a higher
//! block that is still loading. After a hit every outstanding fetch is
//! dropped, which bounds the fetches past the hit to `concurrency - 1`.
//!
//! # Failures
//! - block absent (pruned, not yet propagated): recorded as a gap, scan goes on
//! - `LedgerUnavailable` on a block: retried `fetch_retries` times, then aborts the scan
//! - deadline: `ScanIncomplete`, never a definitive `false`

use crate::blockchain::ledger_client::LedgerClient;
use crate::error::{AnchorError, AnchorResult};
use crate::models::fingerprint::Fingerprint;
use crate::models::outcome::ScanMatch;
use ethers_core::types::H256;
use futures::stream::{FuturesUnordered, StreamExt};
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};

/// Tunables for the completeness/cost trade-off of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanOptions {
    /// Blocks to inspect below and including the head
    pub window: u64,
    /// Maximum blocks outstanding at once
    pub concurrency: usize,
    /// Extra attempts for a block read that failed with `LedgerUnavailable`
    pub fetch_retries: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff: Duration,
    /// Time budget of one scan
    pub deadline: Duration,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            window: 1000,
            concurrency: 8,
            fetch_retries: 2,
            retry_backoff: Duration::from_millis(250),
            deadline: Duration::from_secs(30),
        }
    }
}

/// What a completed scan saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Chain head the window was anchored to
    pub head: u64,
    /// Blocks checked in order, gaps included
    pub blocks_scanned: u64,
    /// Heights skipped because the ledger could not serve them
    pub gaps: Vec<u64>,
    /// Most recent transaction carrying the fingerprint
    pub matched: Option<ScanMatch>,
}

impl ScanReport {
    pub fn found(&self) -> bool {
        self.matched.is_some()
    }
}

enum BlockScan {
    Gap,
    Miss,
    Hit(H256),
}

/// Fallback verifier searching transaction payloads.
#[derive(Clone)]
pub struct ScanVerifier {
    client: Arc<dyn LedgerClient>,
    options: ScanOptions,
}

impl ScanVerifier {
    pub fn new(client: Arc<dyn LedgerClient>, options: ScanOptions) -> Self {
        Self { client, options }
    }

    pub fn options(&self) -> &ScanOptions {
        &self.options
    }

    /// Whether `fingerprint` appears in the newest `window` blocks.
    ///
    /// A `false` covers the window only: anchors older than the window are
    /// unverifiable here, not invalid.
    pub async fn scan_for_fingerprint(&self, fingerprint: &Fingerprint, window: u64) -> AnchorResult<bool> {
        Ok(self.scan(fingerprint, window).await?.found())
    }

    /// Scans with the configured deadline.
    pub async fn scan(&self, fingerprint: &Fingerprint, window: u64) -> AnchorResult<ScanReport> {
        self.scan_until(fingerprint, window, Instant::now() + self.options.deadline)
            .await
    }

    /// Scans the newest `window` blocks, giving up at `deadline`.
    ///
    /// # Errors
    /// - `AnchorError::LedgerUnavailable` when the head or a block cannot be read after retries
    /// - `AnchorError::ScanIncomplete` when the deadline passes first
    pub async fn scan_until(
        &self,
        fingerprint: &Fingerprint,
        window: u64,
        deadline: Instant,
    ) -> AnchorResult<ScanReport> {
        if window == 0 {
            return Ok(ScanReport::default());
        }

        let head = match timeout_at(deadline, self.client.current_height()).await {
            Ok(head) => head?,
            Err(_) => {
                return Err(AnchorError::ScanIncomplete { scanned: 0, window, partial_match: false });
            }
        };
        // Genesis carries no user transactions.
        let span = window.min(head);
        let mut report = ScanReport { head, ..ScanReport::default() };
        if span == 0 {
            return Ok(report);
        }

        let lookahead = self.options.concurrency.max(1) as u64;
        let mut in_flight = FuturesUnordered::new();
        let mut fetched: BTreeMap<u64, BlockScan> = BTreeMap::new();
        let mut issued = 0u64;

        loop {
            while let Some(scan) = fetched.remove(&(head - report.blocks_scanned)) {
                let height = head - report.blocks_scanned;
                report.blocks_scanned += 1;
                match scan {
                    BlockScan::Gap => report.gaps.push(height),
                    BlockScan::Miss => {}
                    BlockScan::Hit(tx_hash) => {
                        info!(
                            "fingerprint {} found in block {} (tx {:#x}) after {} blocks",
                            fingerprint, height, tx_hash, report.blocks_scanned
                        );
                        report.matched = Some(ScanMatch { block_number: height, tx_hash });
                        return Ok(report);
                    }
                }
            }

            if report.blocks_scanned == span {
                if !report.gaps.is_empty() {
                    warn!(
                        "scan for {} skipped {} unavailable blocks: {:?}",
                        fingerprint,
                        report.gaps.len(),
                        report.gaps
                    );
                }
                debug!("fingerprint {} absent from blocks {}..={}", fingerprint, head + 1 - span, head);
                return Ok(report);
            }

            // Refill after draining: the next height to check is now always in flight.
            while issued < span && issued - report.blocks_scanned < lookahead {
                in_flight.push(self.fetch(head - issued, fingerprint));
                issued += 1;
            }

            match timeout_at(deadline, in_flight.next()).await {
                Ok(Some((height, scan))) => {
                    fetched.insert(height, scan?);
                }
                Ok(None) => unreachable!(
                    "block {} is neither fetched nor in flight",
                    head - report.blocks_scanned
                ),
                Err(_) => {
                    let partial_match = fetched.values().any(|scan| matches!(scan, BlockScan::Hit(_)));
                    warn!(
                        "scan for {} stopped at deadline after {} of {} blocks",
                        fingerprint, report.blocks_scanned, span
                    );
                    return Err(AnchorError::ScanIncomplete {
                        scanned: report.blocks_scanned,
                        window: span,
                        partial_match,
                    });
                }
            }
        }
    }

    /// Fetches one block and tests its payloads, retrying transient read failures.
    async fn fetch(&self, height: u64, fingerprint: &Fingerprint) -> (u64, AnchorResult<BlockScan>) {
        let mut attempt = 0u32;
        loop {
            match self.client.get_block(height, true).await {
                Ok(None) => return (height, Ok(BlockScan::Gap)),
                Ok(Some(block)) => {
                    let hit = block
                        .transactions
                        .iter()
                        .find(|tx| fingerprint.appears_in(&tx.payload))
                        .map(|tx| tx.hash);
                    return (height, Ok(hit.map_or(BlockScan::Miss, BlockScan::Hit)));
                }
                Err(e) if e.is_retryable() && attempt < self.options.fetch_retries => {
                    attempt += 1;
                    debug!("block {} fetch attempt {} failed: {}", height, attempt, e);
                    tokio::time::sleep(self.options.retry_backoff * attempt).await;
                }
                Err(e) => return (height, Err(e)),
            }
        }
    }
}
