// src/blockchain/eth_client.rs
//! JSON-RPC ledger client for Ethereum-compatible chains.
//!
//! Implements `LedgerClient` on top of an `ethers` HTTP provider:
//! - `eth_blockNumber` / `eth_getBlockByNumber` for scanning
//! - nonce and gas filling, local signing and `eth_sendRawTransaction` for writes
//! - `eth_getTransactionReceipt` for confirmation tracking
//! - `eth_call` for record lookups
//!
//! Node faults are classified into the engine's error taxonomy here, so no
//! other module needs to know about JSON-RPC error shapes.

use crate::blockchain::identity::IdentityProvider;
use crate::blockchain::ledger_client::LedgerClient;
use crate::error::{AnchorError, AnchorResult};
use crate::models::ledger::{Block, InclusionReceipt, TransactionRef};
use async_trait::async_trait;
use ethers::providers::{Http, JsonRpcError, Middleware, Provider, ProviderError, RpcError};
use ethers::signers::Signer;
use ethers_core::types::{
    transaction::eip2718::TypedTransaction, Address, BlockId, BlockNumber, Bytes, TransactionRequest, H256,
    U256, U64,
};
use log::{debug, info};
use std::sync::Arc;
use std::time::Duration;

/// Ledger client speaking Ethereum JSON-RPC over HTTP.
///
/// Holds no state besides the connection and the identity it was given.
/// Without an identity the client is read-only and submissions fail with
/// `AnchorError::Input`.
#[derive(Clone)]
pub struct EthLedgerClient {
    /// JSON-RPC provider
    provider: Arc<Provider<Http>>,
    /// Signer capability, absent for verify-only deployments
    identity: Option<Arc<dyn IdentityProvider>>,
    /// Chain id reported by the node at connect time
    chain_id: u64,
}

impl EthLedgerClient {
    /// Connects to a JSON-RPC endpoint.
    ///
    /// # Arguments
    /// * `rpc_url` - HTTP(S) endpoint of the node
    /// * `identity` - Signer capability, or `None` for read-only use
    /// * `request_timeout` - Upper bound for every single RPC request
    ///
    /// # Errors
    /// - `AnchorError::Input` if the URL is malformed
    /// - `AnchorError::LedgerUnavailable` if the chain id cannot be read
    pub async fn connect(
        rpc_url: &str,
        identity: Option<Arc<dyn IdentityProvider>>,
        request_timeout: Duration,
    ) -> AnchorResult<Self> {
        let url = reqwest::Url::parse(rpc_url)
            .map_err(|e| AnchorError::Input(format!("invalid RPC url {}: {}", rpc_url, e)))?;
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AnchorError::Input(format!("cannot build HTTP client: {}", e)))?;
        let provider = Arc::new(Provider::new(Http::new_with_client(url, http_client)));

        let chain_id = provider.get_chainid().await.map_err(unavailable)?.as_u64();
        info!(
            "connected to chain {} at {} ({})",
            chain_id,
            rpc_url,
            identity
                .as_ref()
                .map(|id| format!("signer {:#x}", id.address()))
                .unwrap_or_else(|| "read-only".to_string())
        );

        Ok(Self { provider, identity, chain_id })
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn block_id(number: u64) -> BlockId {
        BlockId::Number(BlockNumber::Number(U64::from(number)))
    }
}

#[async_trait]
impl LedgerClient for EthLedgerClient {
    fn signer_address(&self) -> Option<Address> {
        self.identity.as_ref().map(|identity| identity.address())
    }

    async fn current_height(&self) -> AnchorResult<u64> {
        let height = self.provider.get_block_number().await.map_err(unavailable)?;
        Ok(height.as_u64())
    }

    async fn get_block(&self, number: u64, include_transactions: bool) -> AnchorResult<Option<Block>> {
        let id = Self::block_id(number);

        if !include_transactions {
            return match self.provider.get_block(id).await {
                Ok(block) => Ok(block.map(|b| Block {
                    number,
                    timestamp: b.timestamp.low_u64(),
                    transactions: Vec::new(),
                })),
                Err(e) => absent_on_node_error(number, e),
            };
        }

        match self.provider.get_block_with_txs(id).await {
            Ok(Some(block)) => Ok(Some(Block {
                number,
                timestamp: block.timestamp.low_u64(),
                transactions: block
                    .transactions
                    .into_iter()
                    .map(|tx| TransactionRef {
                        hash: tx.hash,
                        block_number: Some(tx.block_number.map(|n| n.as_u64()).unwrap_or(number)),
                        payload: tx.input,
                    })
                    .collect(),
            })),
            Ok(None) => Ok(None),
            Err(e) => absent_on_node_error(number, e),
        }
    }

    async fn submit_transaction(&self, to: Address, data: Bytes, value: U256) -> AnchorResult<TransactionRef> {
        let identity = self
            .identity
            .as_ref()
            .ok_or_else(|| AnchorError::Input("no signer configured; client is read-only".into()))?;
        let from = identity.address();
        let wallet = identity.signer(self.chain_id);

        let nonce = self
            .provider
            .get_transaction_count(from, Some(BlockNumber::Pending.into()))
            .await
            .map_err(unavailable)?;

        let mut tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .data(data.clone())
            .nonce(nonce)
            .chain_id(self.chain_id)
            .into();
        // Gas estimation executes the call, so a doomed write is refused here.
        self.provider.fill_transaction(&mut tx, None).await.map_err(rejected_or_unavailable)?;

        let signature = wallet
            .sign_transaction(&tx)
            .await
            .map_err(|e| AnchorError::SubmissionRejected(format!("signing failed: {}", e)))?;
        let pending = self
            .provider
            .send_raw_transaction(tx.rlp_signed(&signature))
            .await
            .map_err(rejected_or_unavailable)?;

        let hash = pending.tx_hash();
        info!("submitted transaction {:#x} from {:#x} to {:#x}", hash, from, to);
        Ok(TransactionRef::pending(hash, data))
    }

    async fn transaction_receipt(&self, hash: H256) -> AnchorResult<Option<InclusionReceipt>> {
        let receipt = self.provider.get_transaction_receipt(hash).await.map_err(unavailable)?;
        Ok(receipt.and_then(|r| {
            r.block_number.map(|n| InclusionReceipt {
                block_number: n.as_u64(),
                // Pre-Byzantium receipts carry no status; treat them as success.
                success: r.status.map(|s| s.as_u64() == 1).unwrap_or(true),
            })
        }))
    }

    async fn call_read_only(&self, contract: Address, selector: [u8; 4], args: &[u8]) -> AnchorResult<Bytes> {
        let mut calldata = selector.to_vec();
        calldata.extend_from_slice(args);
        let tx: TypedTransaction = TransactionRequest::new().to(contract).data(calldata).into();

        match self.provider.call(&tx, None).await {
            Ok(output) => Ok(output),
            Err(e) => match e.as_error_response() {
                Some(response) if is_revert(response) => Err(AnchorError::CallReverted(response.message.clone())),
                Some(response) => Err(AnchorError::LedgerUnavailable(format!(
                    "eth_call failed ({}): {}",
                    response.code, response.message
                ))),
                None => Err(unavailable(e)),
            },
        }
    }
}

/// Execution reverted: code 3 per EIP-1474 practice, or a node that only says so in text.
fn is_revert(response: &JsonRpcError) -> bool {
    response.code == 3 || response.message.to_ascii_lowercase().contains("revert")
}

fn unavailable(e: ProviderError) -> AnchorError {
    AnchorError::LedgerUnavailable(e.to_string())
}

/// The node answered and refused: a verdict. No answer at all: infrastructure.
fn rejected_or_unavailable(e: ProviderError) -> AnchorError {
    match e.as_error_response() {
        Some(response) => AnchorError::SubmissionRejected(format!("{} (code {})", response.message, response.code)),
        None => unavailable(e),
    }
}

/// Node answers meaning "this block does not exist here": pruned history,
/// a height past the head, or a block not yet propagated.
fn is_missing_block(response: &JsonRpcError) -> bool {
    let message = response.message.to_ascii_lowercase();
    ["header not found", "unknown block", "block not found", "pruned", "missing block"]
        .iter()
        .any(|marker| message.contains(marker))
}

/// A missing block is a gap. Any other error answer (rate limits, internal
/// faults) says nothing about the block and is `LedgerUnavailable`.
fn absent_on_node_error(number: u64, e: ProviderError) -> AnchorResult<Option<Block>> {
    match e.as_error_response() {
        Some(response) if is_missing_block(response) => {
            debug!("block {} unavailable: {}", number, response.message);
            Ok(None)
        }
        Some(response) => Err(AnchorError::LedgerUnavailable(format!(
            "eth_getBlockByNumber({}) failed ({}): {}",
            number, response.code, response.message
        ))),
        None => Err(unavailable(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fingerprint::Fingerprint;
    use crate::services::scanner::{ScanOptions, ScanVerifier};
    use mockito::{mock, Matcher};

    fn rpc_mock(method: &str, body: &str) -> mockito::Mock {
        mock("POST", "/")
            .match_body(Matcher::PartialJsonString(format!(r#"{{"method":"{}"}}"#, method)))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create()
    }

    fn block_mock(height: &str, body: &str) -> mockito::Mock {
        mock("POST", "/")
            .match_body(Matcher::PartialJsonString(format!(
                r#"{{"method":"eth_getBlockByNumber","params":["{}"]}}"#,
                height
            )))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create()
    }

    // A single test drives the shared mock server so mocks never overlap.
    #[tokio::test]
    async fn classifies_json_rpc_responses() {
        let _chain = rpc_mock("eth_chainId", r#"{"jsonrpc":"2.0","id":1,"result":"0xaa36a7"}"#);
        let _height = rpc_mock("eth_blockNumber", r#"{"jsonrpc":"2.0","id":1,"result":"0x2a"}"#);
        let _throttled = block_mock(
            "0x2a",
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32005,"message":"daily request limit exceeded"}}"#,
        );
        let _beyond_head = block_mock("0x2b", r#"{"jsonrpc":"2.0","id":1,"result":null}"#);
        let _pruned = block_mock(
            "0x29",
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32000,"message":"header not found"}}"#,
        );
        let _call = rpc_mock(
            "eth_call",
            r#"{"jsonrpc":"2.0","id":1,"error":{"code":3,"message":"execution reverted: no certificate"}}"#,
        );

        let client = EthLedgerClient::connect(&mockito::server_url(), None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(client.chain_id(), 11_155_111);
        assert!(client.signer_address().is_none());

        assert_eq!(client.current_height().await.unwrap(), 42);
        assert_eq!(client.get_block(43, true).await.unwrap(), None);
        assert_eq!(client.get_block(41, true).await.unwrap(), None);

        let err = client.get_block(42, true).await.unwrap_err();
        assert!(matches!(err, AnchorError::LedgerUnavailable(ref m) if m.contains("limit exceeded")));

        // A throttled node fails the scan instead of reading as "not anchored".
        let options = ScanOptions {
            window: 10,
            concurrency: 2,
            fetch_retries: 1,
            retry_backoff: Duration::from_millis(1),
            deadline: Duration::from_secs(5),
        };
        let scanner = ScanVerifier::new(Arc::new(client.clone()), options);
        let fp = Fingerprint::parse(&"ab".repeat(32)).unwrap();
        assert!(matches!(scanner.scan(&fp, 1).await, Err(AnchorError::LedgerUnavailable(_))));

        let err = client.call_read_only(Address::zero(), [0, 0, 0, 0], &[]).await.unwrap_err();
        assert!(matches!(err, AnchorError::CallReverted(ref m) if m.contains("no certificate")));

        let err = client
            .submit_transaction(Address::zero(), Bytes::from(vec![1u8]), U256::zero())
            .await
            .unwrap_err();
        assert!(matches!(err, AnchorError::Input(_)));
    }

    #[tokio::test]
    async fn unreachable_node_is_unavailable() {
        // Port 9 (discard) is closed on test hosts; the connection is refused.
        let result = EthLedgerClient::connect("http://127.0.0.1:9", None, Duration::from_millis(500)).await;
        assert!(matches!(result, Err(AnchorError::LedgerUnavailable(_))));
    }

    #[tokio::test]
    async fn malformed_url_is_input_error() {
        let result = EthLedgerClient::connect("not a url", None, Duration::from_secs(1)).await;
        assert!(matches!(result, Err(AnchorError::Input(_))));
    }

    #[test]
    fn revert_detection_accepts_code_or_message() {
        let by_code = JsonRpcError { code: 3, message: "execution error".into(), data: None };
        let by_text = JsonRpcError { code: -32000, message: "VM Exception: revert".into(), data: None };
        let other = JsonRpcError { code: -32000, message: "header not found".into(), data: None };
        assert!(is_revert(&by_code));
        assert!(is_revert(&by_text));
        assert!(!is_revert(&other));
    }

    #[test]
    fn only_absence_messages_are_missing_blocks() {
        let pruned = JsonRpcError { code: -32000, message: "header not found".into(), data: None };
        let unknown = JsonRpcError { code: -32000, message: "Unknown block".into(), data: None };
        let throttled = JsonRpcError { code: -32005, message: "daily request limit exceeded".into(), data: None };
        let internal = JsonRpcError { code: -32603, message: "internal error".into(), data: None };
        let busy = JsonRpcError { code: 429, message: "Too Many Requests".into(), data: None };
        assert!(is_missing_block(&pruned));
        assert!(is_missing_block(&unknown));
        assert!(!is_missing_block(&throttled));
        assert!(!is_missing_block(&internal));
        assert!(!is_missing_block(&busy));
    }
}
