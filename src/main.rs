// src/main.rs

//! # Certificate Anchor - Main Entry Point
//!
//! Loads configuration, connects to the ledger and serves the HTTP API.
//!
//! ## Configuration
//! Read from `.env`, an optional `cert-anchor.toml` and `ANCHOR_*` variables:
//! - `ANCHOR_RPC_URL`: JSON-RPC endpoint (default: http://127.0.0.1:8545)
//! - `ANCHOR_PRIVATE_KEY`: (Optional) signer key; without it the service is verify-only
//! - `ANCHOR_RECORD_CONTRACT`: (Optional) record contract; without it fingerprints are anchored as raw payloads
//! - `ANCHOR_BIND_ADDR`: listen address (default: 127.0.0.1:3000)

use anyhow::Context;
use cert_anchor::blockchain::eth_client::EthLedgerClient;
use cert_anchor::services::api_server::ApiServer;
use cert_anchor::{CertificateService, Settings};
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

/// # Initialization Sequence
/// 1. Load environment and configuration
/// 2. Connect to the ledger
/// 3. Wire the certificate service
/// 4. Start the API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load configuration")?;
    let identity = settings.identity().context("failed to load signer key")?;
    if identity.is_none() {
        warn!("no private key configured; registration is disabled");
    }

    let client = EthLedgerClient::connect(&settings.rpc_url, identity, settings.request_timeout())
        .await
        .with_context(|| format!("failed to connect to {}", settings.rpc_url))?;

    let certificates = CertificateService::from_settings(Arc::new(client), &settings)
        .context("invalid anchoring configuration")?;
    info!("anchoring mode: {:?}", settings.anchor_mode()?);

    let addr = settings.bind_addr()?;
    ApiServer::new(certificates).run(addr).await.context("API server failed")?;
    Ok(())
}
