// src/settings.rs
//! Layered runtime configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. optional `cert-anchor.toml` (or any format `config` recognises) in the working directory
//! 3. `ANCHOR_*` environment variables, e.g. `ANCHOR_RPC_URL`, `ANCHOR_SCAN_WINDOW`
//!
//! `main` loads `.env` with `dotenv` before calling [`Settings::load`], so
//! variables defined there take part as environment variables.

use crate::blockchain::identity::{IdentityProvider, PrivateKeyIdentity};
use crate::blockchain::ledger_client::ConfirmationPolicy;
use crate::error::{AnchorError, AnchorResult};
use crate::services::registrar::{AnchorMode, WaitPolicy};
use crate::services::scanner::ScanOptions;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use ethers_core::types::Address;
use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

const CONFIG_FILE: &str = "cert-anchor";
const ENV_PREFIX: &str = "ANCHOR";

#[derive(Clone, Deserialize)]
pub struct Settings {
    pub rpc_url: String,
    /// Hex private key; absent for verify-only deployments
    #[serde(default)]
    pub private_key: Option<String>,
    /// Record contract address; absent selects raw-payload anchoring
    #[serde(default)]
    pub record_contract: Option<String>,
    pub scan_window: u64,
    pub scan_concurrency: usize,
    pub fetch_retries: u32,
    pub retry_backoff_ms: u64,
    pub scan_deadline_ms: u64,
    pub wait_for_confirmation: bool,
    pub confirmations: u64,
    pub confirmation_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub require_pdf: bool,
    pub dedupe_registrations: bool,
    pub bind_addr: String,
}

impl Settings {
    /// Loads settings from defaults, the optional config file and the environment.
    pub fn load() -> AnchorResult<Self> {
        let config = Self::defaults()
            .and_then(|builder| {
                builder
                    .add_source(File::with_name(CONFIG_FILE).required(false))
                    .add_source(Environment::with_prefix(ENV_PREFIX))
                    .build()
            })
            .map_err(config_error)?;
        Self::from_config(config)
    }

    /// Builder pre-populated with every default.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("rpc_url", "http://127.0.0.1:8545")?
            .set_default("scan_window", 1000_i64)?
            .set_default("scan_concurrency", 8_i64)?
            .set_default("fetch_retries", 2_i64)?
            .set_default("retry_backoff_ms", 250_i64)?
            .set_default("scan_deadline_ms", 30_000_i64)?
            .set_default("wait_for_confirmation", true)?
            .set_default("confirmations", 1_i64)?
            .set_default("confirmation_timeout_ms", 120_000_i64)?
            .set_default("poll_interval_ms", 2_000_i64)?
            .set_default("request_timeout_ms", 15_000_i64)?
            .set_default("require_pdf", false)?
            .set_default("dedupe_registrations", true)?
            .set_default("bind_addr", "127.0.0.1:3000")
    }

    pub fn from_config(config: Config) -> AnchorResult<Self> {
        config.try_deserialize().map_err(config_error)
    }

    /// Record-contract mode when an address is configured, raw-payload mode otherwise.
    pub fn anchor_mode(&self) -> AnchorResult<AnchorMode> {
        match self.record_contract.as_deref().map(str::trim) {
            None | Some("") => Ok(AnchorMode::RawPayload),
            Some(address) => address
                .parse::<Address>()
                .map(AnchorMode::RecordContract)
                .map_err(|e| AnchorError::Input(format!("invalid record_contract {}: {}", address, e))),
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            window: self.scan_window,
            concurrency: self.scan_concurrency,
            fetch_retries: self.fetch_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            deadline: Duration::from_millis(self.scan_deadline_ms),
        }
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        if !self.wait_for_confirmation {
            return WaitPolicy::Submitted;
        }
        WaitPolicy::Confirmed(ConfirmationPolicy {
            confirmations: self.confirmations,
            timeout: Duration::from_millis(self.confirmation_timeout_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Signer built from `private_key`, or `None` for a read-only engine.
    pub fn identity(&self) -> AnchorResult<Option<Arc<dyn IdentityProvider>>> {
        match self.private_key.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(key) => {
                let identity: Arc<dyn IdentityProvider> = Arc::new(PrivateKeyIdentity::from_hex(key)?);
                Ok(Some(identity))
            }
        }
    }

    pub fn bind_addr(&self) -> AnchorResult<SocketAddr> {
        self.bind_addr
            .parse()
            .map_err(|e| AnchorError::Input(format!("invalid bind_addr {}: {}", self.bind_addr, e)))
    }
}

// Hand-written so the private key never reaches a log line.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "<redacted>"))
            .field("record_contract", &self.record_contract)
            .field("scan_window", &self.scan_window)
            .field("scan_concurrency", &self.scan_concurrency)
            .field("fetch_retries", &self.fetch_retries)
            .field("scan_deadline_ms", &self.scan_deadline_ms)
            .field("wait_for_confirmation", &self.wait_for_confirmation)
            .field("confirmations", &self.confirmations)
            .field("require_pdf", &self.require_pdf)
            .field("dedupe_registrations", &self.dedupe_registrations)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

fn config_error(e: ConfigError) -> AnchorError {
    AnchorError::Input(format!("configuration: {}", e))
}
