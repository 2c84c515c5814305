// src/blockchain/mod.rs
//! Ledger access: the `LedgerClient` boundary and its implementations.

pub mod eth_client;
pub mod identity;
pub mod ledger_client;
pub mod memory;
