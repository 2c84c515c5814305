// src/models/mod.rs
//! Data structures shared by the ledger, contract and service layers.

pub mod certificate;
pub mod fingerprint;
pub mod ledger;
pub mod outcome;
