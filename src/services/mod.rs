// src/services/mod.rs
//! Registration, lookup, scanning and verification, plus the HTTP surface.

pub mod api_server;
pub mod certificates;
pub mod lookup;
pub mod registrar;
pub mod scanner;
pub mod verifier;
