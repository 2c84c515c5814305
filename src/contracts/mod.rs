// src/contracts/mod.rs
//! Smart contract interfaces.

pub mod certificate_registry;
