//! GiveChain - a tamper-evident audit ledger for donation delivery proofs
//!
//! # Architecture
//!
//! ## Core Ledger
//! - [`blockchain`] - Block structure, payload schema and chain verification
//! - [`ledger`] - The engine: genesis, serialized appends, integrity checks
//!
//! ## Consensus
//! - [`miner`] - Bounded proof-of-work nonce search
//!
//! ## State Management
//! - [`persistence`] - Block store trait, SQLite and in-memory backends
//!
//! ## Integration
//! - [`api`] - HTTP endpoints (feature `api`)
//!
//! ## Configuration & Utilities
//! - [`config`] - Configuration management
//! - [`error`] - Error types

#![forbid(unsafe_code)]

// ============================================================================
// Core Ledger
// ============================================================================
pub mod blockchain;
pub mod ledger;

// ============================================================================
// Consensus & Mining
// ============================================================================
pub mod miner;

// ============================================================================
// State Management
// ============================================================================
pub mod persistence;

// ============================================================================
// Integration
// ============================================================================
#[cfg(feature = "api")]
pub mod api;

// ============================================================================
// Configuration & Utilities
// ============================================================================
pub mod config;
pub mod error;
