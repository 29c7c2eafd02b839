//! Error types for GiveChain

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    /// Payload rejected before any mining or storage work happened.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A block already exists at `index` in the backing store.
    #[error("Store conflict: block {index} already exists")]
    StoreConflict { index: u64 },

    #[error("Mining timed out after {attempts} attempts ({elapsed_ms} ms)")]
    MiningTimeout { attempts: u64, elapsed_ms: u128 },

    #[error("Ledger is not initialized (no genesis block)")]
    NotInitialized,

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ChainError {
    /// Whether the caller may simply try the same operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChainError::StoreConflict { .. } | ChainError::MiningTimeout { .. }
        )
    }
}

impl From<std::io::Error> for ChainError {
    fn from(err: std::io::Error) -> Self {
        ChainError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(err: serde_json::Error) -> Self {
        ChainError::Serialization(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ChainError>;
