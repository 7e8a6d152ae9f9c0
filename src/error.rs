//! Error types for tuplekv
//!
//! Provides a unified error type for all operations. Absent keys and failed
//! transaction checks are NOT errors: they are reported through
//! [`Lookup::Miss`](crate::Lookup::Miss) and
//! [`Commit::Conflict`](crate::Commit::Conflict).

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for tuplekv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Key Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key part: {0}")]
    InvalidKeyPart(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key decode error: {0}")]
    Decode(String),

    #[error("Key too large: {size} bytes (max {max})")]
    KeyTooLarge { size: usize, max: usize },

    // -------------------------------------------------------------------------
    // Value Errors
    // -------------------------------------------------------------------------
    #[error("Value too large: {size} bytes (max {max})")]
    ValueTooLarge { size: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Scan Errors
    // -------------------------------------------------------------------------
    #[error("Invalid cursor: {0}")]
    InvalidCursor(String),

    // -------------------------------------------------------------------------
    // Atomic Operation Errors
    // -------------------------------------------------------------------------
    #[error("Too many checks in atomic operation: {count} (max {max})")]
    TooManyChecks { count: usize, max: usize },

    #[error("Too many mutations in atomic operation: {count} (max {max})")]
    TooManyMutations { count: usize, max: usize },

    // -------------------------------------------------------------------------
    // Store Errors
    // -------------------------------------------------------------------------
    #[error("Store error: {0}")]
    Store(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Wrap any displayable engine failure as a store error.
    pub fn store(e: impl std::fmt::Display) -> Self {
        KvError::Store(e.to_string())
    }
}

impl From<bincode::Error> for KvError {
    fn from(e: bincode::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for KvError {
    fn from(e: serde_json::Error) -> Self {
        KvError::Serialization(e.to_string())
    }
}
