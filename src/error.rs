//! Error types for chunkdb
//!
//! Provides a unified error type for all operations. Callers can tell a
//! missing record apart from an I/O failure by matching on the variant.

use thiserror::Error;

/// Result type alias using ChunkDbError
pub type Result<T> = std::result::Result<T, ChunkDbError>;

/// Unified error type for chunkdb operations
#[derive(Debug, Error)]
pub enum ChunkDbError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Lookup / Key Errors
    // -------------------------------------------------------------------------
    #[error("Record not found")]
    NotFound,

    #[error("Primary key conflict: {0}")]
    Conflict(String),

    #[error("Invalid primary key: {0}")]
    InvalidKey(String),

    // -------------------------------------------------------------------------
    // Encoding Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Log corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Schema / Registry Errors
    // -------------------------------------------------------------------------
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Type not registered: {0}")]
    UnregisteredType(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChunkDbError {
    /// True for [`ChunkDbError::NotFound`]
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChunkDbError::NotFound)
    }

    /// True for [`ChunkDbError::Conflict`]
    pub fn is_conflict(&self) -> bool {
        matches!(self, ChunkDbError::Conflict(_))
    }
}

impl From<bincode::Error> for ChunkDbError {
    fn from(err: bincode::Error) -> Self {
        ChunkDbError::Encoding(err.to_string())
    }
}

impl From<serde_json::Error> for ChunkDbError {
    fn from(err: serde_json::Error) -> Self {
        ChunkDbError::Encoding(err.to_string())
    }
}
