//! Error types for filedict
//!
//! Every operation returns a `Result`; nothing is recorded on the handle, so a
//! failed call never poisons the calls that follow it.

use thiserror::Error;

/// Result type alias using FileDictError
pub type Result<T> = std::result::Result<T, FileDictError>;

/// Unified error type for filedict operations
#[derive(Debug, Error)]
pub enum FileDictError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Capacity Errors
    // -------------------------------------------------------------------------
    #[error("Value too big: {len} bytes, at most {max} fit in a slot")]
    ValueTooBig { len: usize, max: usize },

    #[error("Key too long: {len} bytes, at most {max} fit in a slot")]
    KeyTooLong { len: usize, max: usize },

    // -------------------------------------------------------------------------
    // Input Errors
    // -------------------------------------------------------------------------
    #[error("Key must not be empty")]
    EmptyKey,

    #[error("Value must not be empty")]
    EmptyValue,

    #[error("{field} contains a NUL byte")]
    InteriorNul { field: &'static str },

    // -------------------------------------------------------------------------
    // Handle Errors
    // -------------------------------------------------------------------------
    #[error("Store was opened read-only")]
    ReadOnly,

    #[error("Store handle is closed")]
    Closed,

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt store: {0}")]
    Corrupt(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}
