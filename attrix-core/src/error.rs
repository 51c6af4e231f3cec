//! Error types for ATTRIX operations

use crate::schema::TablePart;
use crate::value::TypeTag;
use thiserror::Error;

/// Table and column configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid column selector '{column}' for the {part} table")]
    InvalidColumn { part: TablePart, column: String },
}

/// Failures while decoding stored attribute rows.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unknown type tag '{tag}'")]
    UnknownTag { tag: String },

    #[error("Cannot decode {raw:?} as {tag}")]
    InvalidValue { tag: TypeTag, raw: String },

    #[error("Malformed attribute projection: {reason}")]
    MalformedProjection { reason: String },
}

/// Storage layer errors. Backend failures are carried through unchanged in
/// `reason`; this layer performs no retries and no translation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Backend error: {reason}")]
    Backend { reason: String },

    #[error("Insert failed for attribute '{name}': {reason}")]
    InsertFailed { name: String, reason: String },

    #[error("Update failed for attribute {id}: {reason}")]
    UpdateFailed { id: i64, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Connection pool error: {reason}")]
    Pool { reason: String },
}

/// Master error type for all ATTRIX errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttrixError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type alias for ATTRIX operations.
pub type AttrixResult<T> = Result<T, AttrixError>;

// =============================================================================
// TESTS
// =============================================================================
