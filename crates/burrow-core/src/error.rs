//! Error types for the Burrow engine layers.

use std::io;
use thiserror::Error;

/// Errors raised by the value log and the engine.
///
/// These are engine-specific. The `burrow` facade classifies them into its
/// own stable error kinds, so callers of the facade never match on these
/// variants directly.
#[derive(Debug, Error)]
pub enum Error {
    /// The requested key has no visible value.
    #[error("key not found")]
    KeyNotFound,

    /// A key read by an update transaction was committed by someone else
    /// after the transaction's snapshot was taken.
    #[error("transaction conflict, please retry")]
    Conflict,

    /// The engine has been closed.
    #[error("engine is closed")]
    Closed,

    /// A lock was poisoned (internal error)
    #[error("lock poisoned")]
    LockPoisoned,

    /// Keys must contain at least one byte.
    #[error("key cannot be empty")]
    EmptyKey,

    /// Reclamation discard ratio must lie strictly between 0 and 1.
    #[error("invalid discard ratio {0}, expected a value in (0, 1)")]
    InvalidRatio(f64),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A record would not fit in one value-log frame.
    #[error("record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: usize, max: usize },

    /// Persisted data failed validation.
    #[error("corrupted data: {0}")]
    Corrupted(String),

    /// Invalid operation
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl Error {
    /// Returns `true` for the engine's "no such key" condition.
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Error::KeyNotFound)
    }
}

/// A specialized `Result` type for Burrow engine operations.
pub type Result<T> = std::result::Result<T, Error>;
