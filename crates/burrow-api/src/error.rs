//! Store-level error taxonomy.
//!
//! Engine errors never reach callers directly. [`classify`] turns the
//! engine's "no such key" into [`Error::NotFound`] and wraps everything
//! else with the name of the operation that failed. Callers compare
//! [`Error::kind`] instead of matching engine internals.

use std::sync::Arc;
use thiserror::Error;

/// Custom result type for store operations
pub type Result<T> = std::result::Result<T, Error>;

/// Callback invoked with the operation name and error of every failed
/// store operation, before the error is returned to the caller.
pub type ErrorHandler = Arc<dyn Fn(&str, &Error) + Send + Sync>;

/// Errors returned by [`Store`](crate::Store) operations
#[derive(Debug, Error)]
pub enum Error {
    /// The requested key or group member does not exist
    #[error("key not found")]
    NotFound,

    /// A range or group enumeration was given a non-positive limit
    #[error("invalid range limit {0}: must be positive")]
    InvalidRangeLimit(i64),

    /// A key, group name or member name cannot be encoded
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// A value is larger than the store accepts
    #[error("value of {size} bytes exceeds maximum {max}")]
    ValueTooLarge { size: usize, max: usize },

    /// Any other failure reported by the storage engine
    #[error("{op} failed: {source}")]
    Engine {
        op: &'static str,
        #[source]
        source: burrow_core::Error,
    },

    /// Invalid store or logging configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Stable, engine-independent error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidRangeLimit,
    InvalidKey,
    InvalidValue,
    EngineFailure,
    Config,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound => ErrorKind::NotFound,
            Error::InvalidRangeLimit(_) => ErrorKind::InvalidRangeLimit,
            Error::InvalidKey(_) => ErrorKind::InvalidKey,
            Error::ValueTooLarge { .. } => ErrorKind::InvalidValue,
            Error::Engine { .. } => ErrorKind::EngineFailure,
            Error::Config(_) => ErrorKind::Config,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

/// Maps an engine error raised by `op` onto the store taxonomy.
pub fn classify(op: &'static str, err: burrow_core::Error) -> Error {
    if err.is_key_not_found() {
        Error::NotFound
    } else {
        Error::Engine { op, source: err }
    }
}
