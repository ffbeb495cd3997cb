//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while operating on a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested key is not present in the index.
    #[error("record does not exist")]
    NotFound,

    /// An I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A record could not be decoded: truncation, an impossible length
    /// field, or other on-disk damage.
    #[error("record corruption: {message}")]
    Corruption {
        /// Description of the damage.
        message: String,
    },

    /// The hash stored alongside a value disagrees with the hash of the
    /// value bytes that were read back.
    #[error("integrity violation: stored hash {stored}, computed {computed}")]
    IntegrityMismatch {
        /// Hash recorded when the value was written.
        stored: String,
        /// Hash recomputed from the bytes read.
        computed: String,
    },

    /// Another process holds the store directory lock.
    #[error("store locked: another process has exclusive access")]
    StoreLocked,

    /// The store has been closed.
    #[error("store is closed")]
    StoreClosed,

    /// Keys must be non-empty.
    #[error("key must not be empty")]
    EmptyKey,
}

impl StoreError {
    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }
}
