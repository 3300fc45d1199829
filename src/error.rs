//! Error types for the pilum library.
//!
//! All failures are represented by the [`PilumError`] enum, which keeps
//! one variant per failure area and provides convenient constructors.

use std::io;

use thiserror::Error;

/// The main error type for pilum operations.
#[derive(Error, Debug)]
pub enum PilumError {
    /// I/O errors (file operations, seeks, reads, writes).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Corpus archive errors (open failure, bad gzip, truncated entry).
    #[error("Archive error: {0}")]
    Archive(String),

    /// Index construction errors (corrupt runs, merge failures).
    #[error("Index error: {0}")]
    Index(String),

    /// On-disk format violations (bad varbyte, cardinality mismatch,
    /// offsets outside the index).
    #[error("Format error: {0}")]
    Format(String),

    /// Query evaluation errors.
    #[error("Query error: {0}")]
    Query(String),

    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic anyhow error.
    #[error("Error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Result type alias for operations that may fail with [`PilumError`].
pub type Result<T> = std::result::Result<T, PilumError>;

impl PilumError {
    /// Create a new archive error.
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        PilumError::Archive(msg.into())
    }

    /// Create a new index error.
    pub fn index<S: Into<String>>(msg: S) -> Self {
        PilumError::Index(msg.into())
    }

    /// Create a new format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        PilumError::Format(msg.into())
    }

    /// Create a new query error.
    pub fn query<S: Into<String>>(msg: S) -> Self {
        PilumError::Query(msg.into())
    }
}
