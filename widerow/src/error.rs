//! Error types for the widerow storage emulation.
use std::fmt::Debug;

use thiserror::Error;

/// The primary error type for operations within this library.
#[derive(Error, Debug)]
pub enum WideRowError {
    /// A value was used as (part of) a key but its type has no comparable encoding.
    #[error("Value of type {0} cannot be used as a key")]
    UnsupportedType(&'static str),

    /// A relation has a shape that is illegal for the key column it targets
    /// (ordering comparison on a partition key, IN on a non-trailing column, a gap
    /// before a constrained clustering column, ...).
    #[error("Invalid use of key column '{column}': {reason}")]
    InvalidKeyUsage { column: String, reason: String },

    /// A mandatory key column was not bound by any relation or row value.
    #[error("Missing key part '{0}'")]
    MissingKeyPart(String),

    /// A recipe was handed an index map that does not cover every index field.
    #[error("Incomplete index: missing field(s) {}", .0.join(", "))]
    IncompleteIndex(Vec<String>),

    /// A time-ordered identifier could not be decoded.
    #[error("Invalid identifier '{0}'")]
    InvalidIdentifier(String),

    /// A single-row read matched nothing. This is an expected outcome, see
    /// [`WideRowError::is_not_found`].
    #[error("Row not found in table '{table}' for relations [{relations}]")]
    RowNotFound { table: String, relations: String },

    /// The table definition is inconsistent (overlapping or duplicate key columns,
    /// or a conflicting redefinition of an existing table).
    #[error("Invalid schema for table '{table}': {reason}")]
    InvalidSchema { table: String, reason: String },

    /// A bucketer failed to advance while enumerating buckets.
    #[error("Bucket scheme did not advance past bucket {0}")]
    InvalidBucketScheme(i64),

    /// A collection or counter modifier does not fit the stored column value.
    #[error("Cannot apply {modifier} to column '{column}': {reason}")]
    InvalidModifier {
        column: String,
        modifier: &'static str,
        reason: String,
    },

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Unable to convert {src} to {dst}")]
    Conversion { src: String, dst: String },

    #[error("Invalid configuration: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WideRowError {
    pub(crate) fn conversion<Src: Debug, Dst: Into<String>>(src: Src, dst: Dst) -> Self {
        WideRowError::Conversion {
            src: format!("{src:?}"),
            dst: dst.into(),
        }
    }

    pub(crate) fn invalid_key_usage<C: Into<String>, R: Into<String>>(column: C, reason: R) -> Self {
        WideRowError::InvalidKeyUsage {
            column: column.into(),
            reason: reason.into(),
        }
    }

    /// True for outcomes callers are expected to branch on (an empty single-row
    /// read), false for errors that indicate a schema or usage mistake.
    pub fn is_not_found(&self) -> bool {
        matches!(self, WideRowError::RowNotFound { .. })
    }
}

/// A convenience type alias for `Result<T, WideRowError>`.
pub type Result<T, E = WideRowError> = std::result::Result<T, E>;
