//! # Ingestion Errors
//!
//! Unified error type for every stage of Arrow IPC ingestion.
//!
//! Covers outer framing faults, message-order violations, unsupported wire types,
//! buffer and row-count inconsistencies, numeric overflow during value conversion,
//! schema drift across batches, and unresolved dictionaries. All of them are fatal
//! to the decode call that raised them: a failed decode never yields a partial table.

use std::str::Utf8Error;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Unified error type for all ingestion operations.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Malformed or truncated outer message/body framing.
    #[error("Framing error at byte {offset}: {message}")]
    Framing { offset: usize, message: String },

    /// Messages out of expected order, or metadata that contradicts itself.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Wire type tag or parameter combination the type mapper does not cover.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),

    /// A declared buffer region runs past the message body, or is too small for its rows.
    #[error(
        "Buffer out of bounds for field `{field}` in batch {batch}: offset {offset} + length {length} exceeds {available} bytes"
    )]
    BufferBounds {
        field: String,
        batch: usize,
        offset: usize,
        length: usize,
        available: usize,
    },

    /// Declared row count disagrees with the count implied by the buffers.
    #[error(
        "Row count mismatch for field `{field}` in batch {batch}: declared {declared}, buffers imply {implied}"
    )]
    RowCountMismatch {
        field: String,
        batch: usize,
        declared: usize,
        implied: usize,
    },

    /// Numeric conversion exceeded the range of the stored representation.
    #[error("Overflow decoding field `{field}` in batch {batch}, row {row}: {detail}")]
    DecodeOverflow {
        field: String,
        batch: usize,
        row: usize,
        detail: String,
    },

    /// A later batch's structure disagrees with the established schema.
    #[error("Schema mismatch in batch {batch}: {detail}")]
    SchemaMismatch { batch: usize, detail: String },

    /// Dictionary-encoded column whose dictionary values never arrived.
    #[error("Unresolved dictionary {dict_id} for field `{field}`")]
    UnresolvedDictionary { field: String, dict_id: i64 },

    /// String bytes in a valid row are not UTF-8.
    #[error("Invalid UTF-8 in field `{field}`, batch {batch}, row {row}: {source}")]
    Utf8 {
        field: String,
        batch: usize,
        row: usize,
        #[source]
        source: Utf8Error,
    },
}

impl IngestError {
    /// Shorthand for a framing error at `offset`.
    pub(crate) fn framing(offset: usize, message: impl Into<String>) -> Self {
        IngestError::Framing {
            offset,
            message: message.into(),
        }
    }
}
