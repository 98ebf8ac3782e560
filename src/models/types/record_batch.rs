//! One decoded record batch, before assembly.

use std::sync::Arc;

use crate::models::types::column::ColumnChunk;
use crate::models::types::logical::Schema;

/// Decoded columns of a single record-batch message.
///
/// Columns follow schema order. Dictionary-encoded columns may still be
/// pending if their dictionary batch has not arrived yet.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    pub schema: Arc<Schema>,
    pub n_rows: usize,
    pub columns: Vec<ColumnChunk>,
    /// Zero-based position of this batch in the stream.
    pub batch_index: usize,
}

impl RecordBatch {
    pub fn new(
        schema: Arc<Schema>,
        n_rows: usize,
        columns: Vec<ColumnChunk>,
        batch_index: usize,
    ) -> Self {
        Self {
            schema,
            n_rows,
            columns,
            batch_index,
        }
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// True once no column is waiting on a dictionary.
    pub fn is_resolved(&self) -> bool {
        self.columns.iter().all(|c| c.pending_dictionary().is_none())
    }
}
