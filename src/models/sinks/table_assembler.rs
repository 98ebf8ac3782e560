//! # Table Assembler
//!
//! Folds record batches into one [`Table`], in arrival order.
//!
//! The first batch fixes the schema unless one was supplied up front. Every
//! later batch must match it field for field. Resolved batches are appended
//! straight into the column builders; once a batch arrives with a pending
//! dictionary column, it and every batch after it are queued until
//! [`TableAssembler::finish`] so row order is never disturbed.

use std::cell::OnceCell;
use std::sync::Arc;

use tracing::debug;

use crate::constants::{DEFAULT_TABLE_NAME, LOG_TARGET};
use crate::error::{IngestError, Result};
use crate::models::decoders::ipc::dictionary::DictionaryResolver;
use crate::models::types::column::ColumnBuilder;
use crate::models::types::logical::Schema;
use crate::models::types::record_batch::RecordBatch;
use crate::models::types::table::Table;

/// Accumulates batches into a single table.
#[derive(Debug)]
pub struct TableAssembler {
    name: String,
    schema: OnceCell<Arc<Schema>>,
    builders: Vec<ColumnBuilder>,
    queued: Vec<(usize, RecordBatch)>,
    row_count: usize,
    n_batches: usize,
}

impl Default for TableAssembler {
    fn default() -> Self {
        Self::new(DEFAULT_TABLE_NAME)
    }
}

impl TableAssembler {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schema: OnceCell::new(),
            builders: Vec::new(),
            queued: Vec::new(),
            row_count: 0,
            n_batches: 0,
        }
    }

    /// Starts with a known schema, so that zero batches still yield a typed table.
    pub fn with_schema(name: impl Into<String>, schema: Arc<Schema>) -> Self {
        let mut assembler = Self::new(name);
        assembler.builders = Self::builders_for(&schema);
        let _ = assembler.schema.set(schema);
        assembler
    }

    fn builders_for(schema: &Schema) -> Vec<ColumnBuilder> {
        schema.fields().iter().cloned().map(ColumnBuilder::new).collect()
    }

    pub fn schema(&self) -> Option<&Arc<Schema>> {
        self.schema.get()
    }

    /// Rows pushed so far.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn n_batches(&self) -> usize {
        self.n_batches
    }

    /// Appends one batch. The batch index in errors counts pushes to this assembler.
    pub fn push(&mut self, batch: RecordBatch) -> Result<()> {
        let ordinal = self.n_batches;
        let schema = match self.schema.get() {
            Some(schema) => schema.clone(),
            None => {
                self.builders = Self::builders_for(&batch.schema);
                self.schema.get_or_init(|| batch.schema.clone()).clone()
            }
        };
        if !Arc::ptr_eq(&schema, &batch.schema) {
            schema.check_compatible(&batch.schema, ordinal)?;
        }
        if batch.columns.len() != schema.len() {
            return Err(IngestError::SchemaMismatch {
                batch: ordinal,
                detail: format!(
                    "batch carries {} columns, schema has {} fields",
                    batch.columns.len(),
                    schema.len()
                ),
            });
        }
        for (col, field) in batch.columns.iter().zip(schema.fields()) {
            if col.len() != batch.n_rows {
                return Err(IngestError::RowCountMismatch {
                    field: field.name.clone(),
                    batch: ordinal,
                    declared: batch.n_rows,
                    implied: col.len(),
                });
            }
            if col.values.logical_type() != field.logical_type {
                return Err(IngestError::SchemaMismatch {
                    batch: ordinal,
                    detail: format!(
                        "column `{}` holds {} values, expected {}",
                        field.name,
                        col.values.logical_type(),
                        field.logical_type
                    ),
                });
            }
        }

        self.row_count += batch.n_rows;
        self.n_batches += 1;
        debug!(
            target: LOG_TARGET,
            table = %self.name,
            batch = ordinal,
            rows = batch.n_rows,
            total_rows = self.row_count,
            "appended batch"
        );

        if self.queued.is_empty() && batch.is_resolved() {
            self.append(ordinal, batch)
        } else {
            self.queued.push((ordinal, batch));
            Ok(())
        }
    }

    fn append(&mut self, ordinal: usize, batch: RecordBatch) -> Result<()> {
        for (builder, chunk) in self.builders.iter_mut().zip(batch.columns) {
            builder.append(chunk, ordinal)?;
        }
        Ok(())
    }

    /// Resolves queued dictionary columns and freezes the table.
    pub fn finish(mut self, dictionaries: &DictionaryResolver) -> Result<Table> {
        let schema = self.schema.take().ok_or_else(|| {
            IngestError::Protocol("no schema: nothing was pushed to the assembler".into())
        })?;
        for (ordinal, mut batch) in std::mem::take(&mut self.queued) {
            let columns = std::mem::take(&mut batch.columns);
            batch.columns = columns
                .into_iter()
                .zip(schema.fields())
                .map(|(chunk, field)| dictionaries.resolve_final(chunk, &field.name, ordinal))
                .collect::<Result<Vec<_>>>()?;
            self.append(ordinal, batch)?;
        }
        let columns = self
            .builders
            .into_iter()
            .map(ColumnBuilder::finish)
            .collect();
        debug!(
            target: LOG_TARGET,
            table = %self.name,
            rows = self.row_count,
            columns = schema.len(),
            "assembled table"
        );
        Ok(Table::new(self.name, schema, columns, self.row_count))
    }
}
