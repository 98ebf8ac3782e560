//! # Table
//!
//! The assembled, immutable result of an ingestion: named columns of equal
//! length in schema order.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::types::column::{Column, Value};
use crate::models::types::logical::Schema;

/// Columnar table produced by [`TableAssembler`](crate::TableAssembler).
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    schema: Arc<Schema>,
    columns: Vec<Column>,
    index: HashMap<String, usize>,
    row_count: usize,
}

impl Table {
    pub(crate) fn new(
        name: String,
        schema: Arc<Schema>,
        columns: Vec<Column>,
        row_count: usize,
    ) -> Self {
        debug_assert!(columns.iter().all(|c| c.len() == row_count));
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name().to_string(), i))
            .collect();
        Self {
            name,
            schema,
            columns,
            index,
            row_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Total rows across every ingested batch.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.index.get(name).map(|i| &self.columns[*i])
    }

    pub fn column_at(&self, i: usize) -> Option<&Column> {
        self.columns.get(i)
    }

    /// Row `i` as nullable values in column order.
    pub fn row(&self, i: usize) -> Option<Vec<Option<Value<'_>>>> {
        if i >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| c.value(i)).collect())
    }
}
