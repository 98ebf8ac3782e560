//! # Columns
//!
//! Dense, arena-style column storage.
//!
//! - [`ColumnChunk`] is the decoded output for one field of one record batch.
//! - [`Column`] is the final, concatenated column owned by a [`Table`](super::table::Table).
//!
//! Values live in a single 64-byte aligned `Vec64` per column and nullity in a
//! parallel `Bitmask`. Strings share one byte arena indexed by offsets. Null rows
//! hold a zero or empty placeholder; only the validity mask says whether a row
//! is null.

use chrono::{DateTime, NaiveDateTime, Utc};
use minarrow::{Bitmask, Vec64};

use crate::error::{IngestError, Result};
use crate::models::types::logical::{Field, LogicalType};

// ------------------------- String arena ------------------------------------------//

/// Concatenated UTF-8 bytes plus `len + 1` offsets.
#[derive(Debug, Clone)]
pub struct StringArena {
    offsets: Vec64<usize>,
    bytes: Vec64<u8>,
}

impl Default for StringArena {
    fn default() -> Self {
        Self::with_capacity(0, 0)
    }
}

impl StringArena {
    pub fn with_capacity(rows: usize, bytes: usize) -> Self {
        let mut offsets = Vec64::with_capacity(rows + 1);
        offsets.push(0);
        Self {
            offsets,
            bytes: Vec64::with_capacity(bytes),
        }
    }

    #[inline]
    pub fn push(&mut self, s: &str) {
        self.bytes.extend_from_slice(s.as_bytes());
        self.offsets.push(self.bytes.len());
    }

    /// Pushes an empty placeholder, used for null rows.
    #[inline]
    pub fn push_empty(&mut self) {
        self.offsets.push(self.bytes.len());
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes held by the arena.
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn get(&self, i: usize) -> &str {
        let bytes = &self.bytes[self.offsets[i]..self.offsets[i + 1]];
        // SAFETY: every range was appended from a `&str` in `push`.
        unsafe { std::str::from_utf8_unchecked(bytes) }
    }

    /// Appends all rows of `other`.
    pub fn extend_from(&mut self, other: &StringArena) {
        for i in 0..other.len() {
            self.push(other.get(i));
        }
    }
}

// ------------------------- Batch chunks ------------------------------------------//

/// Values decoded from one field of one record batch.
#[derive(Debug, Clone)]
pub enum ChunkValues {
    Int64(Vec64<i64>),
    Float64(Vec64<f64>),
    Boolean(Vec<bool>),
    Date(Vec64<i64>),
    Datetime(Vec64<i64>),
    String(StringArena),
    /// Dictionary indices still waiting for their dictionary batch.
    PendingDictionary { dict_id: i64, indices: Vec64<i64> },
}

impl ChunkValues {
    pub fn len(&self) -> usize {
        match self {
            ChunkValues::Int64(v) | ChunkValues::Date(v) | ChunkValues::Datetime(v) => v.len(),
            ChunkValues::Float64(v) => v.len(),
            ChunkValues::Boolean(v) => v.len(),
            ChunkValues::String(a) => a.len(),
            ChunkValues::PendingDictionary { indices, .. } => indices.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical type these values surface as once resolved.
    pub fn logical_type(&self) -> LogicalType {
        match self {
            ChunkValues::Int64(_) => LogicalType::Int64,
            ChunkValues::Float64(_) => LogicalType::Float64,
            ChunkValues::Boolean(_) => LogicalType::Boolean,
            ChunkValues::Date(_) => LogicalType::Date,
            ChunkValues::Datetime(_) => LogicalType::Datetime,
            ChunkValues::String(_) | ChunkValues::PendingDictionary { .. } => {
                LogicalType::String
            }
        }
    }
}

/// One field's decoded values and per-row validity for a single batch.
#[derive(Debug, Clone)]
pub struct ColumnChunk {
    pub values: ChunkValues,
    pub validity: Vec<bool>,
}

impl ColumnChunk {
    pub fn new(values: ChunkValues, validity: Vec<bool>) -> Self {
        debug_assert_eq!(values.len(), validity.len());
        Self { values, validity }
    }

    pub fn len(&self) -> usize {
        self.validity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validity.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.validity.iter().filter(|v| !**v).count()
    }

    /// Dictionary id this chunk is waiting on, if any.
    pub fn pending_dictionary(&self) -> Option<i64> {
        match &self.values {
            ChunkValues::PendingDictionary { dict_id, .. } => Some(*dict_id),
            _ => None,
        }
    }
}

// ------------------------- Final columns -----------------------------------------//

/// Dense value storage of a finished column.
#[derive(Debug, Clone)]
pub enum ColumnData {
    Int64(Vec64<i64>),
    Float64(Vec64<f64>),
    Boolean(Bitmask),
    Date(Vec64<i64>),
    Datetime(Vec64<i64>),
    String(StringArena),
}

/// A borrowed, non-null cell value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    Int64(i64),
    Float64(f64),
    Boolean(bool),
    /// Epoch milliseconds at midnight UTC.
    Date(i64),
    /// Epoch milliseconds.
    Datetime(i64),
    String(&'a str),
}

impl<'a> Value<'a> {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Epoch milliseconds of a date or datetime value.
    pub fn as_epoch_millis(&self) -> Option<i64> {
        match self {
            Value::Date(ms) | Value::Datetime(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Date or datetime value as a UTC `NaiveDateTime`.
    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        self.as_epoch_millis()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .map(|dt| dt.naive_utc())
    }
}

/// A finished, immutable column.
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    logical_type: LogicalType,
    data: ColumnData,
    validity: Bitmask,
    len: usize,
    null_count: usize,
}

impl Column {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn logical_type(&self) -> LogicalType {
        self.logical_type
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn validity(&self) -> &Bitmask {
        &self.validity
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    #[inline]
    pub fn is_null(&self, i: usize) -> bool {
        !self.validity.get(i)
    }

    /// Value at row `i`, or `None` when the row is null or out of range.
    pub fn value(&self, i: usize) -> Option<Value<'_>> {
        if i >= self.len || self.is_null(i) {
            return None;
        }
        Some(match &self.data {
            ColumnData::Int64(v) => Value::Int64(v[i]),
            ColumnData::Float64(v) => Value::Float64(v[i]),
            ColumnData::Boolean(bits) => Value::Boolean(bits.get(i)),
            ColumnData::Date(v) => Value::Date(v[i]),
            ColumnData::Datetime(v) => Value::Datetime(v[i]),
            ColumnData::String(arena) => Value::String(arena.get(i)),
        })
    }

    /// Nullable values in row order.
    pub fn iter(&self) -> impl Iterator<Item = Option<Value<'_>>> + '_ {
        (0..self.len).map(move |i| self.value(i))
    }
}

// ------------------------- Builder -----------------------------------------------//

/// Grows one column batch by batch.
#[derive(Debug)]
pub(crate) struct ColumnBuilder {
    field: Field,
    values: ChunkValues,
    validity: Vec<bool>,
}

impl ColumnBuilder {
    pub(crate) fn new(field: Field) -> Self {
        let values = match field.logical_type {
            LogicalType::Int64 => ChunkValues::Int64(Vec64::new()),
            LogicalType::Float64 => ChunkValues::Float64(Vec64::new()),
            LogicalType::Boolean => ChunkValues::Boolean(Vec::new()),
            LogicalType::Date => ChunkValues::Date(Vec64::new()),
            LogicalType::Datetime => ChunkValues::Datetime(Vec64::new()),
            LogicalType::String => ChunkValues::String(StringArena::default()),
        };
        Self {
            field,
            values,
            validity: Vec::new(),
        }
    }

    /// Appends a resolved chunk in arrival order.
    pub(crate) fn append(&mut self, chunk: ColumnChunk, batch: usize) -> Result<()> {
        let ColumnChunk { values, validity } = chunk;
        match (&mut self.values, values) {
            (ChunkValues::Int64(dst), ChunkValues::Int64(src))
            | (ChunkValues::Date(dst), ChunkValues::Date(src))
            | (ChunkValues::Datetime(dst), ChunkValues::Datetime(src)) => {
                dst.extend_from_slice(&src)
            }
            (ChunkValues::Float64(dst), ChunkValues::Float64(src)) => dst.extend_from_slice(&src),
            (ChunkValues::Boolean(dst), ChunkValues::Boolean(src)) => dst.extend_from_slice(&src),
            (ChunkValues::String(dst), ChunkValues::String(src)) => dst.extend_from(&src),
            (_, ChunkValues::PendingDictionary { dict_id, .. }) => {
                return Err(IngestError::UnresolvedDictionary {
                    field: self.field.name.clone(),
                    dict_id,
                });
            }
            (_, other) => {
                return Err(IngestError::SchemaMismatch {
                    batch,
                    detail: format!(
                        "field `{}` received {} values, expected {}",
                        self.field.name,
                        other.logical_type(),
                        self.field.logical_type
                    ),
                });
            }
        }
        self.validity.extend_from_slice(&validity);
        Ok(())
    }

    pub(crate) fn finish(self) -> Column {
        let len = self.validity.len();
        let null_count = self.validity.iter().filter(|v| !**v).count();
        let data = match self.values {
            ChunkValues::Int64(v) => ColumnData::Int64(v),
            ChunkValues::Float64(v) => ColumnData::Float64(v),
            ChunkValues::Boolean(v) => ColumnData::Boolean(Bitmask::from_bools(&v)),
            ChunkValues::Date(v) => ColumnData::Date(v),
            ChunkValues::Datetime(v) => ColumnData::Datetime(v),
            ChunkValues::String(a) => ColumnData::String(a),
            // `append` never stores pending chunks
            ChunkValues::PendingDictionary { .. } => ColumnData::String(StringArena::default()),
        };
        Column {
            name: self.field.name,
            logical_type: self.field.logical_type,
            data,
            validity: Bitmask::from_bools(&self.validity),
            len,
            null_count,
        }
    }
}
