//! # Record Batch Decoder
//!
//! Decodes one RecordBatch (or DictionaryBatch payload) body into column chunks.
//!
//! Decoding runs in two passes:
//! 1. Buffer regions are located sequentially, in schema order, with every
//!    declared `(offset, length)` bounds-checked against the body.
//! 2. Each field's regions are converted into logical values. Fields are
//!    independent, so this pass may run on the rayon pool; results are merged
//!    back by field position.
//!
//! Only the validity mask decides nullity. Values at null rows are never read,
//! so wire padding at those positions cannot fail a decode.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::trace;

use minarrow::Vec64;

use crate::constants::{LOG_TARGET, MESSAGE_ALIGNMENT};
use crate::error::{IngestError, Result};
use crate::models::decoders::ipc::schema::SchemaPlan;
use crate::models::decoders::ipc::type_map::{
    DecodeRule, date32_to_millis, date64_to_day_millis, decimal_to_i64, timestamp_to_millis,
};
use crate::models::frames::ipc_message::IpcFrame;
use crate::models::types::column::{ChunkValues, ColumnChunk, StringArena};
use crate::models::types::record_batch::RecordBatch;
use crate::utils::{bitmap_len, le_array, unpack_bits, validity_from_bitmap};

/// Name and decode rule of one field to decode.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FieldSpec<'s> {
    pub name: &'s str,
    pub rule: DecodeRule,
}

/// A bounds-checked buffer region of the body.
#[derive(Debug, Clone, Copy)]
struct Region<'a> {
    offset: usize,
    bytes: &'a [u8],
}

/// All regions of one field within one batch.
#[derive(Debug)]
struct FieldSlices<'a, 's> {
    spec: FieldSpec<'s>,
    len: usize,
    null_count: usize,
    regions: Vec<Region<'a>>,
}

/// Walks the declared buffer list, handing out regions of the body.
struct BufferCursor<'a, 'm> {
    body: &'a [u8],
    buffers: flatbuffers::Vector<'m, arrow_ipc::Buffer>,
    next: usize,
    batch: usize,
}

impl<'a, 'm> BufferCursor<'a, 'm> {
    fn take(&mut self, field: &str) -> Result<Region<'a>> {
        let buf = self.buffers.get(self.next);
        self.next += 1;
        let (offset, length) = (buf.offset(), buf.length());
        let out_of_bounds = || IngestError::BufferBounds {
            field: field.to_string(),
            batch: self.batch,
            offset: offset.max(0) as usize,
            length: length.max(0) as usize,
            available: self.body.len(),
        };
        if offset < 0 || length < 0 {
            return Err(out_of_bounds());
        }
        let (offset, length) = (offset as usize, length as usize);
        match offset.checked_add(length) {
            Some(end) if end <= self.body.len() => Ok(Region {
                offset,
                bytes: &self.body[offset..end],
            }),
            _ => Err(out_of_bounds()),
        }
    }
}

fn too_small(spec: &FieldSpec<'_>, batch: usize, region: Region<'_>, needed: usize) -> IngestError {
    IngestError::BufferBounds {
        field: spec.name.to_string(),
        batch,
        offset: region.offset,
        length: needed,
        available: region.offset + region.bytes.len(),
    }
}

/// Decodes a RecordBatch message against `plan`.
pub fn decode_record_batch(
    plan: &SchemaPlan,
    frame: &IpcFrame<'_>,
    batch_index: usize,
    parallel: bool,
) -> Result<RecordBatch> {
    let message = frame.message()?;
    let rb = message.header_as_record_batch().ok_or_else(|| {
        IngestError::Protocol(format!(
            "message {} has no record batch header",
            frame.index
        ))
    })?;
    let specs: Vec<FieldSpec<'_>> = plan
        .fields
        .iter()
        .map(|f| FieldSpec {
            name: &f.field.name,
            rule: f.rule,
        })
        .collect();
    let (n_rows, columns) = decode_columns(&specs, &rb, frame.body, batch_index, parallel)?;
    trace!(
        target: LOG_TARGET,
        batch = batch_index,
        rows = n_rows,
        "decoded record batch"
    );
    Ok(RecordBatch::new(
        plan.schema.clone(),
        n_rows,
        columns,
        batch_index,
    ))
}

/// Decodes every field of a batch header over `body`.
///
/// Returns the batch row count and one chunk per field, in field order.
pub(crate) fn decode_columns(
    specs: &[FieldSpec<'_>],
    rb: &arrow_ipc::RecordBatch<'_>,
    body: &[u8],
    batch: usize,
    parallel: bool,
) -> Result<(usize, Vec<ColumnChunk>)> {
    if rb.compression().is_some() {
        return Err(IngestError::UnsupportedType(format!(
            "compressed record batch body (batch {batch})"
        )));
    }
    let length = rb.length();
    if length < 0 {
        return Err(IngestError::Protocol(format!(
            "negative row count {length} in batch {batch}"
        )));
    }
    let n_rows = length as usize;

    let node_count = rb.nodes().map(|n| n.len()).unwrap_or(0);
    if node_count != specs.len() {
        return Err(IngestError::SchemaMismatch {
            batch,
            detail: format!(
                "batch has {node_count} field nodes, schema has {} fields",
                specs.len()
            ),
        });
    }
    let needed: usize = specs.iter().map(|s| s.rule.buffer_count()).sum();
    let buffers = match rb.buffers() {
        Some(b) if b.len() >= needed => b,
        other => {
            return Err(IngestError::SchemaMismatch {
                batch,
                detail: format!(
                    "batch declares {} buffers, schema needs {needed}",
                    other.map(|b| b.len()).unwrap_or(0)
                ),
            });
        }
    };

    let mut cursor = BufferCursor {
        body,
        buffers,
        next: 0,
        batch,
    };
    let mut fields = Vec::with_capacity(specs.len());
    for (i, spec) in specs.iter().enumerate() {
        let node = match rb.nodes() {
            Some(nodes) => nodes.get(i),
            None => break,
        };
        let (node_len, null_count) = (node.length(), node.null_count());
        if node_len != length {
            return Err(IngestError::RowCountMismatch {
                field: spec.name.to_string(),
                batch,
                declared: n_rows,
                implied: node_len.max(0) as usize,
            });
        }
        if null_count < 0 || null_count > length {
            return Err(IngestError::Protocol(format!(
                "field `{}` declares {null_count} nulls in {length} rows",
                spec.name
            )));
        }
        let regions = (0..spec.rule.buffer_count())
            .map(|_| cursor.take(spec.name))
            .collect::<Result<Vec<_>>>()?;
        fields.push(FieldSlices {
            spec: *spec,
            len: n_rows,
            null_count: null_count as usize,
            regions,
        });
    }

    let columns = decode_fields(&fields, batch, parallel)?;
    Ok((n_rows, columns))
}

#[cfg(feature = "parallel")]
fn decode_fields(
    fields: &[FieldSlices<'_, '_>],
    batch: usize,
    parallel: bool,
) -> Result<Vec<ColumnChunk>> {
    if parallel && fields.len() > 1 {
        return fields
            .par_iter()
            .map(|f| decode_field(f, batch))
            .collect();
    }
    fields.iter().map(|f| decode_field(f, batch)).collect()
}

#[cfg(not(feature = "parallel"))]
fn decode_fields(
    fields: &[FieldSlices<'_, '_>],
    batch: usize,
    _parallel: bool,
) -> Result<Vec<ColumnChunk>> {
    fields.iter().map(|f| decode_field(f, batch)).collect()
}

// ------------------------- Per-field conversion ---------------------------------//

#[inline]
fn read_signed(bytes: &[u8], i: usize, width: usize) -> i64 {
    let at = &bytes[i * width..];
    match width {
        1 => at[0] as i8 as i64,
        2 => i16::from_le_bytes(le_array(at)) as i64,
        4 => i32::from_le_bytes(le_array(at)) as i64,
        _ => i64::from_le_bytes(le_array(at)),
    }
}

#[inline]
fn read_unsigned(bytes: &[u8], i: usize, width: usize) -> u64 {
    let at = &bytes[i * width..];
    match width {
        1 => at[0] as u64,
        2 => u16::from_le_bytes(le_array(at)) as u64,
        4 => u32::from_le_bytes(le_array(at)) as u64,
        _ => u64::from_le_bytes(le_array(at)),
    }
}

/// Maps each valid row through `f`; null rows hold `T::default()`.
fn map_valid<T, F>(validity: &[bool], mut f: F) -> Result<Vec64<T>>
where
    T: Default + Copy,
    F: FnMut(usize) -> Result<T>,
{
    let mut out = Vec64::with_capacity(validity.len());
    for (row, valid) in validity.iter().enumerate() {
        out.push(if *valid { f(row)? } else { T::default() });
    }
    Ok(out)
}

fn decode_field(f: &FieldSlices<'_, '_>, batch: usize) -> Result<ColumnChunk> {
    let spec = &f.spec;
    let validity_region = f.regions[0];
    let validity = validity_from_bitmap(validity_region.bytes, f.len, f.null_count)
        .ok_or_else(|| too_small(spec, batch, validity_region, bitmap_len(f.len)))?;

    let values_region = f.regions[1];
    let values = values_region.bytes;
    let overflow = |row: usize, detail: String| IngestError::DecodeOverflow {
        field: spec.name.to_string(),
        batch,
        row,
        detail,
    };
    let fixed = |width: usize| -> Result<()> {
        if values.len() < f.len * width {
            return Err(too_small(spec, batch, values_region, f.len * width));
        }
        Ok(())
    };

    let chunk = match spec.rule {
        DecodeRule::SignedInt { width } => {
            fixed(width)?;
            ChunkValues::Int64(map_valid(&validity, |i| Ok(read_signed(values, i, width)))?)
        }
        DecodeRule::UnsignedInt { width } => {
            fixed(width)?;
            ChunkValues::Int64(map_valid(&validity, |i| {
                let v = read_unsigned(values, i, width);
                i64::try_from(v).map_err(|_| overflow(i, format!("uint64 value {v} exceeds int64")))
            })?)
        }
        DecodeRule::Float { width } => {
            fixed(width)?;
            ChunkValues::Float64(map_valid(&validity, |i| {
                Ok(if width == 4 {
                    f32::from_le_bytes(le_array(&values[i * 4..])) as f64
                } else {
                    f64::from_le_bytes(le_array(&values[i * 8..]))
                })
            })?)
        }
        DecodeRule::BitPacked => {
            let bits = unpack_bits(values, f.len)
                .ok_or_else(|| too_small(spec, batch, values_region, bitmap_len(f.len)))?;
            let bools = bits
                .iter()
                .zip(&validity)
                .map(|(bit, valid)| *bit && *valid)
                .collect();
            ChunkValues::Boolean(bools)
        }
        DecodeRule::Date32 => {
            fixed(4)?;
            ChunkValues::Date(map_valid(&validity, |i| {
                Ok(date32_to_millis(read_signed(values, i, 4) as i32))
            })?)
        }
        DecodeRule::Date64 => {
            fixed(8)?;
            ChunkValues::Date(map_valid(&validity, |i| {
                let v = read_signed(values, i, 8);
                date64_to_day_millis(v)
                    .ok_or_else(|| overflow(i, format!("date64 {v} has no representable day start")))
            })?)
        }
        DecodeRule::Timestamp(unit) => {
            fixed(8)?;
            ChunkValues::Datetime(map_valid(&validity, |i| {
                let v = read_signed(values, i, 8);
                timestamp_to_millis(v, unit)
                    .ok_or_else(|| overflow(i, format!("timestamp {v} {unit:?} exceeds int64 milliseconds")))
            })?)
        }
        DecodeRule::Decimal128 { scale } => {
            fixed(16)?;
            ChunkValues::Int64(map_valid(&validity, |i| {
                let mantissa = i128::from_le_bytes(le_array(&values[i * 16..]));
                decimal_to_i64(mantissa, scale).ok_or_else(|| {
                    overflow(i, format!("decimal {mantissa} at scale {scale} exceeds int64"))
                })
            })?)
        }
        DecodeRule::Utf8 { offset_width } => ChunkValues::String(decode_utf8(
            f,
            batch,
            &validity,
            offset_width,
        )?),
        DecodeRule::DictionaryIndex {
            dict_id,
            width,
            signed,
        } => {
            fixed(width)?;
            let indices = map_valid(&validity, |i| {
                if signed {
                    Ok(read_signed(values, i, width))
                } else {
                    let v = read_unsigned(values, i, width);
                    i64::try_from(v)
                        .map_err(|_| overflow(i, format!("dictionary index {v} exceeds int64")))
                }
            })?;
            ChunkValues::PendingDictionary { dict_id, indices }
        }
    };
    Ok(ColumnChunk::new(chunk, validity))
}

/// Slices a utf8 or large_utf8 field into a string arena.
fn decode_utf8(
    f: &FieldSlices<'_, '_>,
    batch: usize,
    validity: &[bool],
    offset_width: usize,
) -> Result<StringArena> {
    let spec = &f.spec;
    let offsets_region = f.regions[1];
    let data_region = f.regions[2];
    let offsets = offsets_region.bytes;
    let data = data_region.bytes;

    if f.len == 0 {
        return Ok(StringArena::default());
    }
    // writers may count trailing alignment padding in the offsets length
    let needed = (f.len + 1) * offset_width;
    if offsets.len() < needed || offsets.len() > needed.next_multiple_of(MESSAGE_ALIGNMENT) {
        let implied = (offsets.len() / offset_width).saturating_sub(1);
        return Err(IngestError::RowCountMismatch {
            field: spec.name.to_string(),
            batch,
            declared: f.len,
            implied,
        });
    }

    let offset_at = |i: usize| -> i64 {
        if offset_width == 4 {
            read_signed(offsets, i, 4)
        } else {
            read_signed(offsets, i, 8)
        }
    };

    let mut arena = StringArena::with_capacity(f.len, data.len());
    let mut start = offset_at(0);
    for (row, valid) in validity.iter().enumerate() {
        let end = offset_at(row + 1);
        if start < 0 || end < start || end as usize > data.len() {
            return Err(IngestError::BufferBounds {
                field: spec.name.to_string(),
                batch,
                offset: data_region.offset + start.max(0) as usize,
                length: (end - start).max(0) as usize,
                available: data_region.offset + data.len(),
            });
        }
        if *valid {
            let bytes = &data[start as usize..end as usize];
            let s = std::str::from_utf8(bytes).map_err(|source| IngestError::Utf8 {
                field: spec.name.to_string(),
                batch,
                row,
                source,
            })?;
            arena.push(s);
        } else {
            arena.push_empty();
        }
        start = end;
    }
    Ok(arena)
}
