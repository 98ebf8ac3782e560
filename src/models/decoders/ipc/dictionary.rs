//! # Dictionary Resolver
//!
//! Registers dictionary batches by id and substitutes dictionary indices with
//! their string values.
//!
//! Each id is defined exactly once. Delta batches and redefinitions are refused.
//! Index chunks whose dictionary has not arrived stay pending until the table is
//! finished; if the dictionary never arrives, the decode fails.

use std::collections::HashMap;

use tracing::debug;

use crate::constants::LOG_TARGET;
use crate::error::{IngestError, Result};
use crate::models::decoders::ipc::parser::{FieldSpec, decode_columns};
use crate::models::decoders::ipc::schema::SchemaPlan;
use crate::models::decoders::ipc::type_map::resolve;
use crate::models::frames::ipc_message::IpcFrame;
use crate::models::types::column::{ChunkValues, ColumnChunk, StringArena};
use crate::models::types::record_batch::RecordBatch;

/// Decoded values of one dictionary.
#[derive(Debug, Clone)]
struct Dictionary {
    values: StringArena,
    validity: Vec<bool>,
}

impl Dictionary {
    fn len(&self) -> usize {
        self.validity.len()
    }
}

/// Holds every dictionary seen so far in a stream.
#[derive(Debug, Default)]
pub struct DictionaryResolver {
    dictionaries: HashMap<i64, Dictionary>,
}

impl DictionaryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.dictionaries.contains_key(&id)
    }

    /// Number of registered dictionaries.
    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    /// Decodes and registers a DictionaryBatch message. Returns its id.
    pub fn ingest(&mut self, plan: &SchemaPlan, frame: &IpcFrame<'_>) -> Result<i64> {
        let message = frame.message()?;
        let db = message.header_as_dictionary_batch().ok_or_else(|| {
            IngestError::Protocol(format!(
                "message {} has no dictionary batch header",
                frame.index
            ))
        })?;
        let id = db.id();
        if db.isDelta() {
            return Err(IngestError::Protocol(format!(
                "delta dictionary batch for id {id} is not supported"
            )));
        }
        if self.contains(id) {
            return Err(IngestError::Protocol(format!(
                "dictionary {id} defined more than once"
            )));
        }
        let field = plan.dictionary_field(id).ok_or_else(|| {
            IngestError::Protocol(format!("dictionary {id} is not referenced by the schema"))
        })?;
        let value_type = plan
            .dictionary_value_type(id)
            .ok_or_else(|| IngestError::Protocol(format!("dictionary {id} has no value type")))?;
        let rule = resolve(value_type, &field.field.name)?.rule;
        let data = db.data().ok_or_else(|| {
            IngestError::Protocol(format!("dictionary batch {id} carries no data"))
        })?;

        let spec = FieldSpec {
            name: &field.field.name,
            rule,
        };
        let (_, mut chunks) = decode_columns(&[spec], &data, frame.body, frame.index, false)?;
        let chunk = chunks.pop().ok_or_else(|| {
            IngestError::Protocol(format!("dictionary batch {id} decoded no column"))
        })?;
        let values = match chunk.values {
            ChunkValues::String(arena) => arena,
            other => {
                return Err(IngestError::UnsupportedType(format!(
                    "dictionary {id} values of type {}",
                    other.logical_type()
                )));
            }
        };
        debug!(
            target: LOG_TARGET,
            dict_id = id,
            field = %field.field.name,
            values = values.len(),
            "registered dictionary"
        );
        self.dictionaries.insert(
            id,
            Dictionary {
                values,
                validity: chunk.validity,
            },
        );
        Ok(id)
    }

    /// Resolves every pending column of `batch` whose dictionary is known.
    pub fn try_resolve(&self, batch: &mut RecordBatch) -> Result<()> {
        let schema = batch.schema.clone();
        for (col, field) in batch.columns.iter_mut().zip(schema.fields()) {
            if let Some(id) = col.pending_dictionary() {
                if let Some(dict) = self.dictionaries.get(&id) {
                    *col = substitute(dict, id, col, &field.name, batch.batch_index)?;
                }
            }
        }
        Ok(())
    }

    /// Resolves a pending chunk, failing if its dictionary never arrived.
    ///
    /// Chunks that are not pending are returned unchanged.
    pub fn resolve_final(
        &self,
        chunk: ColumnChunk,
        field: &str,
        batch: usize,
    ) -> Result<ColumnChunk> {
        let Some(id) = chunk.pending_dictionary() else {
            return Ok(chunk);
        };
        match self.dictionaries.get(&id) {
            Some(dict) => substitute(dict, id, &chunk, field, batch),
            None => Err(IngestError::UnresolvedDictionary {
                field: field.to_string(),
                dict_id: id,
            }),
        }
    }
}

/// Replaces indices with dictionary strings. Null indices and indices that
/// point at null dictionary entries become null rows.
fn substitute(
    dict: &Dictionary,
    id: i64,
    chunk: &ColumnChunk,
    field: &str,
    batch: usize,
) -> Result<ColumnChunk> {
    let ChunkValues::PendingDictionary { indices, .. } = &chunk.values else {
        return Ok(chunk.clone());
    };
    let mut values = StringArena::with_capacity(chunk.len(), 0);
    let mut validity = Vec::with_capacity(chunk.len());
    for (row, (idx, valid)) in indices.iter().zip(&chunk.validity).enumerate() {
        if !*valid {
            values.push_empty();
            validity.push(false);
            continue;
        }
        let Some(i) = usize::try_from(*idx).ok().filter(|i| *i < dict.len()) else {
            return Err(IngestError::Protocol(format!(
                "index {idx} out of range for dictionary {id} of {} values (field `{field}`, batch {batch}, row {row})",
                dict.len()
            )));
        };
        if dict.validity[i] {
            values.push(dict.values.get(i));
            validity.push(true);
        } else {
            values.push_empty();
            validity.push(false);
        }
    }
    Ok(ColumnChunk::new(ChunkValues::String(values), validity))
}
