//! # Schema Decoder
//!
//! Turns the stream's Schema message into a [`SchemaPlan`]: the logical schema
//! callers see, plus the per-field wire type and decode rule the batch decoder
//! walks.

use std::sync::Arc;

use arrow_ipc::{DateUnit, Endianness, Precision, TimeUnit, Type};
use tracing::debug;

use crate::constants::LOG_TARGET;
use crate::enums::MessageType;
use crate::error::{IngestError, Result};
use crate::models::decoders::ipc::type_map::{DecodeRule, resolve};
use crate::models::frames::ipc_message::IpcFrame;
use crate::models::types::logical::{Field, Schema};
use crate::models::types::wire::{WireTimeUnit, WireType};

/// One field with everything needed to decode its buffers.
#[derive(Debug, Clone)]
pub struct FieldPlan {
    pub field: Field,
    pub wire: WireType,
    pub rule: DecodeRule,
}

/// Decoded schema plus its decode plan, in wire order.
#[derive(Debug, Clone)]
pub struct SchemaPlan {
    pub schema: Arc<Schema>,
    pub fields: Vec<FieldPlan>,
}

impl SchemaPlan {
    /// Buffers one record batch must declare for this schema.
    pub fn buffer_count(&self) -> usize {
        self.fields.iter().map(|f| f.rule.buffer_count()).sum()
    }

    /// The field encoded with dictionary `id`, if any.
    pub fn dictionary_field(&self, id: i64) -> Option<&FieldPlan> {
        self.fields.iter().find(
            |f| matches!(f.rule, DecodeRule::DictionaryIndex { dict_id, .. } if dict_id == id),
        )
    }

    /// Wire type of dictionary `id`'s values.
    pub fn dictionary_value_type(&self, id: i64) -> Option<&WireType> {
        match &self.dictionary_field(id)?.wire {
            WireType::Dictionary { value, .. } => Some(value.as_ref()),
            _ => None,
        }
    }
}

/// Reads the type parameters of a FlatBuffers field, ignoring any dictionary encoding.
fn value_wire_type(field: &arrow_ipc::Field<'_>) -> WireType {
    let t = field.type_type();
    match t {
        Type::Int => match field.type_as_int() {
            Some(int) => WireType::Int {
                bit_width: int.bitWidth(),
                signed: int.is_signed(),
            },
            None => WireType::Other("Int".into()),
        },
        Type::FloatingPoint => match field.type_as_floating_point().map(|fp| fp.precision()) {
            Some(Precision::HALF) => WireType::Float { bit_width: 16 },
            Some(Precision::SINGLE) => WireType::Float { bit_width: 32 },
            Some(Precision::DOUBLE) => WireType::Float { bit_width: 64 },
            other => WireType::Other(format!("FloatingPoint({other:?})")),
        },
        Type::Bool => WireType::Bool,
        Type::Date => match field.type_as_date().map(|d| d.unit()) {
            Some(DateUnit::DAY) => WireType::Date32,
            Some(DateUnit::MILLISECOND) => WireType::Date64,
            other => WireType::Other(format!("Date({other:?})")),
        },
        Type::Timestamp => {
            let unit = match field.type_as_timestamp().map(|ts| ts.unit()) {
                Some(TimeUnit::SECOND) => WireTimeUnit::Second,
                Some(TimeUnit::MILLISECOND) => WireTimeUnit::Millisecond,
                Some(TimeUnit::MICROSECOND) => WireTimeUnit::Microsecond,
                Some(TimeUnit::NANOSECOND) => WireTimeUnit::Nanosecond,
                other => return WireType::Other(format!("Timestamp({other:?})")),
            };
            WireType::Timestamp { unit }
        }
        Type::Decimal => match field.type_as_decimal() {
            Some(dec) => WireType::Decimal {
                precision: dec.precision(),
                scale: dec.scale(),
                bit_width: dec.bitWidth(),
            },
            None => WireType::Other("Decimal".into()),
        },
        Type::Utf8 => WireType::Utf8,
        Type::LargeUtf8 => WireType::LargeUtf8,
        other => WireType::Other(format!("{other:?}")),
    }
}

/// Full wire type of a FlatBuffers field, dictionary encoding included.
pub fn wire_type(field: &arrow_ipc::Field<'_>) -> WireType {
    let value = value_wire_type(field);
    match field.dictionary() {
        Some(enc) => {
            // Arrow defaults a missing index type to signed 32-bit
            let (index_bit_width, index_signed) = enc
                .indexType()
                .map(|int| (int.bitWidth(), int.is_signed()))
                .unwrap_or((32, true));
            WireType::Dictionary {
                id: enc.id(),
                index_bit_width,
                index_signed,
                value: Box::new(value),
            }
        }
        None => value,
    }
}

/// Decodes the first message of a stream, which must be a Schema.
pub fn decode_schema(frame: &IpcFrame<'_>) -> Result<SchemaPlan> {
    if frame.kind != MessageType::Schema {
        return Err(IngestError::Protocol(format!(
            "expected Schema as message {}, found {:?}",
            frame.index, frame.kind
        )));
    }
    let message = frame.message()?;
    let fb_schema = message
        .header_as_schema()
        .ok_or_else(|| IngestError::Protocol("Schema message without a schema header".into()))?;

    if fb_schema.endianness() != Endianness::Little {
        return Err(IngestError::UnsupportedType("big-endian schema".into()));
    }

    let mut fields = Vec::new();
    let mut plans = Vec::new();
    if let Some(fb_fields) = fb_schema.fields() {
        for fb_field in fb_fields.iter() {
            let name = fb_field.name().unwrap_or_default().to_string();
            let wire = wire_type(&fb_field);
            let rule = resolve(&wire, &name)?;
            let field = Field::new(name, rule.logical, fb_field.nullable());
            fields.push(field.clone());
            plans.push(FieldPlan {
                field,
                wire,
                rule: rule.rule,
            });
        }
    }

    let schema = Arc::new(Schema::try_new(fields)?);
    debug!(
        target: LOG_TARGET,
        fields = schema.len(),
        names = ?schema.names().collect::<Vec<_>>(),
        "decoded schema"
    );
    Ok(SchemaPlan {
        schema,
        fields: plans,
    })
}
