//! # Type Mapper
//!
//! Maps each wire type, with its parameters, onto one [`LogicalType`] and the
//! [`DecodeRule`] the record batch decoder applies to its buffers.
//!
//! The mapping is a single `match`; supporting another wire type is one arm here
//! and one arm in the batch decoder's rule dispatch.

use crate::constants::{MICROS_PER_MILLI, MILLIS_PER_DAY, MILLIS_PER_SECOND, NANOS_PER_MILLI};
use crate::error::{IngestError, Result};
use crate::models::types::logical::LogicalType;
use crate::models::types::wire::{WireTimeUnit, WireType};

/// How a field's buffers are turned into logical values.
///
/// Widths are in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeRule {
    /// Sign-extend to 64 bits.
    SignedInt { width: usize },
    /// Zero-extend to 64 bits; 8-byte values above `i64::MAX` overflow.
    UnsignedInt { width: usize },
    /// Widen to `f64`.
    Float { width: usize },
    /// One LSB0 bit per value.
    BitPacked,
    /// Days since epoch, scaled to milliseconds.
    Date32,
    /// Milliseconds since epoch, passed through.
    Date64,
    /// Normalise to epoch milliseconds.
    Timestamp(WireTimeUnit),
    /// 128-bit two's-complement mantissa, unscaled by `10^scale`.
    Decimal128 { scale: i32 },
    /// Offsets buffer of `offset_width` bytes per entry plus a UTF-8 data buffer.
    Utf8 { offset_width: usize },
    /// Integer indices into dictionary `dict_id`.
    DictionaryIndex {
        dict_id: i64,
        width: usize,
        signed: bool,
    },
}

impl DecodeRule {
    /// Buffers the field consumes from the batch, validity included.
    pub fn buffer_count(&self) -> usize {
        match self {
            DecodeRule::Utf8 { .. } => 3,
            _ => 2,
        }
    }
}

/// The result of mapping one wire type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeRule {
    pub logical: LogicalType,
    pub rule: DecodeRule,
}

impl TypeRule {
    fn new(logical: LogicalType, rule: DecodeRule) -> Self {
        Self { logical, rule }
    }
}

fn int_width(bit_width: i32) -> Option<usize> {
    match bit_width {
        8 | 16 | 32 | 64 => Some(bit_width as usize / 8),
        _ => None,
    }
}

fn unsupported(field: &str, wire: &WireType) -> IngestError {
    IngestError::UnsupportedType(format!("{wire} (field `{field}`)"))
}

/// Resolves the logical type and decode rule for `wire`.
pub fn resolve(wire: &WireType, field: &str) -> Result<TypeRule> {
    let rule = match wire {
        WireType::Int { bit_width, signed } => {
            let width = int_width(*bit_width).ok_or_else(|| unsupported(field, wire))?;
            let rule = if *signed {
                DecodeRule::SignedInt { width }
            } else {
                DecodeRule::UnsignedInt { width }
            };
            TypeRule::new(LogicalType::Int64, rule)
        }
        WireType::Float { bit_width: 32 } => {
            TypeRule::new(LogicalType::Float64, DecodeRule::Float { width: 4 })
        }
        WireType::Float { bit_width: 64 } => {
            TypeRule::new(LogicalType::Float64, DecodeRule::Float { width: 8 })
        }
        WireType::Bool => TypeRule::new(LogicalType::Boolean, DecodeRule::BitPacked),
        WireType::Date32 => TypeRule::new(LogicalType::Date, DecodeRule::Date32),
        WireType::Date64 => TypeRule::new(LogicalType::Date, DecodeRule::Date64),
        WireType::Timestamp { unit } => {
            TypeRule::new(LogicalType::Datetime, DecodeRule::Timestamp(*unit))
        }
        WireType::Decimal {
            scale,
            bit_width: 128,
            ..
        } => TypeRule::new(LogicalType::Int64, DecodeRule::Decimal128 { scale: *scale }),
        WireType::Utf8 => TypeRule::new(LogicalType::String, DecodeRule::Utf8 { offset_width: 4 }),
        WireType::LargeUtf8 => {
            TypeRule::new(LogicalType::String, DecodeRule::Utf8 { offset_width: 8 })
        }
        WireType::Dictionary {
            id,
            index_bit_width,
            index_signed,
            value,
        } => {
            if !matches!(value.as_ref(), WireType::Utf8 | WireType::LargeUtf8) {
                return Err(unsupported(field, wire));
            }
            let width = int_width(*index_bit_width).ok_or_else(|| unsupported(field, wire))?;
            TypeRule::new(
                LogicalType::String,
                DecodeRule::DictionaryIndex {
                    dict_id: *id,
                    width,
                    signed: *index_signed,
                },
            )
        }
        WireType::Float { .. } | WireType::Decimal { .. } | WireType::Other(_) => {
            return Err(unsupported(field, wire));
        }
    };
    Ok(rule)
}

// ------------------------- Value conversions ------------------------------------//

/// Days since epoch to epoch milliseconds at midnight.
#[inline]
pub fn date32_to_millis(days: i32) -> i64 {
    days as i64 * MILLIS_PER_DAY
}

/// Date64 milliseconds truncated to midnight of the containing day.
///
/// `None` only for the few values near `i64::MIN` whose day start is not representable.
#[inline]
pub fn date64_to_day_millis(millis: i64) -> Option<i64> {
    millis.div_euclid(MILLIS_PER_DAY).checked_mul(MILLIS_PER_DAY)
}

/// Epoch milliseconds from a timestamp in `unit`.
///
/// Sub-millisecond units floor toward negative infinity. Returns `None` when
/// seconds overflow on scaling.
#[inline]
pub fn timestamp_to_millis(value: i64, unit: WireTimeUnit) -> Option<i64> {
    match unit {
        WireTimeUnit::Second => value.checked_mul(MILLIS_PER_SECOND),
        WireTimeUnit::Millisecond => Some(value),
        WireTimeUnit::Microsecond => Some(value.div_euclid(MICROS_PER_MILLI)),
        WireTimeUnit::Nanosecond => Some(value.div_euclid(NANOS_PER_MILLI)),
    }
}

/// Unscales a decimal mantissa into an `i64`.
///
/// Positive scales divide with truncation toward zero; negative scales
/// multiply. Returns `None` if the result leaves the `i64` range.
pub fn decimal_to_i64(mantissa: i128, scale: i32) -> Option<i64> {
    let factor = 10i128.checked_pow(scale.unsigned_abs())?;
    let unscaled = if scale >= 0 {
        mantissa / factor
    } else {
        mantissa.checked_mul(factor)?
    };
    i64::try_from(unscaled).ok()
}
