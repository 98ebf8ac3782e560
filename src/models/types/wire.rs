//! Physical Arrow types as declared in schema metadata, before mapping.

use std::fmt;

/// Timestamp resolution on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireTimeUnit {
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

/// A wire type descriptor with its parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireType {
    Int { bit_width: i32, signed: bool },
    Float { bit_width: i32 },
    Bool,
    Date32,
    Date64,
    Timestamp { unit: WireTimeUnit },
    Decimal { precision: i32, scale: i32, bit_width: i32 },
    Utf8,
    LargeUtf8,
    Dictionary {
        id: i64,
        index_bit_width: i32,
        index_signed: bool,
        value: Box<WireType>,
    },
    /// Any tag the decoder has no mapping for, kept by name for error reporting.
    Other(String),
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::Int { bit_width, signed } => {
                write!(f, "{}int{bit_width}", if *signed { "" } else { "u" })
            }
            WireType::Float { bit_width } => write!(f, "float{bit_width}"),
            WireType::Bool => f.write_str("bool"),
            WireType::Date32 => f.write_str("date32"),
            WireType::Date64 => f.write_str("date64"),
            WireType::Timestamp { unit } => write!(f, "timestamp[{unit:?}]"),
            WireType::Decimal {
                precision,
                scale,
                bit_width,
            } => write!(f, "decimal{bit_width}({precision}, {scale})"),
            WireType::Utf8 => f.write_str("utf8"),
            WireType::LargeUtf8 => f.write_str("large_utf8"),
            WireType::Dictionary {
                index_bit_width,
                index_signed,
                value,
                ..
            } => write!(
                f,
                "dictionary<{}int{index_bit_width}, {value}>",
                if *index_signed { "" } else { "u" }
            ),
            WireType::Other(tag) => f.write_str(tag),
        }
    }
}
