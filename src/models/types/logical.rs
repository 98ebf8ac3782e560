//! # Logical schema
//!
//! Wire-format-independent column types, fields and schemas.
//!
//! Every Arrow wire type the decoder accepts collapses onto one of the six
//! [`LogicalType`] variants. Field order is wire order and defines column order
//! in every output.

use std::fmt;

use crate::error::{IngestError, Result};

/// Logical column type, independent of the wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Signed 64-bit integers (all integer widths and unscaled decimals).
    Int64,
    /// 64-bit floats.
    Float64,
    /// Booleans.
    Boolean,
    /// Calendar dates, stored as epoch milliseconds at midnight UTC.
    Date,
    /// Instants, stored as epoch milliseconds.
    Datetime,
    /// UTF-8 strings, including resolved dictionary columns.
    String,
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalType::Int64 => "int64",
            LogicalType::Float64 => "float64",
            LogicalType::Boolean => "boolean",
            LogicalType::Date => "date",
            LogicalType::Datetime => "datetime",
            LogicalType::String => "string",
        };
        f.write_str(s)
    }
}

/// A named, typed column slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub logical_type: LogicalType,
    pub nullable: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, logical_type: LogicalType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            logical_type,
            nullable,
        }
    }
}

/// Ordered field list with unique names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    /// Builds a schema, rejecting duplicate field names.
    pub fn try_new(fields: Vec<Field>) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if fields[..i].iter().any(|f| f.name == field.name) {
                return Err(IngestError::Protocol(format!(
                    "duplicate field name `{}` in schema",
                    field.name
                )));
            }
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Ordered `(name, type)` pairs.
    pub fn types(&self) -> Vec<(&str, LogicalType)> {
        self.fields
            .iter()
            .map(|f| (f.name.as_str(), f.logical_type))
            .collect()
    }

    /// Structural comparison against a later batch's schema.
    ///
    /// Field count, names and logical types must agree position by position.
    /// Nullability may differ.
    pub fn check_compatible(&self, other: &Schema, batch: usize) -> Result<()> {
        if self.len() != other.len() {
            return Err(IngestError::SchemaMismatch {
                batch,
                detail: format!(
                    "expected {} fields, found {}",
                    self.len(),
                    other.len()
                ),
            });
        }
        for (i, (ours, theirs)) in self.fields.iter().zip(&other.fields).enumerate() {
            if ours.name != theirs.name {
                return Err(IngestError::SchemaMismatch {
                    batch,
                    detail: format!(
                        "field {i} is named `{}`, expected `{}`",
                        theirs.name, ours.name
                    ),
                });
            }
            if ours.logical_type != theirs.logical_type {
                return Err(IngestError::SchemaMismatch {
                    batch,
                    detail: format!(
                        "field `{}` has type {}, expected {}",
                        ours.name, theirs.logical_type, ours.logical_type
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(fields: &[(&str, LogicalType)]) -> Schema {
        Schema::try_new(
            fields
                .iter()
                .map(|(n, t)| Field::new(*n, *t, true))
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let err = Schema::try_new(vec![
            Field::new("a", LogicalType::Int64, true),
            Field::new("a", LogicalType::String, true),
        ])
        .unwrap_err();
        assert!(matches!(err, IngestError::Protocol(_)));
    }

    #[test]
    fn test_compatible_ignores_nullability() {
        let a = schema(&[("x", LogicalType::Int64)]);
        let b = Schema::try_new(vec![Field::new("x", LogicalType::Int64, false)]).unwrap();
        a.check_compatible(&b, 1).unwrap();
    }

    #[test]
    fn test_incompatible_schemas() {
        let a = schema(&[("x", LogicalType::Int64), ("y", LogicalType::String)]);

        let fewer = schema(&[("x", LogicalType::Int64)]);
        assert!(matches!(
            a.check_compatible(&fewer, 2),
            Err(IngestError::SchemaMismatch { batch: 2, .. })
        ));

        let renamed = schema(&[("x", LogicalType::Int64), ("z", LogicalType::String)]);
        assert!(a.check_compatible(&renamed, 1).is_err());

        let retyped = schema(&[("x", LogicalType::Float64), ("y", LogicalType::String)]);
        assert!(a.check_compatible(&retyped, 1).is_err());
    }

    #[test]
    fn test_lookup_helpers() {
        let s = schema(&[("a", LogicalType::Date), ("b", LogicalType::Boolean)]);
        assert_eq!(s.index_of("b"), Some(1));
        assert_eq!(s.field("a").unwrap().logical_type, LogicalType::Date);
        assert_eq!(s.names().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(
            s.types(),
            vec![("a", LogicalType::Date), ("b", LogicalType::Boolean)]
        );
    }
}
