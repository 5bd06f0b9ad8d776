//! Error types for record mapping.
//!
//! [`ConfigError`] is raised while building a field plan or compiling a
//! mapping function. [`MapError`] is raised while materializing a record
//! from a document.

use thiserror::Error;

use crate::value::ValueType;

/// A record type's mapping configuration cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Materialization needs a zero-argument constructor
    #[error("Type `{type_name}` has no zero-argument constructor; one is required to materialize records")]
    MissingConstructor { type_name: &'static str },

    /// Member explicitly mapped but its type has no text form
    #[error("Member `{member}` of `{type_name}` has unsupported type `{value_type}`; attach a custom serializer/deserializer or a delimiter")]
    UnsupportedType {
        type_name: &'static str,
        member: String,
        value_type: ValueType,
    },

    /// Delimited member is not a list
    #[error("Delimited member `{member}` of `{type_name}` must be a list, found `{value_type}`")]
    DelimitedNotList {
        type_name: &'static str,
        member: String,
        value_type: ValueType,
    },

    /// Delimited list element is not a primitive
    #[error("Delimited member `{member}` of `{type_name}` has element type `{element_type}` which cannot be parsed; use a custom deserializer")]
    DelimitedElement {
        type_name: &'static str,
        member: String,
        element_type: ValueType,
    },

    /// Delimiter is the empty string
    #[error("Delimited member `{member}` of `{type_name}` has an empty delimiter")]
    EmptyDelimiter {
        type_name: &'static str,
        member: String,
    },

    /// Update key field is not indexed as one exact term
    #[error("Key field `{field}` of `{type_name}` cannot be matched by exact value: {reason}")]
    UnmatchableKey {
        type_name: &'static str,
        field: String,
        reason: &'static str,
    },

    /// Configuration names a member the descriptor does not declare
    #[error("Configuration for `{type_name}` refers to unknown member `{member}`")]
    UnknownMember {
        type_name: &'static str,
        member: String,
    },
}

/// Materializing a record from a document failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MapError {
    /// The document carries a field the cached deserializer did not bind.
    /// The caller is expected to rebuild the deserializer and retry once.
    #[error("Schema drift mapping `{type_name}`: document field `{field}` is not bound by the cached deserializer")]
    SchemaDrift {
        type_name: &'static str,
        field: String,
    },

    /// A stored value could not be parsed under the strict parse policy
    #[error("Cannot parse field `{field}` of `{type_name}` as {expected}: {value:?}")]
    Parse {
        type_name: &'static str,
        field: String,
        value: String,
        expected: ValueType,
    },

    /// Configuration error surfaced while mapping
    #[error("Mapping configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MapError {
    /// True when this error should trigger a deserializer rebuild.
    pub fn is_schema_drift(&self) -> bool {
        matches!(self, MapError::SchemaDrift { .. })
    }
}
