//! Member values and the primitive types the mapper can convert.
//!
//! Record members are reached through typed accessors that hand out a
//! [`Value`]. The [`MemberType`] trait ties a Rust type to its
//! [`ValueType`] and performs the conversion in both directions.

use std::fmt;

use chrono::{DateTime, Utc};

/// Shape of a record member as seen by the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Int32,
    Int64,
    Bool,
    Timestamp,
    Char,
    /// Homogeneous sequence of the inner type
    List(Box<ValueType>),
    /// A type with no text form (nested structs, maps, ...). Carries a
    /// label for diagnostics.
    Opaque(&'static str),
}

impl ValueType {
    /// True for the closed set of types the mapper converts natively.
    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            ValueType::Text
                | ValueType::Int32
                | ValueType::Int64
                | ValueType::Bool
                | ValueType::Timestamp
                | ValueType::Char
        )
    }

    /// Element type when this is a list.
    pub fn element(&self) -> Option<&ValueType> {
        match self {
            ValueType::List(inner) => Some(inner),
            _ => None,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Text => f.write_str("string"),
            ValueType::Int32 => f.write_str("i32"),
            ValueType::Int64 => f.write_str("i64"),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Timestamp => f.write_str("timestamp"),
            ValueType::Char => f.write_str("char"),
            ValueType::List(inner) => write!(f, "list<{inner}>"),
            ValueType::Opaque(label) => f.write_str(label),
        }
    }
}

/// A member value in transit between a record and a document.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Unset nullable member
    Null,
    Text(String),
    Int32(i32),
    Int64(i64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Char(char),
    List(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// A Rust type that can sit behind a mapped member.
pub trait MemberType: Sized + Send + Sync + 'static {
    /// The mapper-level type of this member.
    fn value_type() -> ValueType;

    /// Whether the member may be unset.
    fn nullable() -> bool {
        false
    }

    fn to_value(&self) -> Value;

    /// Convert back from a value. `None` when the value has the wrong shape.
    fn from_value(value: Value) -> Option<Self>;
}

impl MemberType for String {
    fn value_type() -> ValueType {
        ValueType::Text
    }

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl MemberType for i32 {
    fn value_type() -> ValueType {
        ValueType::Int32
    }

    fn to_value(&self) -> Value {
        Value::Int32(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int32(v) => Some(v),
            _ => None,
        }
    }
}

impl MemberType for i64 {
    fn value_type() -> ValueType {
        ValueType::Int64
    }

    fn to_value(&self) -> Value {
        Value::Int64(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Int64(v) => Some(v),
            Value::Int32(v) => Some(v as i64),
            _ => None,
        }
    }
}

impl MemberType for bool {
    fn value_type() -> ValueType {
        ValueType::Bool
    }

    fn to_value(&self) -> Value {
        Value::Bool(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl MemberType for char {
    fn value_type() -> ValueType {
        ValueType::Char
    }

    fn to_value(&self) -> Value {
        Value::Char(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Char(c) => Some(c),
            _ => None,
        }
    }
}

impl MemberType for DateTime<Utc> {
    fn value_type() -> ValueType {
        ValueType::Timestamp
    }

    fn to_value(&self) -> Value {
        Value::Timestamp(*self)
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }
}

impl<P: MemberType> MemberType for Option<P> {
    fn value_type() -> ValueType {
        P::value_type()
    }

    fn nullable() -> bool {
        true
    }

    fn to_value(&self) -> Value {
        match self {
            Some(inner) => inner.to_value(),
            None => Value::Null,
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => P::from_value(other).map(Some),
        }
    }
}

impl<P: MemberType> MemberType for Vec<P> {
    fn value_type() -> ValueType {
        ValueType::List(Box::new(P::value_type()))
    }

    fn to_value(&self) -> Value {
        Value::List(self.iter().map(MemberType::to_value).collect())
    }

    fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::List(items) => items.into_iter().map(P::from_value).collect(),
            _ => None,
        }
    }
}
