//! Compilation of field plans into mapping functions.
//!
//! A compiled [`Serializer`] or [`Deserializer`] is a list of per-field steps
//! built once from the plan and reused for every record.

mod deserializer;
mod serializer;

pub use deserializer::{compile_deserializer, resolve_field_name, Deserializer};
pub use serializer::{compile_serializer, Serializer};
