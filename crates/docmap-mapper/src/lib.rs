//! # docmap-mapper
//!
//! Typed record to document mapping.
//!
//! A record type describes itself with a [`TypeDescriptor`]. The descriptor
//! resolves to a [`FieldPlan`], which compiles into a [`Serializer`] and, per
//! index schema, a [`Deserializer`]. Compiled functions are kept in a
//! [`ConversionCache`] keyed by [`Fingerprint`].
//!
//! ## Conversion rules
//! - Supported member types: `String`, `i32`, `i64`, `bool`, `char`,
//!   `DateTime<Utc>` and `Option` of each
//! - Booleans store as `True`/`False`; timestamps as epoch seconds
//! - Unset options store as the empty string and read back unset
//! - Missing or unparseable values leave the constructor's default
//! - Lists map to one delimited field when a delimiter is configured

pub mod cache;
pub mod codec;
pub mod compiler;
pub mod descriptor;
pub mod document;
pub mod dynamic;
pub mod error;
pub mod fingerprint;
pub mod plan;
pub mod value;

pub use cache::{
    global_cache, init_global_cache, CacheConfig, CacheStats, ConversionCache, SubscriptionId,
};
pub use compiler::{compile_deserializer, compile_serializer, Deserializer, Serializer};
pub use descriptor::{
    MemberConfig, MemberDescriptor, ParsePolicy, Record, TypeConfig, TypeDescriptor,
};
pub use document::{Document, Field, IndexPolicy, Store};
pub use dynamic::{DynamicDeserializer, DynamicRecord};
pub use error::{ConfigError, MapError};
pub use fingerprint::{Direction, Fingerprint};
pub use plan::{build_field_plan, FieldPlan, FieldPlanEntry};
pub use value::{MemberType, Value, ValueType};
