//! Record type descriptors.
//!
//! A [`TypeDescriptor`] is the explicit description of a record type: its
//! name, an optional zero-argument constructor, type-level defaults, and an
//! ordered list of members reached through typed accessors. Per-member
//! configuration, custom codecs and delimiters are attached by member name
//! and resolved when the field plan is built.
//!
//! ```
//! use docmap_mapper::{MemberConfig, Record, TypeDescriptor};
//!
//! #[derive(Default)]
//! struct Note {
//!     id: i32,
//!     body: String,
//! }
//!
//! impl Record for Note {
//!     fn descriptor() -> TypeDescriptor<Self> {
//!         TypeDescriptor::new("Note")
//!             .with_default()
//!             .member("Id", |n: &Note| &n.id, |n: &mut Note| &mut n.id)
//!             .member("Body", |n: &Note| &n.body, |n: &mut Note| &mut n.body)
//!             .configure("Body", MemberConfig::new().field_name("text"))
//!     }
//! }
//! ```

use std::any::TypeId;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::document::{IndexPolicy, Store};
use crate::value::{MemberType, Value, ValueType};

/// Reads a member as a [`Value`].
pub type Getter<T> = Arc<dyn Fn(&T) -> Value + Send + Sync>;

/// Assigns a [`Value`] to a member. Returns false when the value has the wrong shape.
pub type Setter<T> = Arc<dyn Fn(&mut T, Value) -> bool + Send + Sync>;

/// Produces a member's stored text.
pub type CustomSerializer<T> = Arc<dyn Fn(&T) -> String + Send + Sync>;

/// Consumes a member's stored text.
pub type CustomDeserializer<T> = Arc<dyn Fn(&mut T, &str) + Send + Sync>;

/// A record type that can be mapped to and from documents.
pub trait Record: Sized + Send + Sync + 'static {
    fn descriptor() -> TypeDescriptor<Self>;
}

/// What to do when a stored value does not parse as its member's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParsePolicy {
    /// Leave the member at its default value
    #[default]
    Lenient,
    /// Fail the mapping with [`crate::MapError::Parse`]
    Strict,
}

/// Type-level mapping defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeConfig {
    /// Members are excluded unless they carry their own configuration
    pub ignore_by_default: bool,
    pub default_store: Store,
    pub default_index: IndexPolicy,
    pub parse_policy: ParsePolicy,
}

impl TypeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore_by_default(mut self, ignore: bool) -> Self {
        self.ignore_by_default = ignore;
        self
    }

    pub fn default_store(mut self, store: Store) -> Self {
        self.default_store = store;
        self
    }

    pub fn default_index(mut self, index: IndexPolicy) -> Self {
        self.default_index = index;
        self
    }

    pub fn parse_policy(mut self, policy: ParsePolicy) -> Self {
        self.parse_policy = policy;
        self
    }
}

/// Per-member overrides. Attaching one marks the member as declared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemberConfig {
    pub ignore: bool,
    pub field_name: Option<String>,
    pub store: Option<Store>,
    pub index: Option<IndexPolicy>,
}

impl MemberConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exclude the member from mapping.
    pub fn ignored() -> Self {
        Self {
            ignore: true,
            ..Self::default()
        }
    }

    pub fn field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn store(mut self, store: Store) -> Self {
        self.store = Some(store);
        self
    }

    pub fn index(mut self, index: IndexPolicy) -> Self {
        self.index = Some(index);
        self
    }
}

/// Typed read/write access to one member.
pub struct Accessor<T> {
    pub get: Getter<T>,
    pub set: Setter<T>,
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

/// One member of a record type.
pub struct MemberDescriptor<T> {
    name: &'static str,
    value_type: ValueType,
    nullable: bool,
    synthesized: bool,
    accessor: Option<Accessor<T>>,
}

impl<T> MemberDescriptor<T> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn value_type(&self) -> &ValueType {
        &self.value_type
    }

    pub fn nullable(&self) -> bool {
        self.nullable
    }

    /// Compiler-generated backing storage; never mapped.
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }

    /// `None` for opaque members.
    pub fn accessor(&self) -> Option<&Accessor<T>> {
        self.accessor.as_ref()
    }
}

/// Explicit description of a record type.
pub struct TypeDescriptor<T> {
    type_name: &'static str,
    type_id: TypeId,
    constructor: Option<fn() -> T>,
    config: TypeConfig,
    members: Vec<MemberDescriptor<T>>,
    member_configs: Vec<(&'static str, MemberConfig)>,
    serializers: Vec<(&'static str, CustomSerializer<T>)>,
    deserializers: Vec<(&'static str, CustomDeserializer<T>)>,
    delimiters: Vec<(&'static str, String)>,
    synthesized: Vec<&'static str>,
}

impl<T: 'static> TypeDescriptor<T> {
    pub fn new(type_name: &'static str) -> Self {
        Self {
            type_name,
            type_id: TypeId::of::<T>(),
            constructor: None,
            config: TypeConfig::default(),
            members: Vec::new(),
            member_configs: Vec::new(),
            serializers: Vec::new(),
            deserializers: Vec::new(),
            delimiters: Vec::new(),
            synthesized: Vec::new(),
        }
    }

    pub fn constructor(mut self, constructor: fn() -> T) -> Self {
        self.constructor = Some(constructor);
        self
    }

    /// Use [`Default::default`] as the constructor.
    pub fn with_default(self) -> Self
    where
        T: Default,
    {
        self.constructor(T::default)
    }

    pub fn config(mut self, config: TypeConfig) -> Self {
        self.config = config;
        self
    }

    /// Declare a member backed by a Rust field of a supported type.
    pub fn member<M, G, S>(mut self, name: &'static str, get: G, set: S) -> Self
    where
        M: MemberType,
        G: for<'a> Fn(&'a T) -> &'a M + Send + Sync + 'static,
        S: for<'a> Fn(&'a mut T) -> &'a mut M + Send + Sync + 'static,
    {
        let getter: Getter<T> = Arc::new(move |record: &T| get(record).to_value());
        let setter: Setter<T> = Arc::new(move |record: &mut T, value: Value| {
            match M::from_value(value) {
                Some(v) => {
                    *set(record) = v;
                    true
                }
                None => false,
            }
        });

        self.members.push(MemberDescriptor {
            name,
            value_type: M::value_type(),
            nullable: M::nullable(),
            synthesized: false,
            accessor: Some(Accessor {
                get: getter,
                set: setter,
            }),
        });
        self
    }

    /// Declare a member whose type has no text form. It is skipped unless a
    /// custom serializer or deserializer is attached.
    pub fn opaque(mut self, name: &'static str, type_label: &'static str) -> Self {
        self.members.push(MemberDescriptor {
            name,
            value_type: ValueType::Opaque(type_label),
            nullable: false,
            synthesized: false,
            accessor: None,
        });
        self
    }

    /// Mark a declared member as compiler-generated backing storage.
    pub fn synthesized(mut self, name: &'static str) -> Self {
        self.synthesized.push(name);
        self
    }

    pub fn configure(mut self, name: &'static str, config: MemberConfig) -> Self {
        self.member_configs.retain(|(n, _)| *n != name);
        self.member_configs.push((name, config));
        self
    }

    pub fn serialize_with<F>(mut self, name: &'static str, serializer: F) -> Self
    where
        F: Fn(&T) -> String + Send + Sync + 'static,
    {
        self.serializers.retain(|(n, _)| *n != name);
        self.serializers.push((name, Arc::new(serializer)));
        self
    }

    pub fn deserialize_with<F>(mut self, name: &'static str, deserializer: F) -> Self
    where
        F: Fn(&mut T, &str) + Send + Sync + 'static,
    {
        self.deserializers.retain(|(n, _)| *n != name);
        self.deserializers.push((name, Arc::new(deserializer)));
        self
    }

    /// Store a list member as one field, elements joined by `delimiter`.
    pub fn delimited(mut self, name: &'static str, delimiter: impl Into<String>) -> Self {
        self.delimiters.retain(|(n, _)| *n != name);
        self.delimiters.push((name, delimiter.into()));
        self
    }
}

impl<T> TypeDescriptor<T> {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn constructor_fn(&self) -> Option<fn() -> T> {
        self.constructor
    }

    pub fn type_config(&self) -> &TypeConfig {
        &self.config
    }

    pub fn members(&self) -> &[MemberDescriptor<T>] {
        &self.members
    }

    pub fn member_at(&self, index: usize) -> Option<&MemberDescriptor<T>> {
        self.members.get(index)
    }

    pub fn find_member(&self, name: &str) -> Option<&MemberDescriptor<T>> {
        self.members.iter().find(|m| m.name == name)
    }

    pub fn member_config(&self, name: &str) -> Option<&MemberConfig> {
        lookup(&self.member_configs, name)
    }

    pub fn custom_serializer(&self, name: &str) -> Option<&CustomSerializer<T>> {
        lookup(&self.serializers, name)
    }

    pub fn custom_deserializer(&self, name: &str) -> Option<&CustomDeserializer<T>> {
        lookup(&self.deserializers, name)
    }

    pub fn delimiter(&self, name: &str) -> Option<&str> {
        lookup(&self.delimiters, name).map(String::as_str)
    }

    pub fn is_synthesized(&self, name: &str) -> bool {
        self.synthesized.contains(&name)
            || self.find_member(name).is_some_and(|m| m.synthesized)
    }

    /// Every member name referenced by attached configuration.
    pub(crate) fn referenced_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.member_configs
            .iter()
            .map(|(n, _)| *n)
            .chain(self.serializers.iter().map(|(n, _)| *n))
            .chain(self.deserializers.iter().map(|(n, _)| *n))
            .chain(self.delimiters.iter().map(|(n, _)| *n))
            .chain(self.synthesized.iter().copied())
    }
}

fn lookup<'a, V>(entries: &'a [(&'static str, V)], name: &str) -> Option<&'a V> {
    entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
}
