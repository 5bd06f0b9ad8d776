//! Document to record conversion.
//!
//! A deserializer is compiled against the set of field names the collection
//! currently knows. Each plan entry is bound to a known name, case-sensitive
//! first and then case-insensitive. Entries with no known name are not bound;
//! a later document that carries one of them is reported as schema drift.

use std::collections::HashSet;

use tracing::debug;

use crate::codec::{self, CodecError};
use crate::descriptor::{ParsePolicy, Setter, TypeDescriptor};
use crate::document::Document;
use crate::error::{ConfigError, MapError};
use crate::plan::{FieldPlan, FieldPlanEntry};
use crate::value::{Value, ValueType};

type DeserializeStep<T> = Box<dyn Fn(&mut T, &Document) -> Result<(), MapError> + Send + Sync>;

/// Compiled document-to-record function for one record type and schema.
pub struct Deserializer<T> {
    type_name: &'static str,
    constructor: fn() -> T,
    steps: Vec<DeserializeStep<T>>,
    bound: Vec<String>,
    /// Lowercased logical names of plan entries that found no known field
    unbound: HashSet<String>,
}

impl<T> Deserializer<T> {
    /// Materialize a record. Members without a usable value keep the value
    /// the constructor gave them.
    pub fn deserialize(&self, document: &Document) -> Result<T, MapError> {
        self.check_drift(document)?;

        let mut record = (self.constructor)();
        for step in &self.steps {
            step(&mut record, document)?;
        }
        Ok(record)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Document field names this deserializer reads.
    pub fn bound_fields(&self) -> &[String] {
        &self.bound
    }

    fn check_drift(&self, document: &Document) -> Result<(), MapError> {
        if self.unbound.is_empty() {
            return Ok(());
        }
        for field in document {
            if self.unbound.contains(&field.name.to_lowercase()) {
                return Err(MapError::SchemaDrift {
                    type_name: self.type_name,
                    field: field.name.clone(),
                });
            }
        }
        Ok(())
    }
}

impl<T> std::fmt::Debug for Deserializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deserializer")
            .field("type_name", &self.type_name)
            .field("bound", &self.bound)
            .field("unbound", &self.unbound)
            .finish()
    }
}

/// Pick the known field a logical name binds to.
pub fn resolve_field_name<'a>(logical_name: &str, known: &'a [String]) -> Option<&'a str> {
    if let Some(exact) = known.iter().find(|k| k.as_str() == logical_name) {
        return Some(exact.as_str());
    }
    let lowered = logical_name.to_lowercase();
    known
        .iter()
        .find(|k| k.to_lowercase() == lowered)
        .map(String::as_str)
}

/// Compile the deserializer for a record type against the known field names.
pub fn compile_deserializer<T: 'static>(
    descriptor: &TypeDescriptor<T>,
    plan: &FieldPlan,
    known_fields: &[String],
) -> Result<Deserializer<T>, ConfigError> {
    let type_name = descriptor.type_name();
    let constructor = descriptor
        .constructor_fn()
        .ok_or(ConfigError::MissingConstructor { type_name })?;
    let policy = descriptor.type_config().parse_policy;

    let mut steps: Vec<DeserializeStep<T>> = Vec::with_capacity(plan.len());
    let mut bound = Vec::new();
    let mut unbound = HashSet::new();

    for entry in plan.active() {
        let Some(field) = resolve_field_name(&entry.logical_name, known_fields) else {
            unbound.insert(entry.logical_name.to_lowercase());
            continue;
        };
        let field = field.to_string();

        if let Some(custom) = descriptor.custom_deserializer(entry.source_member) {
            let custom = custom.clone();
            let name = field.clone();
            steps.push(Box::new(move |record, doc| {
                if let Some(raw) = doc.get(&name) {
                    custom(record, raw);
                }
                Ok(())
            }));
            bound.push(field);
            continue;
        }

        let Some(accessor) = descriptor
            .member_at(entry.member_index)
            .and_then(|m| m.accessor())
        else {
            // Opaque member with only a custom serializer
            continue;
        };

        let step = if let Some(delimiter) = entry.delimiter.clone() {
            delimited_step(type_name, entry, field.clone(), delimiter, accessor.set.clone(), policy)?
        } else if entry.value_type.is_primitive() {
            primitive_step(type_name, entry, field.clone(), accessor.set.clone(), policy)
        } else {
            return Err(ConfigError::UnsupportedType {
                type_name,
                member: entry.source_member.to_string(),
                value_type: entry.value_type.clone(),
            });
        };
        steps.push(step);
        bound.push(field);
    }

    debug!(
        type_name,
        bound = bound.len(),
        unbound = unbound.len(),
        "Compiled deserializer"
    );

    Ok(Deserializer {
        type_name,
        constructor,
        steps,
        bound,
        unbound,
    })
}

fn primitive_step<T: 'static>(
    type_name: &'static str,
    entry: &FieldPlanEntry,
    field: String,
    set: Setter<T>,
    policy: ParsePolicy,
) -> DeserializeStep<T> {
    let value_type = entry.value_type.clone();
    let nullable = entry.nullable;

    Box::new(move |record, doc| {
        let Some(raw) = doc.get(&field) else {
            return Ok(());
        };
        if raw.is_empty() && (nullable || value_type != ValueType::Text) {
            return Ok(());
        }
        match codec::parse_value(&value_type, raw) {
            Ok(Some(value)) => assign(type_name, &field, &set, record, value),
            Ok(None) => {}
            Err(err) => on_parse_failure(type_name, &field, err, policy)?,
        }
        Ok(())
    })
}

fn delimited_step<T: 'static>(
    type_name: &'static str,
    entry: &FieldPlanEntry,
    field: String,
    delimiter: String,
    set: Setter<T>,
    policy: ParsePolicy,
) -> Result<DeserializeStep<T>, ConfigError> {
    let element = match entry.value_type.element() {
        Some(element) if element.is_primitive() => element.clone(),
        Some(element) => {
            return Err(ConfigError::DelimitedElement {
                type_name,
                member: entry.source_member.to_string(),
                element_type: element.clone(),
            })
        }
        None => {
            return Err(ConfigError::DelimitedNotList {
                type_name,
                member: entry.source_member.to_string(),
                value_type: entry.value_type.clone(),
            })
        }
    };

    Ok(Box::new(move |record, doc| {
        let Some(raw) = doc.get(&field) else {
            return Ok(());
        };
        match codec::parse_list(&element, raw, &delimiter) {
            Ok(value) => assign(type_name, &field, &set, record, value),
            Err(err) => on_parse_failure(type_name, &field, err, policy)?,
        }
        Ok(())
    }))
}

fn assign<T>(type_name: &str, field: &str, set: &Setter<T>, record: &mut T, value: Value) {
    if !set(record, value) {
        debug!(type_name, field, "Value shape does not fit member, keeping default");
    }
}

fn on_parse_failure(
    type_name: &'static str,
    field: &str,
    err: CodecError,
    policy: ParsePolicy,
) -> Result<(), MapError> {
    match policy {
        ParsePolicy::Lenient => {
            debug!(
                type_name,
                field,
                value = %err.text,
                expected = %err.expected,
                "Unparseable value, keeping default"
            );
            Ok(())
        }
        ParsePolicy::Strict => Err(MapError::Parse {
            type_name,
            field: field.to_string(),
            value: err.text,
            expected: err.expected,
        }),
    }
}
