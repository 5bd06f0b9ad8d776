//! Record to document conversion.

use crate::codec;
use crate::descriptor::TypeDescriptor;
use crate::document::{Document, Field};
use crate::error::ConfigError;
use crate::plan::FieldPlan;
use crate::value::Value;

type SerializeStep<T> = Box<dyn Fn(&T, &mut Document) + Send + Sync>;

/// Compiled record-to-document function for one record type.
pub struct Serializer<T> {
    type_name: &'static str,
    steps: Vec<SerializeStep<T>>,
}

impl<T> Serializer<T> {
    /// Convert a record. Fields follow the plan order.
    pub fn serialize(&self, record: &T) -> Document {
        let mut document = Document::with_capacity(self.steps.len());
        for step in &self.steps {
            step(record, &mut document);
        }
        document
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Number of fields each document receives.
    pub fn field_count(&self) -> usize {
        self.steps.len()
    }
}

impl<T> std::fmt::Debug for Serializer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Serializer")
            .field("type_name", &self.type_name)
            .field("fields", &self.steps.len())
            .finish()
    }
}

/// Compile the serializer for a record type from its field plan.
pub fn compile_serializer<T: 'static>(
    descriptor: &TypeDescriptor<T>,
    plan: &FieldPlan,
) -> Result<Serializer<T>, ConfigError> {
    let type_name = descriptor.type_name();
    let mut steps: Vec<SerializeStep<T>> = Vec::with_capacity(plan.len());

    for entry in plan.active() {
        let name = entry.logical_name.clone();
        let store = entry.store;
        let index = entry.index;

        if let Some(custom) = descriptor.custom_serializer(entry.source_member) {
            let custom = custom.clone();
            steps.push(Box::new(move |record, doc| {
                doc.add(Field::new(name.clone(), custom(record), store, index));
            }));
            continue;
        }

        let Some(accessor) = descriptor
            .member_at(entry.member_index)
            .and_then(|m| m.accessor())
        else {
            // Opaque member with only a custom deserializer
            continue;
        };
        let get = accessor.get.clone();

        if let Some(delimiter) = entry.delimiter.clone() {
            steps.push(Box::new(move |record, doc| {
                let text = match get(record) {
                    Value::List(items) => codec::format_list(&items, &delimiter),
                    other => codec::format_value(&other),
                };
                doc.add(Field::new(name.clone(), text, store, index));
            }));
            continue;
        }

        if !entry.value_type.is_primitive() {
            return Err(ConfigError::UnsupportedType {
                type_name,
                member: entry.source_member.to_string(),
                value_type: entry.value_type.clone(),
            });
        }

        steps.push(Box::new(move |record, doc| {
            let text = codec::format_value(&get(record));
            doc.add(Field::new(name.clone(), text, store, index));
        }));
    }

    Ok(Serializer { type_name, steps })
}
