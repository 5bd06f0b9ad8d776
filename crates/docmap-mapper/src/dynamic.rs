//! Untyped reads: documents as field-name to value maps.

use std::collections::btree_map;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::document::Document;

/// Field name to first value, with empty values left out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DynamicRecord {
    fields: BTreeMap<String, String>,
}

impl DynamicRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, String> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_inner(self) -> BTreeMap<String, String> {
        self.fields
    }
}

impl<'a> IntoIterator for &'a DynamicRecord {
    type Item = (&'a String, &'a String);
    type IntoIter = btree_map::Iter<'a, String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}

/// Reads the known schema fields of a document into a [`DynamicRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicDeserializer {
    field_names: Vec<String>,
}

impl DynamicDeserializer {
    pub fn compile(known_fields: &[String]) -> Self {
        Self {
            field_names: known_fields.to_vec(),
        }
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn deserialize(&self, document: &Document) -> DynamicRecord {
        let fields = self
            .field_names
            .iter()
            .filter_map(|name| {
                document
                    .get(name)
                    .filter(|value| !value.is_empty())
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();
        DynamicRecord { fields }
    }
}
