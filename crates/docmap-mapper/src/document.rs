//! The engine-neutral document a record is converted to.
//!
//! A document is an ordered list of named text fields, each carrying its own
//! storage and indexing policy. Names may repeat.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Whether a field's value is retrievable from search results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Store {
    #[default]
    Yes,
    No,
    /// Stored; compression is left to the engine
    Compress,
}

impl Store {
    pub fn is_stored(self) -> bool {
        !matches!(self, Store::No)
    }
}

/// How a field is made searchable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum IndexPolicy {
    /// Tokenized, with length norms
    Analyzed,
    /// Tokenized, without length norms
    AnalyzedNoNorms,
    /// Not searchable
    No,
    /// Whole value as a single term, with length norms
    NotAnalyzed,
    /// Whole value as a single term, without length norms
    #[default]
    NotAnalyzedNoNorms,
}

impl IndexPolicy {
    pub fn is_indexed(self) -> bool {
        !matches!(self, IndexPolicy::No)
    }

    pub fn is_analyzed(self) -> bool {
        matches!(self, IndexPolicy::Analyzed | IndexPolicy::AnalyzedNoNorms)
    }

    pub fn has_norms(self) -> bool {
        matches!(self, IndexPolicy::Analyzed | IndexPolicy::NotAnalyzed)
    }
}

/// A single named value of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub value: String,
    pub store: Store,
    pub index: IndexPolicy,
}

impl Field {
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        store: Store,
        index: IndexPolicy,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            store,
            index,
        }
    }
}

/// Ordered collection of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Vec<Field>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            fields: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Append a field with the default policies (stored, exact match without norms).
    pub fn add_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.add(Field::new(name, value, Store::default(), IndexPolicy::default()));
    }

    /// Value of the first field with this exact name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    /// Values of every field with this exact name, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// Distinct field names.
    pub fn field_names(&self) -> BTreeSet<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Field> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<Field> for Document {
    fn from_iter<I: IntoIterator<Item = Field>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Document {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<'a> IntoIterator for &'a Document {
    type Item = &'a Field;
    type IntoIter = std::slice::Iter<'a, Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
