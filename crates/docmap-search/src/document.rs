//! Document mapping between logical documents and Tantivy documents.
//!
//! Stored logical fields travel as a JSON list in `_source`. Indexed fields
//! are grouped per policy into one JSON object per engine field; a name that
//! repeats becomes a JSON array.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use docmap_mapper::{Document, Field};
use tantivy::schema::{OwnedValue, Value};
use tantivy::TantivyDocument;

use crate::error::SearchError;
use crate::schema::CollectionSchema;

/// Convert a logical document to a Tantivy document.
pub fn to_engine_document(
    schema: &CollectionSchema,
    document: &Document,
) -> Result<TantivyDocument, SearchError> {
    let mut engine_doc = TantivyDocument::new();

    let stored: Vec<&Field> = document.iter().filter(|f| f.store.is_stored()).collect();
    engine_doc.add_text(schema.source, serde_json::to_string(&stored)?);

    let mut seen = BTreeSet::new();
    let mut objects: BTreeMap<tantivy::schema::Field, BTreeMap<String, OwnedValue>> =
        BTreeMap::new();

    for field in document {
        if seen.insert(field.name.as_str()) {
            engine_doc.add_text(schema.names, &field.name);
        }

        let Some(target) = schema.field_for(field.index) else {
            continue;
        };
        let value = OwnedValue::Str(field.value.clone());
        match objects.entry(target).or_default().entry(field.name.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                OwnedValue::Array(items) => items.push(value),
                existing => {
                    let first = std::mem::replace(existing, OwnedValue::Null);
                    *existing = OwnedValue::Array(vec![first, value]);
                }
            },
        }
    }

    for (target, object) in objects {
        engine_doc.add_object(target, object);
    }

    Ok(engine_doc)
}

/// Rebuild the stored part of a logical document from a search hit.
pub fn from_engine_document(
    schema: &CollectionSchema,
    engine_doc: &TantivyDocument,
) -> Result<Document, SearchError> {
    let source = engine_doc
        .get_first(schema.source)
        .and_then(|v| v.as_str())
        .unwrap_or("[]");
    let fields: Vec<Field> = serde_json::from_str(source)?;
    Ok(fields.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::build_collection_schema;
    use docmap_mapper::{IndexPolicy, Store};

    fn sample() -> Document {
        let mut doc = Document::new();
        doc.add(Field::new("Id", "7", Store::Yes, IndexPolicy::NotAnalyzedNoNorms));
        doc.add(Field::new("Body", "hello world", Store::Yes, IndexPolicy::Analyzed));
        doc.add(Field::new("Secret", "hidden", Store::No, IndexPolicy::NotAnalyzed));
        doc.add(Field::new("Note", "kept", Store::Compress, IndexPolicy::No));
        doc
    }

    #[test]
    fn test_only_stored_fields_come_back() {
        let schema = build_collection_schema();
        let engine_doc = to_engine_document(&schema, &sample()).unwrap();
        let back = from_engine_document(&schema, &engine_doc).unwrap();

        let names: Vec<_> = back.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Id", "Body", "Note"]);
        assert_eq!(back.get("Body"), Some("hello world"));
        assert_eq!(back.get("Note"), Some("kept"));
    }

    #[test]
    fn test_every_name_is_recorded() {
        let schema = build_collection_schema();
        let mut doc = sample();
        doc.add(Field::new("Id", "8", Store::Yes, IndexPolicy::NotAnalyzedNoNorms));
        let engine_doc = to_engine_document(&schema, &doc).unwrap();

        let names: Vec<_> = engine_doc
            .get_all(schema.names)
            .filter_map(|v| v.as_str())
            .collect();
        assert_eq!(names, vec!["Id", "Body", "Secret", "Note"]);
    }

    #[test]
    fn test_missing_source_is_empty() {
        let schema = build_collection_schema();
        let back = from_engine_document(&schema, &TantivyDocument::new()).unwrap();
        assert!(back.is_empty());
    }
}
