//! Tantivy layout of a collection.
//!
//! Logical document fields are dynamic, so every collection shares one fixed
//! schema:
//! - `_source`: STORED text, JSON list of the stored logical fields
//! - `_names`: STRING, every logical field name a document carries
//! - `_analyzed` / `_analyzed_nn`: JSON, default tokenizer, positions
//! - `_exact` / `_exact_nn`: JSON, raw tokenizer
//!
//! The `_nn` variants have field norms disabled. A logical field is indexed
//! under its own name as a JSON path inside the field its policy selects.

use docmap_mapper::IndexPolicy;
use tantivy::schema::{
    Field, IndexRecordOption, JsonObjectOptions, Schema, TextFieldIndexing, STORED, STRING,
};
use tantivy::Term;

use crate::SearchError;

pub const SOURCE_FIELD: &str = "_source";
pub const NAMES_FIELD: &str = "_names";
pub const ANALYZED_FIELD: &str = "_analyzed";
pub const ANALYZED_NO_NORMS_FIELD: &str = "_analyzed_nn";
pub const EXACT_FIELD: &str = "_exact";
pub const EXACT_NO_NORMS_FIELD: &str = "_exact_nn";

/// Tokenizer used for analyzed fields and text filters.
pub const ANALYZED_TOKENIZER: &str = "default";

/// Schema field handles for efficient access
#[derive(Debug, Clone)]
pub struct CollectionSchema {
    schema: Schema,
    pub source: Field,
    pub names: Field,
    pub analyzed: Field,
    pub analyzed_no_norms: Field,
    pub exact: Field,
    pub exact_no_norms: Field,
}

impl CollectionSchema {
    /// Get the underlying Tantivy schema
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Create a CollectionSchema from an existing Tantivy Schema
    pub fn from_schema(schema: Schema) -> Result<Self, SearchError> {
        let get = |name: &str| {
            schema
                .get_field(name)
                .map_err(|_| SearchError::SchemaMismatch(format!("missing {name} field")))
        };

        Ok(Self {
            source: get(SOURCE_FIELD)?,
            names: get(NAMES_FIELD)?,
            analyzed: get(ANALYZED_FIELD)?,
            analyzed_no_norms: get(ANALYZED_NO_NORMS_FIELD)?,
            exact: get(EXACT_FIELD)?,
            exact_no_norms: get(EXACT_NO_NORMS_FIELD)?,
            schema,
        })
    }

    /// Engine field a policy indexes into. `None` for [`IndexPolicy::No`].
    pub fn field_for(&self, policy: IndexPolicy) -> Option<Field> {
        match policy {
            IndexPolicy::Analyzed => Some(self.analyzed),
            IndexPolicy::AnalyzedNoNorms => Some(self.analyzed_no_norms),
            IndexPolicy::NotAnalyzed => Some(self.exact),
            IndexPolicy::NotAnalyzedNoNorms => Some(self.exact_no_norms),
            IndexPolicy::No => None,
        }
    }

    /// Every engine field holding indexed logical values.
    pub fn indexed_fields(&self) -> [Field; 4] {
        [
            self.analyzed,
            self.analyzed_no_norms,
            self.exact,
            self.exact_no_norms,
        ]
    }

    pub fn analyzed_fields(&self) -> [Field; 2] {
        [self.analyzed, self.analyzed_no_norms]
    }
}

/// Escape a logical name for use as a single JSON path segment.
pub fn json_path(logical_name: &str) -> String {
    logical_name.replace('\\', "\\\\").replace('.', "\\.")
}

/// Term matching `value` under a logical field inside a JSON engine field.
pub fn logical_term(field: Field, logical_name: &str, value: &str) -> Term {
    let mut term = Term::from_field_json_path(field, &json_path(logical_name), false);
    term.append_type_and_str(value);
    term
}

fn json_options(tokenizer: &str, record: IndexRecordOption, norms: bool) -> JsonObjectOptions {
    JsonObjectOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(tokenizer)
            .set_index_option(record)
            .set_fieldnorms(norms),
    )
}

/// Build the collection schema.
pub fn build_collection_schema() -> CollectionSchema {
    let mut schema_builder = Schema::builder();

    // Stored logical fields, returned with hits
    let source = schema_builder.add_text_field(SOURCE_FIELD, STORED);

    // Field-name dictionary for schema discovery
    let names = schema_builder.add_text_field(NAMES_FIELD, STRING);

    let analyzed = schema_builder.add_json_field(
        ANALYZED_FIELD,
        json_options(ANALYZED_TOKENIZER, IndexRecordOption::WithFreqsAndPositions, true),
    );
    let analyzed_no_norms = schema_builder.add_json_field(
        ANALYZED_NO_NORMS_FIELD,
        json_options(ANALYZED_TOKENIZER, IndexRecordOption::WithFreqsAndPositions, false),
    );
    let exact = schema_builder.add_json_field(
        EXACT_FIELD,
        json_options("raw", IndexRecordOption::WithFreqs, true),
    );
    let exact_no_norms = schema_builder.add_json_field(
        EXACT_NO_NORMS_FIELD,
        json_options("raw", IndexRecordOption::WithFreqs, false),
    );

    let schema = schema_builder.build();

    CollectionSchema {
        schema,
        source,
        names,
        analyzed,
        analyzed_no_norms,
        exact,
        exact_no_norms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_schema() {
        let schema = build_collection_schema();
        assert!(schema.schema().get_field(SOURCE_FIELD).is_ok());
        assert!(schema.schema().get_field(NAMES_FIELD).is_ok());
        for name in [
            ANALYZED_FIELD,
            ANALYZED_NO_NORMS_FIELD,
            EXACT_FIELD,
            EXACT_NO_NORMS_FIELD,
        ] {
            assert!(schema.schema().get_field(name).is_ok(), "missing {name}");
        }
    }

    #[test]
    fn test_from_schema_round_trip() {
        let built = build_collection_schema();
        let reloaded = CollectionSchema::from_schema(built.schema().clone()).unwrap();
        assert_eq!(reloaded.indexed_fields(), built.indexed_fields());
        assert_eq!(reloaded.source, built.source);
    }

    #[test]
    fn test_from_foreign_schema_fails() {
        let mut builder = Schema::builder();
        builder.add_text_field("title", STRING);
        let err = CollectionSchema::from_schema(builder.build()).unwrap_err();
        assert!(matches!(err, SearchError::SchemaMismatch(_)));
    }

    #[test]
    fn test_policy_routing() {
        let schema = build_collection_schema();
        assert_eq!(schema.field_for(IndexPolicy::Analyzed), Some(schema.analyzed));
        assert_eq!(
            schema.field_for(IndexPolicy::NotAnalyzedNoNorms),
            Some(schema.exact_no_norms)
        );
        assert_eq!(schema.field_for(IndexPolicy::No), None);
    }

    #[test]
    fn test_json_path_escapes_dots() {
        assert_eq!(json_path("Name"), "Name");
        assert_eq!(json_path("a.b"), "a\\.b");
    }
}
