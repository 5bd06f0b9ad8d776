//! Collection writer for adding documents to the Tantivy index.
//!
//! Documents are not visible to new searchers until the writer is closed,
//! which commits and waits for merges.

use docmap_mapper::Document;
use tantivy::IndexWriter;
use tracing::{debug, info};

use crate::document::to_engine_document;
use crate::error::SearchError;
use crate::index::Snapshot;
use crate::schema::{logical_term, CollectionSchema};

/// Identifies the documents an update replaces: every document whose
/// `field` holds exactly `value`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchKey {
    pub field: String,
    pub value: String,
}

impl MatchKey {
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Key taken from the first value of `field` in `document`.
    pub fn from_document(field: &str, document: &Document) -> Option<Self> {
        document.get(field).map(|value| Self::new(field, value))
    }
}

/// The single writer of a collection index.
pub struct CollectionWriter {
    writer: IndexWriter,
    schema: CollectionSchema,
}

impl std::fmt::Debug for CollectionWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionWriter")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

impl CollectionWriter {
    pub fn new(writer: IndexWriter, schema: CollectionSchema) -> Self {
        Self { writer, schema }
    }

    /// Add a document.
    pub fn append(&self, document: &Document) -> Result<(), SearchError> {
        let engine_doc = to_engine_document(&self.schema, document)?;
        self.writer.add_document(engine_doc)?;
        Ok(())
    }

    /// Delete every document, including ones added earlier by this writer.
    pub fn delete_all(&self) -> Result<(), SearchError> {
        self.writer.delete_all_documents()?;
        debug!("Deleted all documents");
        Ok(())
    }

    /// Delete the documents matching `key`, then add `document`.
    pub fn replace(&self, key: &MatchKey, document: &Document) -> Result<(), SearchError> {
        for field in self.schema.indexed_fields() {
            self.writer
                .delete_term(logical_term(field, &key.field, &key.value));
        }
        self.append(document)?;
        debug!(field = %key.field, value = %key.value, "Replaced document");
        Ok(())
    }

    /// Commit pending changes.
    pub fn commit(&mut self) -> Result<Snapshot, SearchError> {
        let opstamp = self.writer.commit()?;
        Ok(Snapshot::new(opstamp))
    }

    /// Commit, wait for merges and release the index lock.
    pub fn close(mut self) -> Result<Snapshot, SearchError> {
        let snapshot = self.commit()?;
        self.writer.wait_merging_threads()?;
        info!(opstamp = snapshot.opstamp(), "Closed index writer");
        Ok(snapshot)
    }
}
