//! Searcher pinned to one committed snapshot of a collection.
//!
//! Results are ranked by BM25. A searcher never reloads; a stale searcher is
//! dropped and a new one opened.

use std::collections::BTreeSet;

use docmap_mapper::Document;
use tantivy::collector::TopDocs;
use tantivy::{Index, IndexReader, ReloadPolicy, Searcher};
use tracing::debug;

use crate::document::from_engine_document;
use crate::error::SearchError;
use crate::filter::Filter;
use crate::index::{CollectionIndex, Snapshot};
use crate::schema::CollectionSchema;

/// Read handle over one snapshot.
pub struct CollectionSearcher {
    // Keeps the snapshot's segments alive
    _reader: IndexReader,
    searcher: Searcher,
    index: Index,
    schema: CollectionSchema,
    snapshot: Snapshot,
}

impl CollectionSearcher {
    /// Open a searcher on the latest committed snapshot.
    pub fn open(index: &CollectionIndex) -> Result<Self, SearchError> {
        // Read the snapshot first; a commit landing in between only makes
        // this searcher look older than it is.
        let snapshot = index.latest_snapshot()?;
        let reader = index
            .index()
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        let searcher = reader.searcher();

        debug!(opstamp = snapshot.opstamp(), "Opened collection searcher");

        Ok(Self {
            _reader: reader,
            searcher,
            index: index.index().clone(),
            schema: index.schema().clone(),
            snapshot,
        })
    }

    pub fn snapshot(&self) -> Snapshot {
        self.snapshot
    }

    /// True when no commit happened after this searcher's snapshot.
    pub fn is_current_with(&self, latest: Snapshot) -> bool {
        self.snapshot >= latest
    }

    /// Run a filter and return up to `limit` documents, best first.
    pub fn find(&self, filter: &Filter, limit: usize) -> Result<Vec<Document>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let query = filter.to_query(&self.schema, &self.index)?;
        let top_docs = self.searcher.search(&query, &TopDocs::with_limit(limit))?;

        let mut results = Vec::with_capacity(top_docs.len());
        for (_score, doc_address) in top_docs {
            let doc: tantivy::TantivyDocument = self.searcher.doc(doc_address)?;
            results.push(from_engine_document(&self.schema, &doc)?);
        }

        debug!(filter = ?filter, results = results.len(), "Collection search complete");
        Ok(results)
    }

    /// Every logical field name present in this snapshot, sorted.
    pub fn live_field_names(&self) -> Result<Vec<String>, SearchError> {
        let mut names = BTreeSet::new();
        for segment_reader in self.searcher.segment_readers() {
            let inverted_index = segment_reader.inverted_index(self.schema.names)?;
            let mut terms = inverted_index.terms().stream()?;
            while terms.advance() {
                if let Ok(name) = std::str::from_utf8(terms.key()) {
                    names.insert(name.to_string());
                }
            }
        }
        Ok(names.into_iter().collect())
    }

    /// Get the number of live documents.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }
}
