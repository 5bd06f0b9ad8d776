//! On-disk index of one collection.
//!
//! Each collection owns a directory holding a Tantivy index with the fixed
//! collection schema.

use std::path::{Path, PathBuf};

use tantivy::directory::MmapDirectory;
use tantivy::{Index, IndexSettings, TantivyError};
use tracing::{debug, info};

use crate::config::MIN_WRITER_MEMORY_MB;
use crate::error::SearchError;
use crate::schema::{build_collection_schema, CollectionSchema};
use crate::searcher::CollectionSearcher;
use crate::writer::CollectionWriter;

/// Writer budget when none is configured, in MB
const DEFAULT_WRITER_MEMORY_MB: usize = 50;

/// Committed state of an index, identified by its commit opstamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Snapshot(u64);

impl Snapshot {
    pub fn new(opstamp: u64) -> Self {
        Self(opstamp)
    }

    pub fn opstamp(self) -> u64 {
        self.0
    }
}

/// Where a collection index lives and how much memory its writer gets.
#[derive(Debug, Clone)]
pub struct CollectionIndexConfig {
    pub index_path: PathBuf,
    /// Writer budget in MB
    pub writer_memory_mb: usize,
}

impl CollectionIndexConfig {
    pub fn new(index_path: impl Into<PathBuf>) -> Self {
        Self {
            index_path: index_path.into(),
            writer_memory_mb: DEFAULT_WRITER_MEMORY_MB,
        }
    }

    pub fn with_memory_mb(mut self, mb: usize) -> Self {
        self.writer_memory_mb = mb;
        self
    }
}

/// A collection's Tantivy index and its resolved schema fields.
pub struct CollectionIndex {
    index: Index,
    schema: CollectionSchema,
    config: CollectionIndexConfig,
}

impl CollectionIndex {
    /// Open the index at the configured path, creating it when absent.
    pub fn open_or_create(config: CollectionIndexConfig) -> Result<Self, SearchError> {
        let index = open_or_create_index(&config.index_path)?;
        let schema = CollectionSchema::from_schema(index.schema())?;

        info!(path = ?config.index_path, "Opened collection index");

        Ok(Self {
            index,
            schema,
            config,
        })
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Open the single writer of this index.
    ///
    /// Fails with [`SearchError::IndexLocked`] while another writer is open.
    pub fn writer(&self) -> Result<CollectionWriter, SearchError> {
        let memory_mb = self.config.writer_memory_mb.max(MIN_WRITER_MEMORY_MB);
        let writer = match self.index.writer(memory_mb * 1024 * 1024) {
            Ok(writer) => writer,
            Err(TantivyError::LockFailure(_, _)) => {
                return Err(SearchError::IndexLocked(
                    self.config.index_path.display().to_string(),
                ))
            }
            Err(e) => return Err(e.into()),
        };
        debug!(memory_mb, path = ?self.config.index_path, "Created index writer");
        Ok(CollectionWriter::new(writer, self.schema.clone()))
    }

    /// Open a searcher pinned to the latest committed snapshot.
    pub fn searcher(&self) -> Result<CollectionSearcher, SearchError> {
        CollectionSearcher::open(self)
    }

    /// The most recent committed snapshot.
    pub fn latest_snapshot(&self) -> Result<Snapshot, SearchError> {
        let metas = self.index.load_metas()?;
        Ok(Snapshot(metas.opstamp))
    }

    pub fn path(&self) -> &Path {
        &self.config.index_path
    }

    pub fn exists(&self) -> bool {
        index_exists(&self.config.index_path)
    }
}

/// True when `path` holds a committed index.
pub fn index_exists(path: &Path) -> bool {
    path.join("meta.json").exists()
}

/// Open the index in `path`, or create the directory and an empty index.
pub fn open_or_create_index(path: &Path) -> Result<Index, SearchError> {
    if index_exists(path) {
        debug!(path = ?path, "Opening existing index");
        let directory = MmapDirectory::open(path)?;
        Ok(Index::open(directory)?)
    } else {
        info!(path = ?path, "Creating new index");
        std::fs::create_dir_all(path)?;
        let directory = MmapDirectory::open(path)?;
        let schema = build_collection_schema();
        let index = Index::create(directory, schema.schema().clone(), IndexSettings::default())?;
        Ok(index)
    }
}
