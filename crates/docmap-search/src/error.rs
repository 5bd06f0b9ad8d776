//! Search error types.

use docmap_mapper::{ConfigError, MapError};
use thiserror::Error;

/// Errors that can occur during collection operations.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Tantivy index error
    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    /// Index directory could not be opened
    #[error("Cannot open index directory: {0}")]
    OpenDirectory(#[from] tantivy::directory::error::OpenDirectoryError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document source could not be decoded
    #[error("Stored document error: {0}")]
    Json(#[from] serde_json::Error),

    /// Record type mapping configuration error
    #[error("Mapping configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Record materialization error
    #[error("Mapping error: {0}")]
    Map(#[from] MapError),

    /// Collection not registered and not on disk
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    /// Collection name cannot be used as a directory name
    #[error("Invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// Index on disk does not have the collection layout
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Index is locked (another writer has it open)
    #[error("Index is locked: {0}")]
    IndexLocked(String),

    /// Settings could not be loaded or are invalid
    #[error("Settings error: {0}")]
    Settings(String),
}
