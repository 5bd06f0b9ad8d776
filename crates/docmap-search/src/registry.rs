//! Name to collection registry.
//!
//! Each collection lives in its own directory under the index root. The
//! registry creates collections on first use and hands out shared
//! references afterwards.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use tracing::{info, warn};

use crate::collection::Collection;
use crate::config::Settings;
use crate::error::SearchError;
use crate::index::{index_exists, CollectionIndexConfig};

/// Registry of the collections under one index root.
pub struct Registry {
    settings: Settings,
    root: PathBuf,
    collections: DashMap<String, Arc<Collection>>,
}

impl Registry {
    pub fn new(settings: Settings) -> Self {
        let root = settings.expanded_index_root();
        Self {
            settings,
            root,
            collections: DashMap::new(),
        }
    }

    /// Registry rooted at `root` with default settings otherwise.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::new(Settings::with_index_root(root))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    /// Directory of a collection.
    pub fn collection_path(&self, name: &str) -> Result<PathBuf, SearchError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// The collection named `name`, created on first use.
    pub fn of(&self, name: &str) -> Result<Arc<Collection>, SearchError> {
        if let Some(existing) = self.collections.get(name) {
            return Ok(Arc::clone(&existing));
        }

        let path = self.collection_path(name)?;
        let config = CollectionIndexConfig::new(path).with_memory_mb(self.settings.writer_memory_mb);
        let entry = self
            .collections
            .entry(name.to_string())
            .or_try_insert_with(|| Collection::open(name, config).map(Arc::new))?;
        Ok(Arc::clone(&entry))
    }

    /// The collection named `name` if it is registered or exists on disk.
    pub fn get(&self, name: &str) -> Result<Arc<Collection>, SearchError> {
        if let Some(existing) = self.collections.get(name) {
            return Ok(Arc::clone(&existing));
        }
        if index_exists(&self.collection_path(name)?) {
            return self.of(name);
        }
        Err(SearchError::CollectionNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    /// Registered collection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.collections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Close every registered collection. Returns the first error after
    /// attempting all of them.
    pub fn close_all(&self) -> Result<(), SearchError> {
        let mut first_error = None;
        for entry in self.collections.iter() {
            if let Err(e) = entry.value().close() {
                warn!(collection = %entry.key(), error = %e, "Failed to close collection");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Close and forget every collection. Data on disk is kept.
    pub fn reset(&self) -> Result<(), SearchError> {
        let result = self.close_all();
        self.collections.clear();
        info!(root = ?self.root, "Collection registry reset");
        result
    }
}

/// Collection names must be usable as a single directory name.
pub fn validate_name(name: &str) -> Result<(), SearchError> {
    let invalid = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(SearchError::InvalidCollectionName(name.to_string()));
    }
    Ok(())
}

/// The process-wide registry, created from [`Settings::load`] on first use.
pub fn global_registry() -> Arc<Registry> {
    Arc::clone(GLOBAL_REGISTRY.get_or_init(|| {
        let settings = Settings::load(None).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to load settings, using defaults");
            Settings::default()
        });
        Arc::new(Registry::new(settings))
    }))
}

/// Install the process-wide registry before first use.
///
/// Returns false if it was already initialised.
pub fn init_global_registry(registry: Arc<Registry>) -> bool {
    GLOBAL_REGISTRY.set(registry).is_ok()
}

static GLOBAL_REGISTRY: OnceLock<Arc<Registry>> = OnceLock::new();

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use docmap_mapper::Document;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Registry) {
        let temp_dir = TempDir::new().unwrap();
        let registry = Registry::with_root(temp_dir.path());
        (temp_dir, registry)
    }

    #[test]
    fn test_of_creates_once() {
        let (temp_dir, registry) = setup();
        let first = registry.of("people").unwrap();
        let second = registry.of("people").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(temp_dir.path().join("people").join("meta.json").exists());
        assert_eq!(registry.names(), vec!["people"]);
    }

    #[test]
    fn test_get_unknown_collection() {
        let (_temp_dir, registry) = setup();
        let err = registry.get("nobody").err().unwrap();
        assert!(matches!(err, SearchError::CollectionNotFound(name) if name == "nobody"));
        assert!(!registry.contains("nobody"));
    }

    #[test]
    fn test_get_finds_collection_on_disk() {
        let (temp_dir, registry) = setup();
        let mut doc = Document::new();
        doc.add_text("Id", "1");
        registry.of("people").unwrap().write([doc]).unwrap();
        registry.reset().unwrap();
        assert!(registry.names().is_empty());

        let reopened = Registry::with_root(temp_dir.path());
        let people = reopened.get("people").unwrap();
        let hits = people.search(|s| s.find(&Filter::All, 10)).unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_invalid_names() {
        let (_temp_dir, registry) = setup();
        for name in ["", ".hidden", "a/b", "a\\b", ".."] {
            let err = registry.of(name).err().unwrap();
            assert!(
                matches!(err, SearchError::InvalidCollectionName(_)),
                "{name:?} accepted"
            );
        }
    }

    #[test]
    fn test_collections_are_independent() {
        let (_temp_dir, registry) = setup();
        let mut doc = Document::new();
        doc.add_text("Id", "1");
        registry.of("a").unwrap().write([doc]).unwrap();

        let b = registry.of("b").unwrap();
        assert!(b.search(|s| s.find(&Filter::All, 10)).unwrap().is_empty());
        assert_eq!(registry.names(), vec!["a", "b"]);
    }

    #[test]
    fn test_concurrent_of_returns_same_collection() {
        let (_temp_dir, registry) = setup();
        let collections: Vec<Arc<Collection>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.of("shared").unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for c in &collections {
            assert!(Arc::ptr_eq(c, &collections[0]));
        }
    }
}
