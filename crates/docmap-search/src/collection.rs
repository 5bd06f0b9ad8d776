//! Per-collection coordination of the shared writer and searcher.
//!
//! A collection holds at most one writer and one searcher, both opened on
//! demand. A mutex guards the decisions to open, refresh and close them;
//! caller work runs outside the lock while atomic counters track how many
//! searches and writes are in flight.
//!
//! - The writer is shared by concurrent writes and committed by the last one
//!   to finish, which also closes it.
//! - The searcher is replaced by a fresh one only when a newer commit exists
//!   and no search is running on it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use docmap_mapper::Document;
use tracing::{debug, warn};

use crate::error::SearchError;
use crate::index::{CollectionIndex, CollectionIndexConfig, Snapshot};
use crate::searcher::CollectionSearcher;
use crate::writer::{CollectionWriter, MatchKey};

/// Which handles a collection currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionState {
    Cold,
    Reading,
    Writing,
    ReadWrite,
}

#[derive(Default)]
struct Handles {
    writer: Option<Arc<CollectionWriter>>,
    searcher: Option<Arc<CollectionSearcher>>,
}

/// Decrements an in-flight counter when dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// One write reference to the shared writer.
///
/// Dropping an acquired lease releases the reference, so a write that fails
/// or unwinds still lets the last writer commit and close.
struct WriteLease<'a> {
    collection: &'a Collection,
    operation: &'static str,
    counted: bool,
}

impl<'a> WriteLease<'a> {
    fn new(collection: &'a Collection, operation: &'static str) -> Self {
        Self {
            collection,
            operation,
            counted: false,
        }
    }

    /// Open the writer if needed and count this write against it.
    fn acquire(&mut self) -> Result<Arc<CollectionWriter>, SearchError> {
        let mut handles = self.collection.handles();
        let writer = match &handles.writer {
            Some(writer) => Arc::clone(writer),
            None => {
                let writer = Arc::new(self.collection.index.writer()?);
                handles.writer = Some(Arc::clone(&writer));
                writer
            }
        };
        self.collection.active_writes.fetch_add(1, Ordering::AcqRel);
        self.counted = true;
        Ok(writer)
    }

    fn release(mut self) -> Result<(), SearchError> {
        if !std::mem::take(&mut self.counted) {
            return Ok(());
        }
        self.collection.release_writer(self.operation)
    }
}

impl Drop for WriteLease<'_> {
    fn drop(&mut self) {
        if !std::mem::take(&mut self.counted) {
            return;
        }
        if let Err(err) = self.collection.release_writer(self.operation) {
            warn!(
                collection = %self.collection.name,
                operation = self.operation,
                error = %err,
                "Failed to release writer while unwinding"
            );
        }
    }
}

/// One named collection and its engine handles.
pub struct Collection {
    name: String,
    index: CollectionIndex,
    handles: Mutex<Handles>,
    active_searches: AtomicUsize,
    active_writes: AtomicUsize,
}

impl Collection {
    /// Open the collection's index, creating it if needed. No handles are opened.
    pub fn open(name: impl Into<String>, config: CollectionIndexConfig) -> Result<Self, SearchError> {
        let name = name.into();
        let index = CollectionIndex::open_or_create(config)?;
        debug!(collection = %name, "Opened collection");
        Ok(Self {
            name,
            index,
            handles: Mutex::new(Handles::default()),
            active_searches: AtomicUsize::new(0),
            active_writes: AtomicUsize::new(0),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &CollectionIndex {
        &self.index
    }

    fn handles(&self) -> MutexGuard<'_, Handles> {
        self.handles.lock().unwrap_or_else(|poisoned| {
            warn!(collection = %self.name, "Collection lock poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Run `body` against a searcher on the latest snapshot the collection
    /// could switch to.
    pub fn search<R, F>(&self, body: F) -> Result<R, SearchError>
    where
        F: FnOnce(&CollectionSearcher) -> Result<R, SearchError>,
    {
        let (searcher, _in_flight) = {
            let mut handles = self.handles();

            if let Some(current) = &handles.searcher {
                if self.active_searches.load(Ordering::Acquire) == 0 {
                    let latest = self.index.latest_snapshot()?;
                    if !current.is_current_with(latest) {
                        debug!(
                            collection = %self.name,
                            from = current.snapshot().opstamp(),
                            to = latest.opstamp(),
                            "Refreshing stale searcher"
                        );
                        handles.searcher = None;
                    }
                }
            }

            let searcher = match &handles.searcher {
                Some(searcher) => Arc::clone(searcher),
                None => {
                    let searcher = Arc::new(self.index.searcher()?);
                    handles.searcher = Some(Arc::clone(&searcher));
                    searcher
                }
            };
            (searcher, InFlight::enter(&self.active_searches))
        };

        body(&searcher)
    }

    /// Append documents. Returns the number written.
    pub fn write<I>(&self, documents: I) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = Document>,
    {
        self.with_writer("write", |writer| {
            let mut written = 0;
            for document in documents {
                writer.append(&document)?;
                written += 1;
            }
            Ok(written)
        })
    }

    /// Delete every document of the collection.
    pub fn delete_all(&self) -> Result<(), SearchError> {
        self.with_writer("delete_all", CollectionWriter::delete_all)
    }

    /// Replace the documents matching each document's key. Documents without
    /// a key are appended. Returns the number written.
    pub fn update<I, K>(&self, documents: I, key: K) -> Result<usize, SearchError>
    where
        I: IntoIterator<Item = Document>,
        K: Fn(&Document) -> Option<MatchKey>,
    {
        self.with_writer("update", |writer| {
            let mut written = 0;
            for document in documents {
                match key(&document) {
                    Some(match_key) => writer.replace(&match_key, &document)?,
                    None => writer.append(&document)?,
                }
                written += 1;
            }
            Ok(written)
        })
    }

    /// Run `body` against the shared writer.
    ///
    /// The lease must be declared before the writer handle: unwinding drops
    /// the handle first, leaving the lease the only reference to release.
    fn with_writer<R, F>(&self, operation: &'static str, body: F) -> Result<R, SearchError>
    where
        F: FnOnce(&CollectionWriter) -> Result<R, SearchError>,
    {
        let mut lease = WriteLease::new(self, operation);
        let writer = lease.acquire()?;

        let result = body(&writer);
        drop(writer);

        match (result, lease.release()) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(release_err)) => {
                warn!(
                    collection = %self.name,
                    operation,
                    error = %release_err,
                    "Failed to release writer after failed write"
                );
                Err(err)
            }
        }
    }

    /// Drop one write reference; the last one commits and closes the writer.
    fn release_writer(&self, operation: &'static str) -> Result<(), SearchError> {
        let mut handles = self.handles();
        if self.active_writes.fetch_sub(1, Ordering::AcqRel) != 1 {
            return Ok(());
        }

        let Some(writer) = handles.writer.take() else {
            return Ok(());
        };
        match Arc::try_unwrap(writer) {
            Ok(writer) => {
                let snapshot = writer.close()?;
                debug!(
                    collection = %self.name,
                    operation,
                    opstamp = snapshot.opstamp(),
                    "Last writer released, committed"
                );
            }
            Err(shared) => {
                warn!(collection = %self.name, "Writer still referenced, leaving it open");
                handles.writer = Some(shared);
            }
        }
        Ok(())
    }

    /// Close every handle. Call only while no search or write is running.
    pub fn close(&self) -> Result<(), SearchError> {
        let mut handles = self.handles();
        handles.searcher = None;
        if let Some(writer) = handles.writer.take() {
            match Arc::try_unwrap(writer) {
                Ok(writer) => {
                    writer.close()?;
                }
                Err(_) => {
                    warn!(collection = %self.name, "Closing collection with a write in flight");
                }
            }
        }
        debug!(collection = %self.name, "Closed collection handles");
        Ok(())
    }

    pub fn latest_snapshot(&self) -> Result<Snapshot, SearchError> {
        self.index.latest_snapshot()
    }

    pub fn active_searches(&self) -> usize {
        self.active_searches.load(Ordering::Acquire)
    }

    pub fn active_writes(&self) -> usize {
        self.active_writes.load(Ordering::Acquire)
    }

    pub fn has_writer(&self) -> bool {
        self.handles().writer.is_some()
    }

    pub fn has_searcher(&self) -> bool {
        self.handles().searcher.is_some()
    }

    pub fn state(&self) -> CollectionState {
        let handles = self.handles();
        match (handles.searcher.is_some(), handles.writer.is_some()) {
            (false, false) => CollectionState::Cold,
            (true, false) => CollectionState::Reading,
            (false, true) => CollectionState::Writing,
            (true, true) => CollectionState::ReadWrite,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::Barrier;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Collection) {
        let temp_dir = TempDir::new().unwrap();
        let config = CollectionIndexConfig::new(temp_dir.path().join("notes"));
        let collection = Collection::open("notes", config).unwrap();
        (temp_dir, collection)
    }

    fn note(id: usize) -> Document {
        let mut doc = Document::new();
        doc.add_text("Id", id.to_string());
        doc
    }

    fn count(collection: &Collection) -> usize {
        collection
            .search(|s| s.find(&Filter::All, 10_000))
            .unwrap()
            .len()
    }

    #[test]
    fn test_starts_cold() {
        let (_temp_dir, collection) = setup();
        assert_eq!(collection.state(), CollectionState::Cold);
        assert_eq!(collection.name(), "notes");
    }

    #[test]
    fn test_write_commits_and_closes_writer() {
        let (_temp_dir, collection) = setup();
        assert_eq!(collection.write((0..3).map(note)).unwrap(), 3);

        assert!(!collection.has_writer());
        assert_eq!(collection.active_writes(), 0);
        assert_eq!(count(&collection), 3);
        assert_eq!(collection.state(), CollectionState::Reading);
    }

    #[test]
    fn test_search_sees_later_commits() {
        let (_temp_dir, collection) = setup();
        collection.write([note(1)]).unwrap();
        assert_eq!(count(&collection), 1);

        collection.write([note(2)]).unwrap();
        assert_eq!(count(&collection), 2);
        assert_eq!(collection.active_searches(), 0);
    }

    #[test]
    fn test_searcher_reused_while_current() {
        let (_temp_dir, collection) = setup();
        collection.write([note(1)]).unwrap();

        let first = collection.search(|s| Ok(s.snapshot())).unwrap();
        let second = collection.search(|s| Ok(s.snapshot())).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, collection.latest_snapshot().unwrap());
    }

    #[test]
    fn test_delete_all_counts_as_write() {
        let (_temp_dir, collection) = setup();
        collection.write((0..5).map(note)).unwrap();
        collection.delete_all().unwrap();

        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());
        assert_eq!(count(&collection), 0);
    }

    #[test]
    fn test_update_replaces_by_key() {
        let (_temp_dir, collection) = setup();
        collection.write((0..3).map(note)).unwrap();

        let mut changed = note(1);
        changed.add_text("Flag", "set");
        let written = collection
            .update([changed, note(7)], |d| MatchKey::from_document("Id", d))
            .unwrap();
        assert_eq!(written, 2);

        let flagged = collection
            .search(|s| s.find(&Filter::term("Flag", "set"), 10))
            .unwrap();
        assert_eq!(flagged.len(), 1);
        assert_eq!(count(&collection), 4);
    }

    #[test]
    fn test_failed_body_still_releases_writer() {
        let (_temp_dir, collection) = setup();
        let result: Result<(), SearchError> = collection.with_writer("test", |writer| {
            writer.append(&note(1))?;
            Err(SearchError::Settings("boom".into()))
        });
        assert!(matches!(result, Err(SearchError::Settings(_))));
        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());

        collection.write([note(2)]).unwrap();
        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());
        assert_eq!(count(&collection), 2);
    }

    #[test]
    fn test_panicking_key_still_releases_writer() {
        let (_temp_dir, collection) = setup();
        collection.write([note(1)]).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            collection.update([note(1)], |_| -> Option<MatchKey> { panic!("key lookup failed") })
        }));
        assert!(outcome.is_err());
        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());

        collection.write([note(2)]).unwrap();
        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());
        assert_eq!(count(&collection), 2);
        let found = collection
            .search(|s| s.find(&Filter::term("Id", "2"), 10))
            .unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_panic_while_another_write_holds_writer() {
        let (_temp_dir, collection) = setup();

        let outcome = collection.with_writer("outer", |writer| {
            writer.append(&note(1))?;
            let inner = panic::catch_unwind(AssertUnwindSafe(|| {
                collection.with_writer("inner", |_| -> Result<(), SearchError> {
                    panic!("inner write failed")
                })
            }));
            assert!(inner.is_err());
            Ok(collection.active_writes())
        });
        assert_eq!(outcome.unwrap(), 1);
        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());
        assert_eq!(count(&collection), 1);
    }

    #[test]
    fn test_search_counter_tracks_body() {
        let (_temp_dir, collection) = setup();
        let inside = collection
            .search(|_| Ok(collection.active_searches()))
            .unwrap();
        assert_eq!(inside, 1);
        assert_eq!(collection.active_searches(), 0);
    }

    #[test]
    fn test_concurrent_writes_share_one_writer() {
        let (_temp_dir, collection) = setup();
        let barrier = Barrier::new(8);

        std::thread::scope(|scope| {
            for t in 0..8 {
                let collection = &collection;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    collection
                        .write((0..25).map(|i| note(t * 100 + i)))
                        .unwrap();
                });
            }
        });

        assert_eq!(collection.active_writes(), 0);
        assert!(!collection.has_writer());
        assert_eq!(count(&collection), 200);
    }

    #[test]
    fn test_concurrent_searches_and_writes() {
        let (_temp_dir, collection) = setup();
        collection.write([note(0)]).unwrap();

        std::thread::scope(|scope| {
            for t in 0..4 {
                let collection = &collection;
                scope.spawn(move || {
                    for i in 0..10 {
                        collection.write([note(1000 + t * 10 + i)]).unwrap();
                    }
                });
                scope.spawn(move || {
                    for _ in 0..10 {
                        assert!(count(collection) >= 1);
                    }
                });
            }
        });

        assert_eq!(collection.active_searches(), 0);
        assert_eq!(collection.active_writes(), 0);
        assert_eq!(count(&collection), 41);
    }

    #[test]
    fn test_close_drops_handles() {
        let (_temp_dir, collection) = setup();
        collection.write([note(1)]).unwrap();
        count(&collection);
        collection.close().unwrap();
        assert_eq!(collection.state(), CollectionState::Cold);
        assert_eq!(count(&collection), 1);
    }
}
