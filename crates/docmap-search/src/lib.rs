//! # docmap-search
//!
//! Named document collections on embedded Tantivy indexes, and the typed
//! facade that maps records in and out of them.
//!
//! ## Features
//! - One MmapDirectory index per collection under a configurable root
//! - Shared writer per collection, closed by the last concurrent writer
//! - Searchers refreshed lazily when a newer snapshot is committed
//! - Schema discovery from the indexed field names
//! - Compiled conversions cached per record type and collection schema
//!
//! ## Example
//! ```no_run
//! use docmap_mapper::{Record, TypeDescriptor};
//! use docmap_search::{Filter, Mapper, Settings};
//!
//! #[derive(Default)]
//! struct Note {
//!     id: i32,
//!     body: String,
//! }
//!
//! impl Record for Note {
//!     fn descriptor() -> TypeDescriptor<Self> {
//!         TypeDescriptor::new("Note")
//!             .with_default()
//!             .member("Id", |n: &Note| &n.id, |n: &mut Note| &mut n.id)
//!             .member("Body", |n: &Note| &n.body, |n: &mut Note| &mut n.body)
//!     }
//! }
//!
//! let mapper = Mapper::from_settings(Settings::with_index_root("/tmp/notes"));
//! mapper.write("notes", &[Note { id: 1, body: "hello".into() }])?;
//! let notes: Vec<Note> = mapper.query("notes", &Filter::term("Id", "1"), 10)?;
//! # Ok::<(), docmap_search::SearchError>(())
//! ```

pub mod collection;
pub mod config;
pub mod document;
pub mod error;
pub mod facade;
pub mod filter;
pub mod index;
pub mod logging;
pub mod registry;
pub mod schema;
pub mod searcher;
pub mod writer;

pub use collection::{Collection, CollectionState};
pub use config::Settings;
pub use document::{from_engine_document, to_engine_document};
pub use error::SearchError;
pub use facade::{
    delete_all, global_mapper, purge, query, query_dynamic, subscribe_purge, update, write, Mapper,
};
pub use filter::Filter;
pub use index::{open_or_create_index, CollectionIndex, CollectionIndexConfig, Snapshot};
pub use logging::init_tracing;
pub use registry::{global_registry, init_global_registry, Registry};
pub use schema::{build_collection_schema, CollectionSchema};
pub use searcher::CollectionSearcher;
pub use writer::{CollectionWriter, MatchKey};
