//! Typed query and write entry points.
//!
//! A [`Mapper`] ties the collection registry to the conversion cache. Reads
//! compile a deserializer per (record type, live field names); writes
//! compile one serializer per record type. Both are cached.
//!
//! The free functions delegate to a process-wide mapper built from the
//! global registry and cache.

use std::collections::BTreeSet;
use std::sync::{Arc, OnceLock};

use docmap_mapper::{
    build_field_plan, compile_deserializer, compile_serializer, global_cache, init_global_cache,
    ConversionCache, Deserializer, Document, DynamicDeserializer, DynamicRecord, Fingerprint,
    MapError, Record, Serializer, SubscriptionId,
};
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::SearchError;
use crate::filter::Filter;
use crate::registry::{global_registry, Registry};
use crate::writer::MatchKey;

/// Registry plus conversion cache.
pub struct Mapper {
    registry: Arc<Registry>,
    cache: Arc<ConversionCache>,
}

impl Mapper {
    pub fn new(registry: Arc<Registry>, cache: Arc<ConversionCache>) -> Self {
        Self { registry, cache }
    }

    /// A mapper with its own registry and cache.
    pub fn from_settings(settings: Settings) -> Self {
        let cache = Arc::new(ConversionCache::new(settings.cache.clone()));
        Self::new(Arc::new(Registry::new(settings)), cache)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn cache(&self) -> &Arc<ConversionCache> {
        &self.cache
    }

    /// Records matching `filter`, best first, at most `limit`.
    ///
    /// The collection must already exist.
    pub fn query<T: Record>(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<T>, SearchError> {
        let collection = self.registry.get(collection)?;
        collection.search(|searcher| {
            let field_names = searcher.live_field_names()?;
            let fingerprint = Fingerprint::read::<T>(&field_names);
            let deserializer = self.deserializer_for::<T>(&fingerprint, &field_names)?;
            let documents = searcher.find(filter, limit)?;

            match map_documents(&deserializer, &documents) {
                Err(MapError::SchemaDrift { type_name, field }) => {
                    warn!(
                        collection = %collection.name(),
                        type_name,
                        field = %field,
                        "Schema drift, rebuilding deserializer"
                    );
                    self.cache.invalidate(&fingerprint);

                    let mut names: BTreeSet<String> = field_names.iter().cloned().collect();
                    for document in &documents {
                        names.extend(document.field_names().into_iter().map(str::to_string));
                    }
                    let names: Vec<String> = names.into_iter().collect();
                    let rebuilt = self.deserializer_for::<T>(&fingerprint, &names)?;
                    Ok(map_documents(&rebuilt, &documents)?)
                }
                other => Ok(other?),
            }
        })
    }

    /// Untyped view of the records matching `filter`.
    pub fn query_dynamic(
        &self,
        collection: &str,
        filter: &Filter,
        limit: usize,
    ) -> Result<Vec<DynamicRecord>, SearchError> {
        let collection = self.registry.get(collection)?;
        collection.search(|searcher| {
            let field_names = searcher.live_field_names()?;
            let fingerprint = Fingerprint::dynamic(&field_names);
            let deserializer = self
                .cache
                .get_or_build(&fingerprint, || {
                    Ok::<_, SearchError>(DynamicDeserializer::compile(&field_names))
                })?;

            let documents = searcher.find(filter, limit)?;
            Ok(documents.iter().map(|d| deserializer.deserialize(d)).collect())
        })
    }

    /// Append records in one writer session. Returns the number written.
    pub fn write<'a, T: Record>(
        &self,
        collection: &str,
        records: impl IntoIterator<Item = &'a T>,
    ) -> Result<usize, SearchError> {
        let serializer = self.serializer::<T>()?;
        let documents: Vec<Document> = records
            .into_iter()
            .map(|record| serializer.serialize(record))
            .collect();
        debug!(collection, documents = documents.len(), "Writing records");
        self.registry.of(collection)?.write(documents)
    }

    /// Replace the documents whose `key_field` equals each record's value.
    /// Records without a value for `key_field` are appended.
    ///
    /// `key_field` must be a mapped field indexed as a single exact term;
    /// anything else fails with [`docmap_mapper::ConfigError::UnmatchableKey`] before any
    /// document is written.
    pub fn update<'a, T: Record>(
        &self,
        collection: &str,
        records: impl IntoIterator<Item = &'a T>,
        key_field: &str,
    ) -> Result<usize, SearchError> {
        build_field_plan(&T::descriptor())?.key_entry(key_field)?;
        let serializer = self.serializer::<T>()?;
        let documents: Vec<Document> = records
            .into_iter()
            .map(|record| serializer.serialize(record))
            .collect();
        debug!(collection, key_field, documents = documents.len(), "Updating records");
        self.registry
            .of(collection)?
            .update(documents, |document| MatchKey::from_document(key_field, document))
    }

    pub fn delete_all(&self, collection: &str) -> Result<(), SearchError> {
        self.registry.of(collection)?.delete_all()
    }

    /// Drop every compiled function and notify purge subscribers.
    pub fn purge(&self) {
        self.cache.purge();
    }

    pub fn subscribe_purge<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.cache.subscribe(callback)
    }

    pub fn unsubscribe_purge(&self, id: SubscriptionId) -> bool {
        self.cache.unsubscribe(id)
    }

    /// The cached serializer of `T`.
    pub fn serializer<T: Record>(&self) -> Result<Arc<Serializer<T>>, SearchError> {
        let fingerprint = Fingerprint::write::<T>();
        self.cache.get_or_build(&fingerprint, || {
            let descriptor = T::descriptor();
            let plan = build_field_plan(&descriptor)?;
            Ok::<_, SearchError>(compile_serializer(&descriptor, &plan)?)
        })
    }

    /// The cached deserializer of `T` for a collection whose fields are `field_names`.
    pub fn deserializer<T: Record>(
        &self,
        field_names: &[String],
    ) -> Result<Arc<Deserializer<T>>, SearchError> {
        self.deserializer_for(&Fingerprint::read::<T>(field_names), field_names)
    }

    fn deserializer_for<T: Record>(
        &self,
        fingerprint: &Fingerprint,
        field_names: &[String],
    ) -> Result<Arc<Deserializer<T>>, SearchError> {
        self.cache.get_or_build(fingerprint, || {
            let descriptor = T::descriptor();
            let plan = build_field_plan(&descriptor)?;
            Ok::<_, SearchError>(compile_deserializer(&descriptor, &plan, field_names)?)
        })
    }
}

fn map_documents<T>(
    deserializer: &Deserializer<T>,
    documents: &[Document],
) -> Result<Vec<T>, MapError> {
    documents.iter().map(|d| deserializer.deserialize(d)).collect()
}

static GLOBAL_MAPPER: OnceLock<Mapper> = OnceLock::new();

/// The process-wide mapper over [`global_registry`] and the global cache.
pub fn global_mapper() -> &'static Mapper {
    GLOBAL_MAPPER.get_or_init(|| {
        let registry = global_registry();
        init_global_cache(registry.settings().cache.clone());
        Mapper::new(registry, global_cache())
    })
}

/// [`Mapper::query`] on the global mapper.
pub fn query<T: Record>(collection: &str, filter: &Filter, limit: usize) -> Result<Vec<T>, SearchError> {
    global_mapper().query(collection, filter, limit)
}

/// [`Mapper::query_dynamic`] on the global mapper.
pub fn query_dynamic(
    collection: &str,
    filter: &Filter,
    limit: usize,
) -> Result<Vec<DynamicRecord>, SearchError> {
    global_mapper().query_dynamic(collection, filter, limit)
}

/// [`Mapper::write`] on the global mapper.
pub fn write<'a, T: Record>(
    collection: &str,
    records: impl IntoIterator<Item = &'a T>,
) -> Result<usize, SearchError> {
    global_mapper().write(collection, records)
}

/// [`Mapper::update`] on the global mapper.
pub fn update<'a, T: Record>(
    collection: &str,
    records: impl IntoIterator<Item = &'a T>,
    key_field: &str,
) -> Result<usize, SearchError> {
    global_mapper().update(collection, records, key_field)
}

/// [`Mapper::delete_all`] on the global mapper.
pub fn delete_all(collection: &str) -> Result<(), SearchError> {
    global_mapper().delete_all(collection)
}

/// [`Mapper::purge`] on the global mapper.
pub fn purge() {
    global_mapper().purge()
}

/// [`Mapper::subscribe_purge`] on the global mapper.
pub fn subscribe_purge<F>(callback: F) -> SubscriptionId
where
    F: Fn() + Send + Sync + 'static,
{
    global_mapper().subscribe_purge(callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmap_mapper::{ConfigError, MemberConfig, TypeDescriptor};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug, Default, Clone, PartialEq)]
    struct Person {
        id: i32,
        name: String,
        email: Option<String>,
    }

    impl Record for Person {
        fn descriptor() -> TypeDescriptor<Self> {
            TypeDescriptor::new("Person")
                .with_default()
                .member("Id", |p: &Person| &p.id, |p: &mut Person| &mut p.id)
                .member("Name", |p: &Person| &p.name, |p: &mut Person| &mut p.name)
                .member("Email", |p: &Person| &p.email, |p: &mut Person| &mut p.email)
                .configure(
                    "Name",
                    MemberConfig::new().index(docmap_mapper::IndexPolicy::Analyzed),
                )
        }
    }

    /// A record without a constructor cannot be read.
    struct WriteOnly {
        id: i32,
    }

    impl Record for WriteOnly {
        fn descriptor() -> TypeDescriptor<Self> {
            TypeDescriptor::new("WriteOnly")
                .member("Id", |w: &WriteOnly| &w.id, |w: &mut WriteOnly| &mut w.id)
        }
    }

    fn setup() -> (TempDir, Mapper) {
        let temp_dir = TempDir::new().unwrap();
        let mapper = Mapper::from_settings(Settings::with_index_root(temp_dir.path()));
        (temp_dir, mapper)
    }

    fn person(id: i32, name: &str) -> Person {
        Person {
            id,
            name: name.to_string(),
            email: None,
        }
    }

    #[test]
    fn test_write_then_query() {
        let (_temp_dir, mapper) = setup();
        let people = vec![person(1, "ada lovelace"), person(2, "grace hopper")];
        assert_eq!(mapper.write("people", &people).unwrap(), 2);

        let found: Vec<Person> = mapper
            .query("people", &Filter::term("Id", "2"), 10)
            .unwrap();
        assert_eq!(found, vec![person(2, "grace hopper")]);

        let found: Vec<Person> = mapper
            .query("people", &Filter::text("Name", "Ada"), 10)
            .unwrap();
        assert_eq!(found, vec![person(1, "ada lovelace")]);
    }

    #[test]
    fn test_query_unknown_collection() {
        let (_temp_dir, mapper) = setup();
        let err = mapper
            .query::<Person>("missing", &Filter::All, 10)
            .unwrap_err();
        assert!(matches!(err, SearchError::CollectionNotFound(_)));
    }

    #[test]
    fn test_compiled_functions_are_cached() {
        let (_temp_dir, mapper) = setup();
        mapper.write("people", &[person(1, "a")]).unwrap();
        mapper.write("people", &[person(2, "b")]).unwrap();
        let _: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();
        let _: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();

        // One serializer and one deserializer for the unchanged schema
        assert_eq!(mapper.cache().len(), 2);
        assert_eq!(mapper.cache().stats().insertions, 2);
    }

    #[test]
    fn test_stale_deserializer_is_rebuilt_once() {
        let (_temp_dir, mapper) = setup();
        mapper.write("people", &[person(1, "ada")]).unwrap();

        // Plant a deserializer compiled before the Name field existed under
        // the fingerprint of the current schema.
        let live = vec!["Email".to_string(), "Id".to_string(), "Name".to_string()];
        let descriptor = Person::descriptor();
        let plan = build_field_plan(&descriptor).unwrap();
        let stale = compile_deserializer(&descriptor, &plan, &["Id".to_string()]).unwrap();
        mapper
            .cache()
            .insert(Fingerprint::read::<Person>(&live), Arc::new(stale));

        let found: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();
        assert_eq!(found, vec![person(1, "ada")]);

        let rebuilt = mapper.deserializer::<Person>(&live).unwrap();
        assert_eq!(rebuilt.bound_fields().len(), 3);
    }

    #[test]
    fn test_update_replaces_by_key_field() {
        let (_temp_dir, mapper) = setup();
        mapper
            .write("people", &[person(1, "ada"), person(2, "grace")])
            .unwrap();

        let mut changed = person(1, "ada lovelace");
        changed.email = Some("ada@example.com".into());
        mapper.update("people", [&changed], "Id").unwrap();

        let mut found: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();
        found.sort_by_key(|p| p.id);
        assert_eq!(found, vec![changed, person(2, "grace")]);
    }

    #[test]
    fn test_update_rejects_inexact_key_field() {
        let (_temp_dir, mapper) = setup();
        mapper.write("people", &[person(1, "ada")]).unwrap();

        for key_field in ["Name", "Nickname"] {
            let err = mapper
                .update("people", [&person(1, "ada")], key_field)
                .unwrap_err();
            assert!(matches!(
                err,
                SearchError::Config(ConfigError::UnmatchableKey { ref field, .. }) if field == key_field
            ));
        }

        let found: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();
        assert_eq!(found, vec![person(1, "ada")]);
    }

    #[test]
    fn test_delete_all() {
        let (_temp_dir, mapper) = setup();
        mapper.write("people", &[person(1, "ada")]).unwrap();
        mapper.delete_all("people").unwrap();
        let found: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn test_query_dynamic() {
        let (_temp_dir, mapper) = setup();
        mapper.write("people", &[person(7, "ada")]).unwrap();

        let rows = mapper.query_dynamic("people", &Filter::All, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("Id"), Some("7"));
        assert_eq!(rows[0].get("Name"), Some("ada"));
        assert!(!rows[0].contains("Email"));
    }

    #[test]
    fn test_missing_constructor_surfaces_on_read() {
        let (_temp_dir, mapper) = setup();
        mapper.write("things", &[WriteOnly { id: 1 }]).unwrap();
        let err = mapper
            .query::<WriteOnly>("things", &Filter::All, 10)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            SearchError::Config(docmap_mapper::ConfigError::MissingConstructor { .. })
        ));
    }

    #[test]
    fn test_purge_notifies_and_recompiles() {
        let (_temp_dir, mapper) = setup();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let id = mapper.subscribe_purge(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });

        mapper.write("people", &[person(1, "ada")]).unwrap();
        mapper.purge();
        assert!(mapper.cache().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let found: Vec<Person> = mapper.query("people", &Filter::All, 10).unwrap();
        assert_eq!(found.len(), 1);
        assert!(mapper.unsubscribe_purge(id));
    }
}
