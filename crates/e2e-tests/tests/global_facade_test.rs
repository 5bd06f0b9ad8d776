//! Process-wide facade E2E test for docmap.
//!
//! Runs in its own test binary so the global registry can be installed
//! before first use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;

use docmap_search::{
    delete_all, global_mapper, global_registry, init_global_registry, purge, query,
    query_dynamic, subscribe_purge, update, write, Filter, Registry,
};
use e2e_tests::Sample;

#[test]
fn test_free_functions_use_global_registry() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    assert!(init_global_registry(Arc::new(Registry::with_root(temp_dir.path()))));
    assert!(!init_global_registry(Arc::new(Registry::with_root(temp_dir.path()))));
    assert_eq!(global_registry().root(), temp_dir.path());
    assert!(Arc::ptr_eq(global_mapper().registry(), &global_registry()));

    let record = Sample {
        int: 23,
        prop_string: "testing yet again".into(),
        bl: true,
    };
    assert_eq!(write("global", [&record]).unwrap(), 1);

    let found: Vec<Sample> = query("global", &Filter::term("Int", "23"), 1).unwrap();
    assert_eq!(found, vec![record.clone()]);

    let changed = Sample {
        bl: false,
        ..record
    };
    update("global", [&changed], "Int").unwrap();
    let rows = query_dynamic("global", &Filter::All, 10).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("Bl"), Some("False"));

    let purged = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&purged);
    subscribe_purge(move || {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    purge();
    assert_eq!(purged.load(Ordering::SeqCst), 1);

    delete_all("global").unwrap();
    let found: Vec<Sample> = query("global", &Filter::All, 10).unwrap();
    assert!(found.is_empty());

    global_registry().reset().unwrap();
}
