//! Primitive round-trip E2E tests for docmap.
//!
//! Every supported primitive, plain and nullable, survives a write and a
//! read through the index, including zero, negative, empty and unset values.

use chrono::DateTime;
use pretty_assertions::assert_eq;

use docmap_mapper::{build_field_plan, compile_serializer, Record};
use docmap_search::Filter;
use e2e_tests::{random_primitives, Primitives, TestHarness};

fn read_all(harness: &TestHarness, collection: &str) -> Vec<Primitives> {
    let mut found: Vec<Primitives> = harness
        .mapper
        .query(collection, &Filter::All, 1000)
        .unwrap();
    found.sort_by_key(|p| p.id);
    found
}

#[test]
fn test_edge_values_round_trip() {
    let harness = TestHarness::new();
    let at = DateTime::from_timestamp(-86_400, 0).unwrap();
    let records = vec![
        // Zero values with everything unset
        Primitives {
            id: 1,
            ..Primitives::default()
        },
        // Negative and extreme values
        Primitives {
            id: 2,
            text: "negative".into(),
            small: i32::MIN,
            large: i64::MIN,
            flag: true,
            at,
            letter: '-',
            maybe_text: Some("set".into()),
            maybe_small: Some(-1),
            maybe_large: Some(-1),
            maybe_flag: Some(false),
            maybe_at: Some(at),
            maybe_letter: Some('z'),
        },
        // Zero in nullable members is a value, not unset
        Primitives {
            id: 3,
            text: String::new(),
            small: i32::MAX,
            large: i64::MAX,
            maybe_small: Some(0),
            maybe_large: Some(0),
            maybe_flag: Some(true),
            ..Primitives::default()
        },
    ];
    harness.mapper.write("primitives", &records).unwrap();

    assert_eq!(read_all(&harness, "primitives"), records);
}

#[test]
fn test_random_records_round_trip() {
    let harness = TestHarness::new();
    let records = random_primitives(42, 1, 50);
    harness.mapper.write("primitives", &records).unwrap();

    assert_eq!(read_all(&harness, "primitives"), records);
}

#[test]
fn test_recompiled_serializer_is_equivalent() {
    let harness = TestHarness::new();
    let records = random_primitives(7, 1, 10);

    let cached = harness.mapper.serializer::<Primitives>().unwrap();
    let descriptor = Primitives::descriptor();
    let plan = build_field_plan(&descriptor).unwrap();
    let fresh = compile_serializer(&descriptor, &plan).unwrap();

    for record in &records {
        assert_eq!(cached.serialize(record), fresh.serialize(record));
    }
}

#[test]
fn test_recompiled_deserializer_is_equivalent() {
    let harness = TestHarness::new();
    let records = random_primitives(11, 1, 10);
    let serializer = harness.mapper.serializer::<Primitives>().unwrap();
    let documents: Vec<_> = records.iter().map(|r| serializer.serialize(r)).collect();

    let names: Vec<String> = documents[0]
        .field_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let first = harness.mapper.deserializer::<Primitives>(&names).unwrap();
    harness.mapper.purge();
    let second = harness.mapper.deserializer::<Primitives>(&names).unwrap();

    for (document, record) in documents.iter().zip(&records) {
        assert_eq!(&first.deserialize(document).unwrap(), record);
        assert_eq!(&second.deserialize(document).unwrap(), record);
    }
}

#[test]
fn test_empty_collection_reads_nothing() {
    let harness = TestHarness::new();
    let none: Vec<Primitives> = Vec::new();
    assert_eq!(harness.mapper.write("primitives", &none).unwrap(), 0);
    assert!(read_all(&harness, "primitives").is_empty());
}
