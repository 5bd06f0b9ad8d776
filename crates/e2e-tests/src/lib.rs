//! End-to-end test infrastructure for docmap.
//!
//! Provides a TestHarness over a temporary index root and the record types
//! shared by the E2E scenarios.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use docmap_mapper::{CacheConfig, IndexPolicy, MemberConfig, Record, TypeDescriptor};
use docmap_search::{Mapper, Settings};

/// Shared test harness for E2E tests.
///
/// Owns a temp index root and a mapper with its own registry and cache.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Directory holding the collections
    pub index_root: PathBuf,
    pub mapper: Mapper,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    /// Harness whose conversion cache uses `cache` thresholds.
    pub fn with_cache(cache: CacheConfig) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_root = temp_dir.path().join("indexes");

        let mut settings = Settings::with_index_root(&index_root);
        settings.cache = cache;
        let mapper = Mapper::from_settings(settings);

        Self {
            _temp_dir: temp_dir,
            index_root,
            mapper,
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Record with one member of each primitive kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sample {
    pub int: i32,
    pub prop_string: String,
    pub bl: bool,
}

impl Record for Sample {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("Sample")
            .with_default()
            .member("Int", |s: &Sample| &s.int, |s: &mut Sample| &mut s.int)
            .member(
                "PropString",
                |s: &Sample| &s.prop_string,
                |s: &mut Sample| &mut s.prop_string,
            )
            .member("Bl", |s: &Sample| &s.bl, |s: &mut Sample| &mut s.bl)
            .configure("PropString", MemberConfig::new().index(IndexPolicy::Analyzed))
    }
}

/// Record with a nullable integer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    pub id: i32,
    pub value: Option<i32>,
}

impl Record for Reading {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("Reading")
            .with_default()
            .member("Id", |r: &Reading| &r.id, |r: &mut Reading| &mut r.id)
            .member("Value", |r: &Reading| &r.value, |r: &mut Reading| &mut r.value)
    }
}

/// Record whose list member uses a custom codec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tagged {
    pub id: i32,
    pub tags: Vec<String>,
}

impl Record for Tagged {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("Tagged")
            .with_default()
            .member("Id", |t: &Tagged| &t.id, |t: &mut Tagged| &mut t.id)
            .member("Tags", |t: &Tagged| &t.tags, |t: &mut Tagged| &mut t.tags)
            .serialize_with("Tags", |t: &Tagged| t.tags.join("|"))
            .deserialize_with("Tags", |t: &mut Tagged, text: &str| {
                t.tags = text.split('|').map(str::to_string).collect();
            })
    }
}

/// Every supported primitive, plain and nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct Primitives {
    pub id: i32,
    pub text: String,
    pub small: i32,
    pub large: i64,
    pub flag: bool,
    pub at: DateTime<Utc>,
    pub letter: char,
    pub maybe_text: Option<String>,
    pub maybe_small: Option<i32>,
    pub maybe_large: Option<i64>,
    pub maybe_flag: Option<bool>,
    pub maybe_at: Option<DateTime<Utc>>,
    pub maybe_letter: Option<char>,
}

impl Default for Primitives {
    fn default() -> Self {
        Self {
            id: 0,
            text: String::new(),
            small: 0,
            large: 0,
            flag: false,
            at: DateTime::UNIX_EPOCH,
            letter: 'a',
            maybe_text: None,
            maybe_small: None,
            maybe_large: None,
            maybe_flag: None,
            maybe_at: None,
            maybe_letter: None,
        }
    }
}

impl Record for Primitives {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("Primitives")
            .with_default()
            .member("Id", |p: &Primitives| &p.id, |p: &mut Primitives| &mut p.id)
            .member("Text", |p: &Primitives| &p.text, |p: &mut Primitives| &mut p.text)
            .member("Small", |p: &Primitives| &p.small, |p: &mut Primitives| &mut p.small)
            .member("Large", |p: &Primitives| &p.large, |p: &mut Primitives| &mut p.large)
            .member("Flag", |p: &Primitives| &p.flag, |p: &mut Primitives| &mut p.flag)
            .member("At", |p: &Primitives| &p.at, |p: &mut Primitives| &mut p.at)
            .member("Letter", |p: &Primitives| &p.letter, |p: &mut Primitives| &mut p.letter)
            .member(
                "MaybeText",
                |p: &Primitives| &p.maybe_text,
                |p: &mut Primitives| &mut p.maybe_text,
            )
            .member(
                "MaybeSmall",
                |p: &Primitives| &p.maybe_small,
                |p: &mut Primitives| &mut p.maybe_small,
            )
            .member(
                "MaybeLarge",
                |p: &Primitives| &p.maybe_large,
                |p: &mut Primitives| &mut p.maybe_large,
            )
            .member(
                "MaybeFlag",
                |p: &Primitives| &p.maybe_flag,
                |p: &mut Primitives| &mut p.maybe_flag,
            )
            .member("MaybeAt", |p: &Primitives| &p.maybe_at, |p: &mut Primitives| &mut p.maybe_at)
            .member(
                "MaybeLetter",
                |p: &Primitives| &p.maybe_letter,
                |p: &mut Primitives| &mut p.maybe_letter,
            )
    }
}

/// Profile as first written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileV1 {
    pub id: i32,
    pub name: String,
}

impl Record for ProfileV1 {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("ProfileV1")
            .with_default()
            .member("Id", |p: &ProfileV1| &p.id, |p: &mut ProfileV1| &mut p.id)
            .member("Name", |p: &ProfileV1| &p.name, |p: &mut ProfileV1| &mut p.name)
    }
}

/// Profile after gaining a `Nickname` field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub id: i32,
    pub name: String,
    pub nickname: Option<String>,
}

impl Record for Profile {
    fn descriptor() -> TypeDescriptor<Self> {
        TypeDescriptor::new("Profile")
            .with_default()
            .member("Id", |p: &Profile| &p.id, |p: &mut Profile| &mut p.id)
            .member("Name", |p: &Profile| &p.name, |p: &mut Profile| &mut p.name)
            .member(
                "Nickname",
                |p: &Profile| &p.nickname,
                |p: &mut Profile| &mut p.nickname,
            )
    }
}

/// Deterministic pseudo-random Primitives records with ids `first..first + count`.
///
/// Timestamps are whole seconds since they are stored at second precision.
pub fn random_primitives(seed: u64, first: i32, count: usize) -> Vec<Primitives> {
    let mut rng = StdRng::seed_from_u64(seed);
    let letters = ['x', 'Z', '7', 'é', '#'];

    (0..count)
        .map(|i| {
            let secs = rng.random_range(-2_000_000_000i64..4_000_000_000);
            let at = DateTime::from_timestamp(secs, 0).unwrap_or(DateTime::UNIX_EPOCH);
            let letter = letters[rng.random_range(0..letters.len())];
            let set = rng.random_bool(0.5);
            Primitives {
                id: first + i as i32,
                text: format!("record {}", rng.random::<u32>()),
                small: rng.random(),
                large: rng.random(),
                flag: rng.random(),
                at,
                letter,
                maybe_text: set.then(|| format!("maybe {}", rng.random::<u16>())),
                maybe_small: set.then(|| rng.random()),
                maybe_large: set.then(|| rng.random()),
                maybe_flag: set.then(|| rng.random()),
                maybe_at: set.then_some(at),
                maybe_letter: set.then_some(letter),
            }
        })
        .collect()
}
