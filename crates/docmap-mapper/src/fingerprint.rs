//! Cache keys for compiled mapping functions.
//!
//! A fingerprint identifies a record type, a direction and the set of field
//! names a function was compiled against. The hash is computed once; equality
//! compares every component, so two fingerprints with colliding hashes never
//! alias the same cache entry.

use std::any::{type_name, TypeId};
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Which mapping function a fingerprint names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Document to record
    Read,
    /// Record to document
    Write,
    /// Document to untyped field map
    Dynamic,
}

/// Identity of a compiled mapping function.
#[derive(Debug, Clone)]
pub struct Fingerprint {
    type_id: Option<TypeId>,
    type_name: &'static str,
    direction: Direction,
    field_names: Arc<[String]>,
    hash: u64,
}

impl Fingerprint {
    /// Deserializer for `T` compiled against `field_names`.
    pub fn read<T: 'static>(field_names: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self::new(
            Some(TypeId::of::<T>()),
            type_name::<T>(),
            Direction::Read,
            field_names,
        )
    }

    /// Serializer for `T`. Writing does not depend on the index schema.
    pub fn write<T: 'static>() -> Self {
        Self::new(
            Some(TypeId::of::<T>()),
            type_name::<T>(),
            Direction::Write,
            std::iter::empty::<&str>(),
        )
    }

    /// Untyped deserializer compiled against `field_names`.
    pub fn dynamic(field_names: impl IntoIterator<Item = impl AsRef<str>>) -> Self {
        Self::new(None, "dynamic", Direction::Dynamic, field_names)
    }

    fn new(
        type_id: Option<TypeId>,
        type_name: &'static str,
        direction: Direction,
        field_names: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Self {
        let names: BTreeSet<String> = field_names
            .into_iter()
            .map(|s| s.as_ref().to_string())
            .collect();
        let field_names: Arc<[String]> = names.into_iter().collect();

        let mut hasher = DefaultHasher::new();
        type_id.hash(&mut hasher);
        direction.hash(&mut hasher);
        field_names.hash(&mut hasher);

        Self {
            type_id,
            type_name,
            direction,
            field_names,
            hash: hasher.finish(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Sorted, de-duplicated field names.
    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn hash_value(&self) -> u64 {
        self.hash
    }
}

impl Hash for Fingerprint {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl PartialEq for Fingerprint {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.type_id == other.type_id
            && self.direction == other.direction
            && self.field_names == other.field_names
    }
}

impl Eq for Fingerprint {}

#[cfg(test)]
mod tests {
    use super::*;

    struct A;
    struct B;

    #[test]
    fn test_field_order_and_duplicates_do_not_matter() {
        let one = Fingerprint::read::<A>(["b", "a", "a"]);
        let two = Fingerprint::read::<A>(["a", "b"]);
        assert_eq!(one, two);
        assert_eq!(one.hash_value(), two.hash_value());
        assert_eq!(one.field_names(), &["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_components_distinguish() {
        let read_a = Fingerprint::read::<A>(["x"]);
        assert_ne!(read_a, Fingerprint::read::<B>(["x"]));
        assert_ne!(read_a, Fingerprint::read::<A>(["y"]));
        assert_ne!(Fingerprint::write::<A>(), Fingerprint::read::<A>(Vec::<String>::new()));
        assert_ne!(Fingerprint::dynamic(["x"]), read_a);
    }

    #[test]
    fn test_equal_hash_is_not_enough() {
        let mut forged = Fingerprint::read::<A>(["x"]);
        let real = Fingerprint::read::<B>(["x"]);
        forged.hash = real.hash;
        assert_ne!(forged, real);
    }

    #[test]
    fn test_type_name_is_recorded() {
        assert!(Fingerprint::write::<A>().type_name().ends_with("A"));
        assert_eq!(Fingerprint::dynamic(["x"]).direction(), Direction::Dynamic);
    }
}
