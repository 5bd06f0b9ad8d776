//! Field plans: which members map to which document fields, and how.
//!
//! The plan is resolved once from a [`TypeDescriptor`] and drives both the
//! serializer and the deserializer compilers.

use tracing::debug;

use crate::descriptor::TypeDescriptor;
use crate::document::{IndexPolicy, Store};
use crate::error::ConfigError;
use crate::value::ValueType;

/// Resolved mapping of one member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlanEntry {
    /// Document field name
    pub logical_name: String,
    /// Member the value comes from
    pub source_member: &'static str,
    /// Position of the member in the descriptor
    pub member_index: usize,
    pub value_type: ValueType,
    pub nullable: bool,
    pub store: Store,
    pub index: IndexPolicy,
    pub ignored: bool,
    pub custom_serializer: bool,
    pub custom_deserializer: bool,
    pub delimiter: Option<String>,
}

/// Ordered field plan of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPlan {
    type_name: &'static str,
    entries: Vec<FieldPlanEntry>,
}

impl FieldPlan {
    /// Build the plan, keeping ignored members as entries flagged `ignored`.
    pub fn with_ignored<T>(descriptor: &TypeDescriptor<T>) -> Result<Self, ConfigError> {
        build(descriptor, true)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn entries(&self) -> &[FieldPlanEntry] {
        &self.entries
    }

    /// Entries that take part in mapping.
    pub fn active(&self) -> impl Iterator<Item = &FieldPlanEntry> {
        self.entries.iter().filter(|e| !e.ignored)
    }

    pub fn logical_names(&self) -> impl Iterator<Item = &str> {
        self.active().map(|e| e.logical_name.as_str())
    }

    pub fn find(&self, logical_name: &str) -> Option<&FieldPlanEntry> {
        self.entries.iter().find(|e| e.logical_name == logical_name)
    }

    /// The entry an update can match on by the field's raw value.
    ///
    /// Only fields indexed whole as a single term qualify; an analyzed or
    /// unindexed key would never match and every update would append.
    pub fn key_entry(&self, field: &str) -> Result<&FieldPlanEntry, ConfigError> {
        let unmatchable = |reason| ConfigError::UnmatchableKey {
            type_name: self.type_name,
            field: field.to_string(),
            reason,
        };
        let entry = self
            .active()
            .find(|e| e.logical_name == field)
            .ok_or_else(|| unmatchable("no member maps to this field"))?;
        match entry.index {
            IndexPolicy::No => Err(unmatchable("field is not indexed")),
            index if index.is_analyzed() => Err(unmatchable("field is analyzed")),
            _ => Ok(entry),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve the field plan of a record type. Ignored members are left out.
pub fn build_field_plan<T>(descriptor: &TypeDescriptor<T>) -> Result<FieldPlan, ConfigError> {
    build(descriptor, false)
}

fn build<T>(descriptor: &TypeDescriptor<T>, include_ignored: bool) -> Result<FieldPlan, ConfigError> {
    let type_name = descriptor.type_name();
    let defaults = descriptor.type_config();

    for name in descriptor.referenced_names() {
        if descriptor.find_member(name).is_none() {
            return Err(ConfigError::UnknownMember {
                type_name,
                member: name.to_string(),
            });
        }
    }

    let mut entries = Vec::with_capacity(descriptor.members().len());
    for (member_index, member) in descriptor.members().iter().enumerate() {
        let name = member.name();
        if descriptor.is_synthesized(name) {
            continue;
        }

        let config = descriptor.member_config(name);
        let ignored = match config {
            Some(cfg) => cfg.ignore,
            None => defaults.ignore_by_default,
        };
        if ignored && !include_ignored {
            continue;
        }

        let custom_serializer = descriptor.custom_serializer(name).is_some();
        let custom_deserializer = descriptor.custom_deserializer(name).is_some();
        let delimiter = descriptor.delimiter(name).map(str::to_string);

        if !ignored {
            if let Some(delim) = &delimiter {
                check_delimited(type_name, name, member.value_type(), delim)?;
            } else if !custom_serializer
                && !custom_deserializer
                && !member.value_type().is_primitive()
            {
                if config.is_some() {
                    return Err(ConfigError::UnsupportedType {
                        type_name,
                        member: name.to_string(),
                        value_type: member.value_type().clone(),
                    });
                }
                debug!(
                    type_name,
                    member = name,
                    value_type = %member.value_type(),
                    "Skipping member without a text form"
                );
                continue;
            }
        }

        let logical_name = config
            .and_then(|c| c.field_name.clone())
            .unwrap_or_else(|| name.to_string());

        entries.push(FieldPlanEntry {
            logical_name,
            source_member: name,
            member_index,
            value_type: member.value_type().clone(),
            nullable: member.nullable(),
            store: config.and_then(|c| c.store).unwrap_or(defaults.default_store),
            index: config.and_then(|c| c.index).unwrap_or(defaults.default_index),
            ignored,
            custom_serializer,
            custom_deserializer,
            delimiter,
        });
    }

    Ok(FieldPlan { type_name, entries })
}

fn check_delimited(
    type_name: &'static str,
    member: &str,
    value_type: &ValueType,
    delimiter: &str,
) -> Result<(), ConfigError> {
    if delimiter.is_empty() {
        return Err(ConfigError::EmptyDelimiter {
            type_name,
            member: member.to_string(),
        });
    }
    let Some(element) = value_type.element() else {
        return Err(ConfigError::DelimitedNotList {
            type_name,
            member: member.to_string(),
            value_type: value_type.clone(),
        });
    };
    if !element.is_primitive() {
        return Err(ConfigError::DelimitedElement {
            type_name,
            member: member.to_string(),
            element_type: element.clone(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{MemberConfig, TypeConfig};
    use std::collections::HashMap;

    #[derive(Default)]
    struct Poco {
        id: i32,
        name: String,
        tags: Vec<String>,
        nested: Vec<Vec<i32>>,
        hidden: bool,
        _extra: HashMap<String, String>,
    }

    fn descriptor() -> TypeDescriptor<Poco> {
        TypeDescriptor::new("Poco")
            .with_default()
            .member("Id", |p: &Poco| &p.id, |p: &mut Poco| &mut p.id)
            .member("Name", |p: &Poco| &p.name, |p: &mut Poco| &mut p.name)
            .member("Tags", |p: &Poco| &p.tags, |p: &mut Poco| &mut p.tags)
            .member("Nested", |p: &Poco| &p.nested, |p: &mut Poco| &mut p.nested)
            .member("Hidden", |p: &Poco| &p.hidden, |p: &mut Poco| &mut p.hidden)
            .opaque("Extra", "HashMap")
    }

    #[test]
    fn test_unsupported_members_are_skipped() {
        let plan = build_field_plan(&descriptor()).unwrap();
        let names: Vec<_> = plan.logical_names().collect();
        assert_eq!(names, vec!["Id", "Name", "Hidden"]);
        assert_eq!(plan.type_name(), "Poco");
    }

    #[test]
    fn test_defaults_apply_to_undeclared_members() {
        let plan = build_field_plan(&descriptor()).unwrap();
        let id = plan.find("Id").unwrap();
        assert_eq!(id.store, Store::Yes);
        assert_eq!(id.index, IndexPolicy::NotAnalyzedNoNorms);
        assert!(!id.nullable);
        assert_eq!(id.member_index, 0);
    }

    #[test]
    fn test_member_config_renames_and_overrides() {
        let desc = descriptor().configure(
            "Name",
            MemberConfig::new()
                .field_name("_Different")
                .store(Store::No)
                .index(IndexPolicy::Analyzed),
        );
        let plan = build_field_plan(&desc).unwrap();
        assert!(plan.find("Name").is_none());
        let entry = plan.find("_Different").unwrap();
        assert_eq!(entry.source_member, "Name");
        assert_eq!(entry.store, Store::No);
        assert_eq!(entry.index, IndexPolicy::Analyzed);
    }

    #[test]
    fn test_ignore_by_default_keeps_only_declared() {
        let desc = descriptor()
            .config(TypeConfig::new().ignore_by_default(true))
            .configure("Id", MemberConfig::new());
        let plan = build_field_plan(&desc).unwrap();
        assert_eq!(plan.logical_names().collect::<Vec<_>>(), vec!["Id"]);
    }

    #[test]
    fn test_with_ignored_flags_entries() {
        let desc = descriptor().configure("Hidden", MemberConfig::ignored());
        let plan = build_field_plan(&desc).unwrap();
        assert!(plan.find("Hidden").is_none());

        let full = FieldPlan::with_ignored(&desc).unwrap();
        assert!(full.find("Hidden").unwrap().ignored);
        assert!(!full.logical_names().any(|n| n == "Hidden"));
    }

    #[test]
    fn test_type_defaults_flow_into_entries() {
        let desc = descriptor().config(
            TypeConfig::new()
                .default_store(Store::Compress)
                .default_index(IndexPolicy::Analyzed),
        );
        let plan = build_field_plan(&desc).unwrap();
        let name = plan.find("Name").unwrap();
        assert_eq!(name.store, Store::Compress);
        assert_eq!(name.index, IndexPolicy::Analyzed);
    }

    #[test]
    fn test_delimited_list_is_included() {
        let desc = descriptor().delimited("Tags", ",");
        let plan = build_field_plan(&desc).unwrap();
        let tags = plan.find("Tags").unwrap();
        assert_eq!(tags.delimiter.as_deref(), Some(","));
        assert_eq!(tags.value_type, ValueType::List(Box::new(ValueType::Text)));
    }

    #[test]
    fn test_delimited_on_non_list_fails() {
        let err = build_field_plan(&descriptor().delimited("Name", ",")).unwrap_err();
        assert!(matches!(err, ConfigError::DelimitedNotList { .. }));
    }

    #[test]
    fn test_delimited_nested_list_fails() {
        let err = build_field_plan(&descriptor().delimited("Nested", ",")).unwrap_err();
        assert!(matches!(err, ConfigError::DelimitedElement { .. }));
    }

    #[test]
    fn test_empty_delimiter_fails() {
        let err = build_field_plan(&descriptor().delimited("Tags", "")).unwrap_err();
        assert!(matches!(err, ConfigError::EmptyDelimiter { .. }));
    }

    #[test]
    fn test_declared_unsupported_member_fails() {
        let desc = descriptor().configure("Extra", MemberConfig::new());
        let err = build_field_plan(&desc).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedType { ref member, .. } if member == "Extra"));
    }

    #[test]
    fn test_custom_codec_admits_opaque_member() {
        let desc = descriptor().serialize_with("Extra", |p: &Poco| p._extra.len().to_string());
        let plan = build_field_plan(&desc).unwrap();
        let extra = plan.find("Extra").unwrap();
        assert!(extra.custom_serializer);
        assert!(!extra.custom_deserializer);
    }

    #[test]
    fn test_unknown_member_fails() {
        let desc = descriptor().configure("Missing", MemberConfig::new());
        let err = build_field_plan(&desc).unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownMember {
                type_name: "Poco",
                member: "Missing".to_string()
            }
        );
    }

    #[test]
    fn test_synthesized_members_are_excluded() {
        let desc = descriptor()
            .configure("Name", MemberConfig::new().field_name("n"))
            .synthesized("Name");
        let plan = FieldPlan::with_ignored(&desc).unwrap();
        assert!(plan.find("n").is_none());
        assert!(plan.find("Name").is_none());
    }

    #[test]
    fn test_key_entry_requires_exact_index() {
        let desc = descriptor()
            .configure("Id", MemberConfig::new().field_name("_id"))
            .configure("Name", MemberConfig::new().index(IndexPolicy::Analyzed))
            .configure("Hidden", MemberConfig::new().index(IndexPolicy::No));
        let plan = build_field_plan(&desc).unwrap();

        assert_eq!(plan.key_entry("_id").unwrap().source_member, "Id");
        for field in ["Name", "Hidden", "Id", "Nested"] {
            let err = plan.key_entry(field).unwrap_err();
            assert!(
                matches!(err, ConfigError::UnmatchableKey { field: ref f, .. } if f == field),
                "{field} should not be usable as a key"
            );
        }
    }
}
