//! Keyword parsing
//!
//! Turns one JSON keyword into a [`SchemaKeyword`] on the node's builder,
//! driven by the registry's value shape for the document's draft. Problems
//! are recorded on the session; the keyword is then left out of the node.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::report::{IssueCode, LoadingIssue};
use super::session::LoadingSession;
use crate::error::Result;
use crate::keyword::{is_integral, registry, registry::keys, Draft, JsonType, KeywordMetadata, ValueShape};
use crate::location::SchemaLocation;
use crate::schema::{
    draft, DependenciesValue, Items, ItemsValue, LimitValue, SchemaBuilder, SchemaId, SchemaKeyword, TypeSet,
};

impl LoadingSession<'_> {
    pub(super) fn parse_keyword(
        &mut self,
        builder: &mut SchemaBuilder,
        siblings: &Map<String, Value>,
        name: &str,
        value: &Value,
    ) -> Result<()> {
        let draft = builder.draft();
        let location = builder.location().clone();

        let Some(meta) = registry::lookup_for_draft(name, draft) else {
            return self.record(
                LoadingIssue::new(
                    IssueCode::UnknownKeyword,
                    location.to_string(),
                    format!("unknown keyword '{}' for {}", name, draft),
                )
                .with_level(self.unknown_keyword_level())
                .with_argument(name),
            );
        };

        let parsed = match (meta.key, meta.shape_for(draft)) {
            (keys::MINIMUM | keys::MAXIMUM, _) => self.parse_bound(meta, siblings, &location, draft, value)?,
            (keys::EXCLUSIVE_MINIMUM | keys::EXCLUSIVE_MAXIMUM, ValueShape::Boolean) => {
                self.check_exclusive_flag(meta, siblings, &location, draft, value)?;
                None
            }
            (keys::EXCLUSIVE_MINIMUM | keys::EXCLUSIVE_MAXIMUM, _) => match value {
                Value::Number(n) => Some(SchemaKeyword::LimitValue(LimitValue::exclusive(n.clone()))),
                other => {
                    self.mismatch(&location, meta, draft, other)?;
                    None
                }
            },
            (keys::ITEMS, _) => self.parse_items(siblings, &location, draft, value)?,
            (keys::ADDITIONAL_ITEMS, _) => self.parse_additional_items(siblings, &location, draft, value)?,
            (_, shape) => self.parse_shape(meta, shape, &location, draft, value)?,
        };

        if let Some(parsed) = parsed {
            let target = if meta.key == keys::ADDITIONAL_ITEMS { &registry::ITEMS } else { meta };
            builder.insert(target, parsed);
        }
        Ok(())
    }

    fn parse_shape(
        &mut self,
        meta: &'static KeywordMetadata,
        shape: ValueShape,
        location: &SchemaLocation,
        draft: Draft,
        value: &Value,
    ) -> Result<Option<SchemaKeyword>> {
        let here = location.child(meta.key);
        let parsed = match (shape, value) {
            (ValueShape::String | ValueShape::UriReference, Value::String(s)) => SchemaKeyword::StringValue(s.clone()),
            (ValueShape::Regex, Value::String(pattern)) => match Regex::new(pattern) {
                Ok(_) => SchemaKeyword::StringValue(pattern.clone()),
                Err(e) => {
                    self.invalid(location, meta, format!("invalid regex '{}': {}", pattern, e))?;
                    return Ok(None);
                }
            },
            (ValueShape::Number, Value::Number(n)) => SchemaKeyword::NumberValue(n.clone()),
            (ValueShape::PositiveNumber, Value::Number(n)) => {
                if !n.as_f64().map(|f| f > 0.0).unwrap_or(false) {
                    self.invalid(location, meta, format!("must be greater than zero, got {}", n))?;
                    return Ok(None);
                }
                SchemaKeyword::NumberValue(n.clone())
            }
            (ValueShape::NonNegativeInteger, Value::Number(n)) => {
                if !is_non_negative_integer(n) {
                    self.invalid(location, meta, format!("must be a non-negative integer, got {}", n))?;
                    return Ok(None);
                }
                SchemaKeyword::NumberValue(n.clone())
            }
            (ValueShape::Boolean, Value::Bool(b)) => SchemaKeyword::BooleanValue(*b),
            (ValueShape::Any, v) => SchemaKeyword::JsonValue(v.clone()),
            (ValueShape::Array | ValueShape::NonEmptyArray, Value::Array(items)) => {
                if items.is_empty() && shape == ValueShape::NonEmptyArray {
                    self.invalid(location, meta, "must not be empty".to_string())?;
                    return Ok(None);
                }
                SchemaKeyword::JsonArrayValue(items.clone())
            }
            (ValueShape::StringArray | ValueShape::NonEmptyStringArray, Value::Array(items)) => {
                let Some(names) = string_set(items) else {
                    self.mismatch(location, meta, draft, value)?;
                    return Ok(None);
                };
                if names.is_empty() && shape == ValueShape::NonEmptyStringArray {
                    self.invalid(location, meta, "must not be empty".to_string())?;
                    return Ok(None);
                }
                if names.len() < items.len() {
                    self.invalid(location, meta, "entries must be unique".to_string())?;
                }
                SchemaKeyword::StringSet(names)
            }
            (ValueShape::Schema, Value::Object(_) | Value::Bool(_)) => {
                SchemaKeyword::SingleSchema(self.load_value(value, here, draft)?)
            }
            (ValueShape::SchemaOrBoolean, Value::Object(_) | Value::Bool(_)) => {
                SchemaKeyword::SingleSchema(self.schema_or_boolean(value, here, draft)?)
            }
            (ValueShape::SchemaArray, Value::Array(items)) => {
                if items.is_empty() {
                    self.invalid(location, meta, "must not be empty".to_string())?;
                    return Ok(None);
                }
                SchemaKeyword::SchemaList(self.load_list(items, &here, draft)?)
            }
            (ValueShape::SchemaOrSchemaArray, Value::Array(items)) => {
                SchemaKeyword::SchemaList(self.load_list(items, &here, draft)?)
            }
            (ValueShape::SchemaOrSchemaArray, Value::Object(_)) => {
                SchemaKeyword::SchemaList(vec![self.load_value(value, here, draft)?])
            }
            (ValueShape::SchemaMap, Value::Object(entries)) => {
                let mut map = BTreeMap::new();
                for (name, entry) in entries {
                    if meta.key == keys::PATTERN_PROPERTIES {
                        if let Err(e) = Regex::new(name) {
                            self.invalid(location, meta, format!("invalid regex '{}': {}", name, e))?;
                            continue;
                        }
                    }
                    let id = self.load_value(entry, here.child(name.as_str()), draft)?;
                    map.insert(name.clone(), id);
                }
                SchemaKeyword::SchemaMap(map)
            }
            (ValueShape::TypeSet, v) => match self.parse_types(meta, location, draft, v)? {
                Some(types) => SchemaKeyword::TypeSet(types),
                None => return Ok(None),
            },
            (ValueShape::Dependencies, Value::Object(entries)) => {
                SchemaKeyword::DependenciesValue(self.parse_dependencies(meta, entries, location, draft)?)
            }
            (_, other) => {
                self.mismatch(location, meta, draft, other)?;
                return Ok(None);
            }
        };
        Ok(Some(parsed))
    }

    // =========================================================================
    // Numeric bounds
    // =========================================================================

    fn parse_bound(
        &mut self,
        meta: &'static KeywordMetadata,
        siblings: &Map<String, Value>,
        location: &SchemaLocation,
        draft: Draft,
        value: &Value,
    ) -> Result<Option<SchemaKeyword>> {
        let Value::Number(bound) = value else {
            self.mismatch(location, meta, draft, value)?;
            return Ok(None);
        };
        let flag = siblings.get(exclusive_sibling(meta.key));
        Ok(Some(SchemaKeyword::LimitValue(draft::interpret_limit(draft, bound.clone(), flag))))
    }

    /// Before draft 6 the exclusive flag only modifies its sibling bound
    fn check_exclusive_flag(
        &mut self,
        meta: &'static KeywordMetadata,
        siblings: &Map<String, Value>,
        location: &SchemaLocation,
        draft: Draft,
        value: &Value,
    ) -> Result<()> {
        if !value.is_boolean() {
            return self.mismatch(location, meta, draft, value);
        }
        let bound = inclusive_sibling(meta.key);
        if siblings.contains_key(bound) {
            return Ok(());
        }
        self.record(
            LoadingIssue::new(
                IssueCode::MissingKeyword,
                location.to_string(),
                format!("'{}' has no effect without '{}'", meta.key, bound),
            )
            .with_argument(meta.key)
            .with_argument(bound),
        )
    }

    // =========================================================================
    // Arrays
    // =========================================================================

    fn parse_items(
        &mut self,
        siblings: &Map<String, Value>,
        location: &SchemaLocation,
        draft: Draft,
        value: &Value,
    ) -> Result<Option<SchemaKeyword>> {
        let here = location.child(keys::ITEMS);
        let mut items = match value {
            Value::Array(list) => ItemsValue::tuple(self.load_list(list, &here, draft)?, None),
            Value::Object(_) | Value::Bool(_) => ItemsValue::all(self.load_value(value, here, draft)?),
            other => {
                self.mismatch(location, &registry::ITEMS, draft, other)?;
                return Ok(None);
            }
        };
        // A malformed additionalItems is reported by its own keyword.
        if matches!(items.items, Some(Items::Tuple(_))) {
            if let Some(additional @ (Value::Object(_) | Value::Bool(_))) = siblings.get(keys::ADDITIONAL_ITEMS) {
                let here = location.child(keys::ADDITIONAL_ITEMS);
                items.additional = Some(self.schema_or_boolean(additional, here, draft)?);
            }
        }
        Ok(Some(SchemaKeyword::ItemsValue(items)))
    }

    /// Only stores anything when `items` is absent; with a tuple `items` the
    /// additional schema is folded in by [`Self::parse_items`]
    fn parse_additional_items(
        &mut self,
        siblings: &Map<String, Value>,
        location: &SchemaLocation,
        draft: Draft,
        value: &Value,
    ) -> Result<Option<SchemaKeyword>> {
        if !matches!(value, Value::Object(_) | Value::Bool(_)) {
            self.mismatch(location, &registry::ADDITIONAL_ITEMS, draft, value)?;
            return Ok(None);
        }
        match siblings.get(keys::ITEMS) {
            Some(Value::Array(_)) => Ok(None),
            Some(_) => {
                self.record(
                    LoadingIssue::new(
                        IssueCode::ConflictingKeywords,
                        location.to_string(),
                        "'additionalItems' is ignored when 'items' is a single schema",
                    )
                    .with_argument(keys::ADDITIONAL_ITEMS)
                    .with_argument(keys::ITEMS),
                )?;
                Ok(None)
            }
            None => {
                let here = location.child(keys::ADDITIONAL_ITEMS);
                let additional = self.schema_or_boolean(value, here, draft)?;
                Ok(Some(SchemaKeyword::ItemsValue(ItemsValue {
                    items: None,
                    additional: Some(additional),
                })))
            }
        }
    }

    // =========================================================================
    // Types and dependencies
    // =========================================================================

    fn parse_types(
        &mut self,
        meta: &'static KeywordMetadata,
        location: &SchemaLocation,
        draft: Draft,
        value: &Value,
    ) -> Result<Option<TypeSet>> {
        let entries: Vec<&Value> = match value {
            Value::String(_) => vec![value],
            Value::Array(items) => items.iter().collect(),
            other => {
                self.mismatch(location, meta, draft, other)?;
                return Ok(None);
            }
        };

        let mut types = BTreeSet::new();
        for entry in entries {
            match entry {
                Value::String(name) if draft == Draft::Draft3 && name == "any" => {
                    types.extend(TypeSet::any().iter());
                }
                Value::String(name) => match JsonType::from_name(name) {
                    Some(ty) => {
                        types.insert(ty);
                    }
                    None => self.invalid(location, meta, format!("unknown type '{}'", name))?,
                },
                Value::Object(_) if draft == Draft::Draft3 => self.record(
                    LoadingIssue::new(
                        IssueCode::KeywordTypeMismatch,
                        location.to_string(),
                        format!("keyword '{}': schemas inside type unions are not supported", meta.key),
                    )
                    .with_argument(meta.key),
                )?,
                other => self.mismatch(location, meta, draft, other)?,
            }
        }

        if types.is_empty() {
            self.invalid(location, meta, "must name at least one type".to_string())?;
            return Ok(None);
        }
        Ok(Some(TypeSet::new(types)))
    }

    fn parse_dependencies(
        &mut self,
        meta: &'static KeywordMetadata,
        entries: &Map<String, Value>,
        location: &SchemaLocation,
        draft: Draft,
    ) -> Result<DependenciesValue> {
        let here = location.child(meta.key);
        let mut deps = DependenciesValue::default();
        for (name, dependency) in entries {
            match dependency {
                Value::Array(items) => match string_set(items) {
                    Some(names) => {
                        if names.len() < items.len() {
                            self.invalid(location, meta, format!("dependencies of '{}' must be unique", name))?;
                        }
                        deps.properties.insert(name.clone(), names);
                    }
                    None => self.mismatch(location, meta, draft, dependency)?,
                },
                Value::String(single) if draft == Draft::Draft3 => {
                    deps.properties.insert(name.clone(), BTreeSet::from([single.clone()]));
                }
                Value::Object(_) | Value::Bool(_) => {
                    let id = self.load_value(dependency, here.child(name.as_str()), draft)?;
                    deps.schemas.insert(name.clone(), id);
                }
                other => self.mismatch(location, meta, draft, other)?,
            }
        }
        Ok(deps)
    }

    // =========================================================================
    // Subschemas
    // =========================================================================

    fn load_list(&mut self, items: &[Value], location: &SchemaLocation, draft: Draft) -> Result<Vec<SchemaId>> {
        items
            .iter()
            .enumerate()
            .map(|(i, item)| self.load_value(item, location.child_index(i), draft))
            .collect()
    }

    /// `additionalItems`/`additionalProperties` accept booleans in every draft
    fn schema_or_boolean(&mut self, value: &Value, location: SchemaLocation, draft: Draft) -> Result<SchemaId> {
        match value {
            Value::Bool(true) => Ok(SchemaId::TRUE),
            Value::Bool(false) => Ok(SchemaId::FALSE),
            other => self.load_value(other, location, draft),
        }
    }
}

fn exclusive_sibling(bound: &str) -> &'static str {
    if bound == keys::MINIMUM {
        keys::EXCLUSIVE_MINIMUM
    } else {
        keys::EXCLUSIVE_MAXIMUM
    }
}

fn inclusive_sibling(flag: &str) -> &'static str {
    if flag == keys::EXCLUSIVE_MINIMUM {
        keys::MINIMUM
    } else {
        keys::MAXIMUM
    }
}

fn is_non_negative_integer(n: &Number) -> bool {
    is_integral(n) && n.as_f64().map(|f| f >= 0.0).unwrap_or(false)
}

/// Strings of an array, or `None` if any element is not a string
fn string_set(items: &[Value]) -> Option<BTreeSet<String>> {
    items.iter().map(|v| v.as_str().map(str::to_string)).collect()
}
