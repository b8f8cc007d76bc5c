//! Schema Builder
//!
//! Accumulates keywords for one node. `build` checks preconditions and copies
//! the accumulated state, so a builder can be built any number of times and
//! always yields equal schemas for equal input.

use regex::Regex;
use std::collections::BTreeMap;

use super::{Items, Schema, SchemaKeyword};
use crate::error::{Result, SchemaError};
use crate::keyword::{registry::keys, Draft, KeywordMetadata, ValueShape};
use crate::location::SchemaLocation;

#[derive(Debug, Clone)]
pub struct SchemaBuilder {
    location: SchemaLocation,
    draft: Draft,
    keywords: BTreeMap<&'static KeywordMetadata, SchemaKeyword>,
}

impl SchemaBuilder {
    pub fn new(location: SchemaLocation, draft: Draft) -> Self {
        Self {
            location,
            draft,
            keywords: BTreeMap::new(),
        }
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.location
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// Insert or replace a keyword
    pub fn insert(&mut self, keyword: &'static KeywordMetadata, value: SchemaKeyword) -> &mut Self {
        self.keywords.insert(keyword, value);
        self
    }

    pub fn remove(&mut self, keyword: &KeywordMetadata) -> Option<SchemaKeyword> {
        self.keywords.remove(keyword)
    }

    pub fn get(&self, keyword: &KeywordMetadata) -> Option<&SchemaKeyword> {
        self.keywords.get(keyword)
    }

    pub fn contains(&self, keyword: &KeywordMetadata) -> bool {
        self.keywords.contains_key(keyword)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Check preconditions and produce the immutable node
    pub fn build(&self) -> Result<Schema> {
        for (keyword, value) in &self.keywords {
            check_keyword(keyword, self.draft, value)?;
        }
        Ok(Schema::from_parts(self.location.clone(), self.draft, self.keywords.clone()))
    }
}

fn check_keyword(keyword: &KeywordMetadata, draft: Draft, value: &SchemaKeyword) -> Result<()> {
    let fail = |reason: String| Err(SchemaError::invalid_keyword(keyword.key, reason));

    // `$ref` and `exclusiveM*` in draft6 are stored under shapes the JSON form doesn't have.
    let expected: &[&str] = match (keyword.key, keyword.shape_for(draft)) {
        (keys::REF, _) => &["schema"],
        (keys::MINIMUM | keys::MAXIMUM | keys::EXCLUSIVE_MINIMUM | keys::EXCLUSIVE_MAXIMUM, _) => &["limit"],
        (keys::ITEMS | keys::ADDITIONAL_ITEMS, _) => &["items"],
        (_, ValueShape::String | ValueShape::UriReference | ValueShape::Regex) => &["string"],
        (_, ValueShape::Number | ValueShape::PositiveNumber | ValueShape::NonNegativeInteger) => &["number"],
        (_, ValueShape::Boolean) => &["boolean"],
        (_, ValueShape::Any) => &["json"],
        (_, ValueShape::NonEmptyArray | ValueShape::Array) => &["array"],
        (_, ValueShape::StringArray | ValueShape::NonEmptyStringArray) => &["string set"],
        (_, ValueShape::Schema | ValueShape::SchemaOrBoolean) => &["schema"],
        (_, ValueShape::SchemaArray | ValueShape::SchemaOrSchemaArray) => &["schema list"],
        (_, ValueShape::SchemaMap) => &["schema map"],
        (_, ValueShape::TypeSet) => &["type set"],
        (_, ValueShape::Dependencies) => &["dependencies"],
    };
    if !expected.contains(&value.kind()) {
        return fail(format!("expected a {} value, got a {} value", expected[0], value.kind()));
    }

    match (keyword.shape_for(draft), value) {
        (ValueShape::NonNegativeInteger, v) if v.as_u64().is_none() => {
            fail("must be a non-negative integer".to_string())
        }
        (ValueShape::PositiveNumber, SchemaKeyword::NumberValue(n))
            if !n.as_f64().map(|f| f > 0.0).unwrap_or(false) =>
        {
            fail(format!("must be greater than zero, got {n}"))
        }
        (ValueShape::NonEmptyArray, SchemaKeyword::JsonArrayValue(items)) if items.is_empty() => {
            fail("must not be empty".to_string())
        }
        (ValueShape::NonEmptyStringArray, SchemaKeyword::StringSet(set)) if set.is_empty() => {
            fail("must not be empty".to_string())
        }
        (ValueShape::SchemaArray, SchemaKeyword::SchemaList(list)) if list.is_empty() => {
            fail("must not be empty".to_string())
        }
        (ValueShape::TypeSet, SchemaKeyword::TypeSet(types)) if types.is_empty() => {
            fail("must name at least one type".to_string())
        }
        (ValueShape::Regex, SchemaKeyword::StringValue(pattern)) => check_regex(keyword, pattern),
        (ValueShape::SchemaMap, SchemaKeyword::SchemaMap(map)) if keyword.key == keys::PATTERN_PROPERTIES => {
            map.keys().try_for_each(|pattern| check_regex(keyword, pattern))
        }
        (_, SchemaKeyword::ItemsValue(items)) if matches!(&items.items, Some(Items::All(_))) && items.additional.is_some() => {
            fail("additionalItems has no effect when items is a single schema".to_string())
        }
        (_, SchemaKeyword::DependenciesValue(deps)) => {
            match deps.properties.keys().find(|k| deps.schemas.contains_key(*k)) {
                Some(both) => fail(format!("'{both}' has both a property and a schema dependency")),
                None => Ok(()),
            }
        }
        _ => Ok(()),
    }
}

fn check_regex(keyword: &KeywordMetadata, pattern: &str) -> Result<()> {
    Regex::new(pattern)
        .map(|_| ())
        .map_err(|e| SchemaError::invalid_keyword(keyword.key, format!("invalid regex '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::registry;
    use crate::location::{default_base_uri, SchemaLocation};
    use crate::schema::{ItemsValue, SchemaId};
    use serde_json::Number;

    fn builder() -> SchemaBuilder {
        SchemaBuilder::new(SchemaLocation::document_root(default_base_uri()), Draft::Draft6)
    }

    #[test]
    fn test_rebuild_yields_equal_schema() {
        let mut b = builder();
        b.insert(&registry::MIN_LENGTH, SchemaKeyword::NumberValue(Number::from(2)));
        b.insert(&registry::TITLE, SchemaKeyword::StringValue("name".into()));
        assert_eq!(b.build().unwrap(), b.build().unwrap());
    }

    #[test]
    fn test_negative_count_fails_fast() {
        let mut b = builder();
        b.insert(&registry::MIN_ITEMS, SchemaKeyword::NumberValue(Number::from(-1)));
        let err = b.build().unwrap_err();
        assert!(matches!(err, SchemaError::InvalidKeyword { ref keyword, .. } if keyword == "minItems"));
    }

    #[test]
    fn test_wrong_value_kind_fails_fast() {
        let mut b = builder();
        b.insert(&registry::PATTERN, SchemaKeyword::BooleanValue(true));
        assert!(b.build().is_err());
    }

    #[test]
    fn test_invalid_regex_fails_fast() {
        let mut b = builder();
        b.insert(&registry::PATTERN, SchemaKeyword::StringValue("(".into()));
        assert!(b.build().is_err());
    }

    #[test]
    fn test_conflicting_items_fail_fast() {
        let mut b = builder();
        let mut items = ItemsValue::all(SchemaId::TRUE);
        items.additional = Some(SchemaId::FALSE);
        b.insert(&registry::ITEMS, SchemaKeyword::ItemsValue(items));
        assert!(b.build().is_err());
    }
}
