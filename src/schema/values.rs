//! Structured keyword values

use serde_json::{Number, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::SchemaId;
use crate::keyword::JsonType;
use crate::number::compare_numbers;

/// Allowed instance types; `integer` is kept distinct from `number`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct TypeSet(BTreeSet<JsonType>);

impl TypeSet {
    pub fn new(types: impl IntoIterator<Item = JsonType>) -> Self {
        Self(types.into_iter().collect())
    }

    /// Every primitive type (draft3 `"any"`)
    pub fn any() -> Self {
        Self::new(JsonType::PRIMITIVES)
    }

    pub fn contains(&self, ty: JsonType) -> bool {
        self.0.contains(&ty)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = JsonType> + '_ {
        self.0.iter().copied()
    }

    /// Whether `value` belongs to at least one member type
    pub fn matches(&self, value: &Value) -> bool {
        self.0.iter().any(|ty| ty.matches(value))
    }
}

impl fmt::Display for TypeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.0.iter().map(JsonType::as_str).collect();
        if names.len() == 1 {
            f.write_str(names[0])
        } else {
            write!(f, "[{}]", names.join(", "))
        }
    }
}

/// A numeric bound and whether it is exclusive
#[derive(Debug, Clone, PartialEq)]
pub struct LimitValue {
    pub limit: Number,
    pub exclusive: bool,
}

impl LimitValue {
    pub fn inclusive(limit: Number) -> Self {
        Self { limit, exclusive: false }
    }

    pub fn exclusive(limit: Number) -> Self {
        Self { limit, exclusive: true }
    }

    /// `value` satisfies this bound as a lower limit
    pub fn admits_as_minimum(&self, value: &Number) -> bool {
        match compare_numbers(value, &self.limit) {
            Some(Ordering::Greater) => true,
            Some(Ordering::Equal) => !self.exclusive,
            _ => false,
        }
    }

    /// `value` satisfies this bound as an upper limit
    pub fn admits_as_maximum(&self, value: &Number) -> bool {
        match compare_numbers(value, &self.limit) {
            Some(Ordering::Less) => true,
            Some(Ordering::Equal) => !self.exclusive,
            _ => false,
        }
    }
}

/// Item schemas of an array schema
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Items {
    /// One schema for every element
    All(SchemaId),
    /// One schema per position
    Tuple(Vec<SchemaId>),
}

/// `items` together with `additionalItems`
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemsValue {
    pub items: Option<Items>,
    /// Governs elements beyond a tuple; `false` maps to the always-invalid schema
    pub additional: Option<SchemaId>,
}

impl ItemsValue {
    pub fn all(schema: SchemaId) -> Self {
        Self { items: Some(Items::All(schema)), additional: None }
    }

    pub fn tuple(schemas: Vec<SchemaId>, additional: Option<SchemaId>) -> Self {
        Self { items: Some(Items::Tuple(schemas)), additional }
    }

    pub fn subschemas(&self) -> Vec<SchemaId> {
        let mut out = match &self.items {
            Some(Items::All(id)) => vec![*id],
            Some(Items::Tuple(ids)) => ids.clone(),
            None => Vec::new(),
        };
        out.extend(self.additional);
        out
    }
}

/// Merged property and schema dependencies
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DependenciesValue {
    pub properties: BTreeMap<String, BTreeSet<String>>,
    pub schemas: BTreeMap<String, SchemaId>,
}

impl DependenciesValue {
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn n(v: f64) -> Number {
        Number::from_f64(v).unwrap()
    }

    #[test]
    fn test_limits() {
        let min = LimitValue::inclusive(n(2.0));
        assert!(min.admits_as_minimum(&n(2.0)));
        assert!(!LimitValue::exclusive(n(2.0)).admits_as_minimum(&n(2.0)));
        assert!(LimitValue::exclusive(n(2.0)).admits_as_maximum(&Number::from(1)));
        assert!(!min.admits_as_minimum(&n(1.5)));
    }

    #[test]
    fn test_type_set() {
        let types = TypeSet::new([JsonType::Integer, JsonType::String]);
        assert!(types.matches(&json!(1)));
        assert!(!types.matches(&json!(1.5)));
        assert!(types.matches(&json!("a")));
        assert_eq!(types.to_string(), "[integer, string]");
        assert!(TypeSet::any().matches(&json!(null)));
    }
}
