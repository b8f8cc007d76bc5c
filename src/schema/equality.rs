//! Structural equality
//!
//! JSON values compare by value (numbers regardless of representation, object
//! keys regardless of order). Schema nodes compare by keyword mapping,
//! following nested schemas co-inductively: a pair already under comparison
//! is assumed equal, so cyclic graphs terminate.

use serde_json::Value;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

use super::{Items, SchemaId, SchemaKeyword, SchemaRef};
use crate::number::{number_hash_bits, numbers_equal};

/// Structural JSON equality
pub fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(x), Value::Bool(y)) => x == y,
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x.iter().all(|(key, a)| y.get(key).map(|b| json_equal(a, b)).unwrap_or(false))
        }
        _ => false,
    }
}

pub(crate) fn schemas_equal(a: SchemaRef<'_>, b: SchemaRef<'_>) -> bool {
    Bisimulation {
        left: a,
        right: b,
        assumed: HashSet::new(),
    }
    .equal(a.id(), b.id())
}

struct Bisimulation<'a, 'b> {
    left: SchemaRef<'a>,
    right: SchemaRef<'b>,
    assumed: HashSet<(SchemaId, SchemaId)>,
}

impl Bisimulation<'_, '_> {
    fn equal(&mut self, a: SchemaId, b: SchemaId) -> bool {
        if std::ptr::eq(self.left.graph(), self.right.graph()) && a == b {
            return true;
        }
        if !self.assumed.insert((a, b)) {
            return true;
        }
        let left = self.left.graph().schema(a);
        let right = self.right.graph().schema(b);
        if left.len() != right.len() {
            return false;
        }
        left.keywords().zip(right.keywords()).all(|((ka, va), (kb, vb))| {
            ka == kb && self.values_equal(va, vb)
        })
    }

    fn all_equal(&mut self, a: &[SchemaId], b: &[SchemaId]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.equal(*x, *y))
    }

    fn maps_equal<K: Ord>(
        &mut self,
        a: &std::collections::BTreeMap<K, SchemaId>,
        b: &std::collections::BTreeMap<K, SchemaId>,
    ) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|((ka, x), (kb, y))| ka == kb && self.equal(*x, *y))
    }

    fn values_equal(&mut self, a: &SchemaKeyword, b: &SchemaKeyword) -> bool {
        use SchemaKeyword::*;
        match (a, b) {
            (StringValue(x), StringValue(y)) => x == y,
            (NumberValue(x), NumberValue(y)) => numbers_equal(x, y),
            (BooleanValue(x), BooleanValue(y)) => x == y,
            (StringSet(x), StringSet(y)) => x == y,
            (JsonArrayValue(x), JsonArrayValue(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
            }
            (JsonValue(x), JsonValue(y)) => json_equal(x, y),
            (SingleSchema(x), SingleSchema(y)) => self.equal(*x, *y),
            (SchemaList(x), SchemaList(y)) => self.all_equal(x, y),
            (SchemaMap(x), SchemaMap(y)) => self.maps_equal(x, y),
            (TypeSet(x), TypeSet(y)) => x == y,
            (LimitValue(x), LimitValue(y)) => x.exclusive == y.exclusive && numbers_equal(&x.limit, &y.limit),
            (ItemsValue(x), ItemsValue(y)) => {
                let items = match (&x.items, &y.items) {
                    (None, None) => true,
                    (Some(Items::All(p)), Some(Items::All(q))) => self.equal(*p, *q),
                    (Some(Items::Tuple(p)), Some(Items::Tuple(q))) => self.all_equal(p, q),
                    _ => false,
                };
                items
                    && match (x.additional, y.additional) {
                        (None, None) => true,
                        (Some(p), Some(q)) => self.equal(p, q),
                        _ => false,
                    }
            }
            (DependenciesValue(x), DependenciesValue(y)) => {
                x.properties == y.properties && self.maps_equal(&x.schemas, &y.schemas)
            }
            _ => false,
        }
    }
}

/// Shallow hash: keyword names and leaf values, nested schemas by count only
pub(crate) fn hash_schema<H: Hasher>(schema: SchemaRef<'_>, state: &mut H) {
    let node = schema.schema();
    node.len().hash(state);
    for (keyword, value) in node.keywords() {
        keyword.key.hash(state);
        value.kind().hash(state);
        match value {
            SchemaKeyword::StringValue(s) => s.hash(state),
            SchemaKeyword::NumberValue(n) => number_hash_bits(n).hash(state),
            SchemaKeyword::BooleanValue(b) => b.hash(state),
            SchemaKeyword::StringSet(set) => set.hash(state),
            SchemaKeyword::TypeSet(types) => types.hash(state),
            SchemaKeyword::LimitValue(limit) => {
                number_hash_bits(&limit.limit).hash(state);
                limit.exclusive.hash(state);
            }
            other => other.subschemas().len().hash(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_equal_numbers_and_key_order() {
        assert!(json_equal(&json!(1), &json!(1.0)));
        assert!(json_equal(&json!({"a": 1, "b": [1, 2]}), &json!({"b": [1.0, 2], "a": 1})));
        assert!(!json_equal(&json!([1, 2]), &json!([2, 1])));
        assert!(!json_equal(&json!({"a": 1}), &json!({"a": 1, "b": 2})));
        assert!(!json_equal(&json!("1"), &json!(1)));
        assert!(!json_equal(&json!(false), &json!(0)));
    }
}
