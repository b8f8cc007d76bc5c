//! Per-draft interpretation
//!
//! The same keyword can mean different things in different drafts. Rather than
//! a schema type per draft, these free functions interpret the shared keyword
//! mapping for a given draft.

use serde_json::{Number, Value};

use super::{LimitValue, SchemaKeyword, SchemaRef};
use crate::keyword::{registry::keys, Draft};

/// The draft declared by a document's `$schema`, and whether it was recognized
pub fn detect_draft(document: &Value, default: Draft) -> (Draft, Option<&str>) {
    match document.get(keys::SCHEMA).and_then(Value::as_str) {
        Some(uri) => match Draft::from_schema_uri(uri) {
            Some(draft) => (draft, None),
            None => (default, Some(uri)),
        },
        None => (default, None),
    }
}

/// The `$id`/`id` string of a schema object, honoring the draft's spelling
pub fn id_of(value: &Value, draft: Draft) -> Option<&str> {
    value.get(draft.id_keyword()).and_then(Value::as_str)
}

/// Whether `exclusiveMinimum`/`exclusiveMaximum` carry their own bound
pub fn exclusive_limit_is_standalone(draft: Draft) -> bool {
    matches!(draft, Draft::Draft6)
}

/// Combine `minimum`/`maximum` with its exclusive sibling.
///
/// Before draft 6 the sibling is a boolean flag; from draft 6 on it is a
/// separate bound and never modifies this one.
pub fn interpret_limit(draft: Draft, bound: Number, exclusive_sibling: Option<&Value>) -> LimitValue {
    let exclusive = !exclusive_limit_is_standalone(draft)
        && exclusive_sibling.and_then(Value::as_bool).unwrap_or(false);
    LimitValue { limit: bound, exclusive }
}

/// Draft 3 marks a property schema itself as required
pub fn is_flagged_required(schema: SchemaRef<'_>) -> bool {
    schema.draft() == Draft::Draft3
        && matches!(schema.keyword(keys::REQUIRED), Some(SchemaKeyword::BooleanValue(true)))
}
