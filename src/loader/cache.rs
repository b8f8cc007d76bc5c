//! Schema Cache
//!
//! Session-scoped memo of everything the loader has seen:
//! - finished (or in-progress) schema nodes by canonical URI and by `$id` URI
//! - documents by URI, each with the draft its root declares
//! - an index of `$id` occurrences, built once when a document is first added
//!
//! Registering a node here before its children are loaded is what keeps a
//! self-referential schema from recursing forever.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};
use url::Url;

use crate::keyword::{registry, registry::keys, Draft, ValueShape};
use crate::location::{without_fragment, JsonPointer};
use crate::schema::{draft, SchemaId};

/// A document known to the session
#[derive(Debug, Clone)]
pub struct CachedDocument {
    pub uri: Url,
    pub value: Arc<Value>,
    pub draft: Draft,
}

/// Where an `$id` was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdTarget {
    pub document: Url,
    pub pointer: JsonPointer,
}

#[derive(Debug, Default)]
pub struct SchemaCache {
    schemas: HashMap<String, SchemaId>,
    documents: HashMap<String, CachedDocument>,
    ids: HashMap<String, IdTarget>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Schemas ---

    pub fn schema(&self, key: &str) -> Option<SchemaId> {
        self.schemas.get(key).copied()
    }

    /// Register a node; the first registration of a key wins
    pub fn insert_schema(&mut self, key: impl Into<String>, id: SchemaId) {
        self.schemas.entry(key.into()).or_insert(id);
    }

    pub fn schema_count(&self) -> usize {
        self.schemas.len()
    }

    // --- Documents ---

    pub fn document(&self, uri: &Url) -> Option<&CachedDocument> {
        self.documents.get(without_fragment(uri).as_str())
    }

    pub fn contains_document(&self, uri: &Url) -> bool {
        self.document(uri).is_some()
    }

    /// Add a document and index its `$id`s.
    ///
    /// Malformed `$id`s are skipped here; they are reported when the node
    /// carrying them is loaded. Adding a document twice keeps the first copy.
    pub fn insert_document(&mut self, uri: &Url, value: Arc<Value>, default_draft: Draft) -> bool {
        let uri = normalize(without_fragment(uri));
        if self.documents.contains_key(uri.as_str()) {
            return false;
        }
        let (draft, _) = draft::detect_draft(&value, default_draft);
        debug!(%uri, %draft, "Registering schema document");

        let mut indexer = IdIndexer {
            document: &uri,
            draft,
            ids: &mut self.ids,
        };
        indexer.walk(&value, uri.clone(), JsonPointer::root());

        self.documents.insert(
            uri.to_string(),
            CachedDocument { uri, value, draft },
        );
        true
    }

    // --- $id index ---

    pub fn id_target(&self, uri: &str) -> Option<&IdTarget> {
        self.ids.get(uri)
    }
}

/// Drop an empty fragment so `a.json#` and `a.json` share a key
pub(crate) fn normalize(mut uri: Url) -> Url {
    if uri.fragment() == Some("") {
        uri.set_fragment(None);
    }
    uri
}

struct IdIndexer<'a> {
    document: &'a Url,
    draft: Draft,
    ids: &'a mut HashMap<String, IdTarget>,
}

impl IdIndexer<'_> {
    fn walk(&mut self, value: &Value, scope: Url, pointer: JsonPointer) {
        let Value::Object(map) = value else {
            return;
        };
        // Siblings of $ref are never loaded, so their $ids don't count either.
        if map.contains_key(keys::REF) {
            return;
        }

        let mut scope = scope;
        if let Some(id) = draft::id_of(value, self.draft) {
            match scope.join(id) {
                Ok(resolved) => {
                    let resolved = normalize(resolved);
                    trace!(id = %resolved, %pointer, "Indexed $id");
                    self.ids.entry(resolved.to_string()).or_insert_with(|| IdTarget {
                        document: self.document.clone(),
                        pointer: pointer.clone(),
                    });
                    scope = resolved;
                }
                Err(e) => trace!(id, %pointer, error = %e, "Skipping malformed $id"),
            }
        }

        for (key, child) in map {
            let Some(meta) = registry::lookup_for_draft(key, self.draft) else {
                continue;
            };
            let here = pointer.join(key.as_str());
            match meta.shape_for(self.draft) {
                ValueShape::Schema | ValueShape::SchemaOrBoolean => self.walk(child, scope.clone(), here),
                ValueShape::SchemaArray | ValueShape::SchemaOrSchemaArray => match child {
                    Value::Array(items) => {
                        for (i, item) in items.iter().enumerate() {
                            self.walk(item, scope.clone(), here.join_index(i));
                        }
                    }
                    other => self.walk(other, scope.clone(), here),
                },
                ValueShape::SchemaMap | ValueShape::Dependencies => {
                    if let Value::Object(entries) = child {
                        for (name, entry) in entries {
                            self.walk(entry, scope.clone(), here.join(name.as_str()));
                        }
                    }
                }
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_index() {
        let doc = json!({
            "$id": "http://example.com/root.json",
            "definitions": {
                "a": {"$id": "#foo"},
                "b": {"$id": "other.json", "items": {"$id": "#bar"}},
                "c": {"$ref": "#", "$id": "ignored.json"}
            },
            "properties": {"$id": {"type": "string"}}
        });
        let mut cache = SchemaCache::new();
        let uri = Url::parse("http://example.com/root.json").unwrap();
        assert!(cache.insert_document(&uri, Arc::new(doc), Draft::Draft6));
        assert!(!cache.insert_document(&uri, Arc::new(serde_json::json!({})), Draft::Draft6));

        let foo = cache.id_target("http://example.com/root.json#foo").unwrap();
        assert_eq!(foo.pointer.to_string(), "/definitions/a");
        let other = cache.id_target("http://example.com/other.json").unwrap();
        assert_eq!(other.pointer.to_string(), "/definitions/b");
        let bar = cache.id_target("http://example.com/other.json#bar").unwrap();
        assert_eq!(bar.pointer.to_string(), "/definitions/b/items");
        assert!(cache.id_target("http://example.com/ignored.json").is_none());
        assert!(cache.contains_document(&Url::parse("http://example.com/root.json#/x").unwrap()));
    }

    #[test]
    fn test_first_registration_wins() {
        let mut cache = SchemaCache::new();
        cache.insert_schema("k", SchemaId(5));
        cache.insert_schema("k", SchemaId(6));
        assert_eq!(cache.schema("k"), Some(SchemaId(5)));
        assert_eq!(cache.schema_count(), 1);
    }

    #[test]
    fn test_draft4_uses_legacy_id() {
        let doc = json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "definitions": {"a": {"id": "#legacy"}, "b": {"$id": "#modern"}}
        });
        let mut cache = SchemaCache::new();
        let uri = Url::parse("http://example.com/d4.json").unwrap();
        cache.insert_document(&uri, Arc::new(doc), Draft::Draft6);
        assert!(cache.id_target("http://example.com/d4.json#legacy").is_some());
        assert!(cache.id_target("http://example.com/d4.json#modern").is_none());
        assert_eq!(cache.document(&uri).unwrap().draft, Draft::Draft4);
    }
}
