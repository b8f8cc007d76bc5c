//! Loading Session
//!
//! One session turns one root document (plus whatever it references) into a
//! [`SchemaGraph`]. Nodes are reserved in the arena and registered in the
//! cache before their children are parsed, so references back to an
//! ancestor resolve to the ancestor's id instead of loading it again.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::cache::{normalize, SchemaCache};
use super::cycles;
use super::fetch::DocumentFetcher;
use super::report::{IssueCode, LoadingIssue, LoadingReport, Severity};
use super::LoaderOptions;
use crate::error::{Result, SchemaError};
use crate::keyword::{registry, registry::keys, Draft, JsonType, KeywordMetadata};
use crate::location::{canonical_key, percent_decode, without_fragment, JsonPointer, SchemaLocation};
use crate::schema::{draft, SchemaArena, SchemaBuilder, SchemaGraph, SchemaId, SchemaKeyword};

pub(crate) struct LoadingSession<'a> {
    options: &'a LoaderOptions,
    fetcher: &'a dyn DocumentFetcher,
    pub(super) arena: SchemaArena,
    cache: SchemaCache,
    report: LoadingReport,
}

impl<'a> LoadingSession<'a> {
    pub(crate) fn new(options: &'a LoaderOptions, fetcher: &'a dyn DocumentFetcher) -> Self {
        Self {
            options,
            fetcher,
            arena: SchemaArena::new(&options.base_uri),
            cache: SchemaCache::new(),
            report: LoadingReport::new(),
        }
    }

    /// Make a document available to `$ref` resolution without fetching
    pub(crate) fn add_document(&mut self, uri: &Url, document: Arc<Value>) {
        if !self.cache.insert_document(uri, document, self.options.default_draft) {
            trace!(%uri, "Document already registered, keeping the first copy");
        }
    }

    /// Load the schema a URI points at; the URI may carry a fragment
    pub(crate) fn load_entry(&mut self, uri: &Url) -> Result<SchemaId> {
        let origin = SchemaLocation::document_root(uri.clone());
        self.resolve_ref(uri.as_str(), &origin)
    }

    /// Run whole-graph checks and freeze the arena
    pub(crate) fn finish(mut self, root: SchemaId) -> Result<SchemaGraph> {
        for issue in cycles::find_cycles(&self.arena) {
            self.record(issue)?;
        }
        if self.report.has_errors() {
            error!(errors = self.report.error_count(), "Schema loading failed");
            return Err(SchemaError::Loading(self.report));
        }
        info!(
            nodes = self.arena.len(),
            warnings = self.report.warning_count(),
            "Schema loaded"
        );
        self.arena.finish(root, self.report)
    }

    // =========================================================================
    // Issue recording
    // =========================================================================

    /// Record an issue; errors abort in strict mode, fatal codes always do
    pub(crate) fn record(&mut self, issue: LoadingIssue) -> Result<()> {
        if issue.code.is_always_fatal() || (self.options.strict && issue.is_error()) {
            return Err(self.fail(issue));
        }
        match issue.level {
            Severity::Error => error!(code = %issue.code, location = %issue.location, "{}", issue.message),
            Severity::Warning => warn!(code = %issue.code, location = %issue.location, "{}", issue.message),
            Severity::Info => debug!(code = %issue.code, location = %issue.location, "{}", issue.message),
        }
        self.report.push(issue);
        Ok(())
    }

    /// Record an issue and end the session with it
    pub(crate) fn fail(&mut self, issue: LoadingIssue) -> SchemaError {
        error!(code = %issue.code, location = %issue.location, "{}", issue.message);
        self.report.push(issue);
        SchemaError::Loading(std::mem::take(&mut self.report))
    }

    pub(super) fn unknown_keyword_level(&self) -> Severity {
        if self.options.strict {
            Severity::Error
        } else {
            Severity::Warning
        }
    }

    pub(super) fn mismatch(
        &mut self,
        location: &SchemaLocation,
        meta: &KeywordMetadata,
        draft: Draft,
        value: &Value,
    ) -> Result<()> {
        let expected = meta.shape_for(draft).describe();
        let found = JsonType::of(value);
        self.record(
            LoadingIssue::new(
                IssueCode::KeywordTypeMismatch,
                location.to_string(),
                format!("keyword '{}' expects {}, found {}", meta.key, expected, found),
            )
            .with_argument(meta.key)
            .with_argument(expected)
            .with_argument(found.as_str()),
        )
    }

    pub(super) fn invalid(&mut self, location: &SchemaLocation, meta: &KeywordMetadata, reason: String) -> Result<()> {
        self.record(
            LoadingIssue::new(
                IssueCode::InvalidKeyword,
                location.to_string(),
                format!("keyword '{}': {}", meta.key, reason),
            )
            .with_argument(meta.key),
        )
    }

    // =========================================================================
    // Node loading
    // =========================================================================

    /// Load the node at `pointer` inside an already registered document
    pub(super) fn load_pointer(&mut self, document: &Url, pointer: JsonPointer) -> Result<SchemaId> {
        let key = canonical_key(document, &pointer);
        if let Some(id) = self.cache.schema(&key) {
            return Ok(id);
        }
        let Some(cached) = self.cache.document(document) else {
            return Err(self.fail(
                LoadingIssue::new(IssueCode::UnresolvableRef, key.clone(), format!("document '{}' is not loaded", document))
                    .with_argument(key),
            ));
        };
        let (value, draft) = (Arc::clone(&cached.value), cached.draft);

        let Some(node) = pointer.resolve(&value) else {
            return Err(self.fail(
                LoadingIssue::new(IssueCode::UnresolvableRef, key.clone(), format!("nothing at '{}'", key))
                    .with_argument(key),
            ));
        };
        let location = SchemaLocation {
            scope: scope_at(&value, document, &pointer, draft),
            document: without_fragment(document),
            pointer,
        };
        self.load_value(node, location, draft)
    }

    /// Load one schema value found at `location`
    pub(super) fn load_value(&mut self, value: &Value, location: SchemaLocation, draft: Draft) -> Result<SchemaId> {
        let key = location.canonical_uri();
        if let Some(id) = self.cache.schema(&key) {
            return Ok(id);
        }

        let map = match value {
            Value::Bool(valid) => {
                if !draft.supports_boolean_schemas() {
                    self.record(LoadingIssue::new(
                        IssueCode::BooleanSchemaUnsupported,
                        location.to_string(),
                        format!("boolean schemas are not part of {}", draft),
                    ))?;
                }
                let id = if *valid { SchemaId::TRUE } else { SchemaId::FALSE };
                self.cache.insert_schema(key, id);
                return Ok(id);
            }
            Value::Object(map) => map,
            other => {
                self.record(
                    LoadingIssue::new(
                        IssueCode::InvalidSchema,
                        location.to_string(),
                        format!("expected a schema object, found {}", JsonType::of(other)),
                    )
                    .with_argument(JsonType::of(other).as_str()),
                )?;
                self.cache.insert_schema(key, SchemaId::TRUE);
                return Ok(SchemaId::TRUE);
            }
        };

        let id = self.arena.reserve(location.clone());
        self.cache.insert_schema(key, id);
        trace!(%id, location = %location, "Loading schema node");

        let location = self.rebase(map, location, draft, id)?;
        let mut builder = SchemaBuilder::new(location.clone(), draft);

        match map.get(keys::REF) {
            Some(Value::String(reference)) => {
                self.ignore_ref_siblings(map, &location)?;
                let target = self.resolve_ref(reference, &location)?;
                builder.insert(&registry::REF, SchemaKeyword::SingleSchema(target));
            }
            other => {
                if let Some(bad) = other {
                    self.mismatch(&location, &registry::REF, draft, bad)?;
                }
                for (name, child) in map.iter().filter(|(name, _)| name.as_str() != keys::REF) {
                    self.parse_keyword(&mut builder, map, name, child)?;
                }
            }
        }

        let schema = match builder.build() {
            Ok(schema) => schema,
            Err(e) => {
                self.record(LoadingIssue::new(IssueCode::InvalidSchema, location.to_string(), e.to_string()))?;
                SchemaBuilder::new(location, draft).build()?
            }
        };
        self.arena.fill(id, schema)?;
        Ok(id)
    }

    /// Apply the node's own `$id` to its scope and register it under that URI
    fn rebase(
        &mut self,
        map: &Map<String, Value>,
        location: SchemaLocation,
        draft: Draft,
        id: SchemaId,
    ) -> Result<SchemaLocation> {
        if map.contains_key(keys::REF) {
            return Ok(location);
        }
        let Some(Value::String(declared)) = map.get(draft.id_keyword()) else {
            return Ok(location);
        };
        match location.scope.join(declared) {
            Ok(scope) => {
                let scope = normalize(scope);
                debug!(id = %scope, location = %location, "Schema declares $id");
                self.cache.insert_schema(scope.to_string(), id);
                Ok(location.with_scope(scope))
            }
            Err(e) => {
                self.record(
                    LoadingIssue::new(
                        IssueCode::MalformedUri,
                        location.to_string(),
                        format!("'{}' is not a valid URI reference: {}", declared, e),
                    )
                    .with_argument(declared.as_str()),
                )?;
                Ok(location)
            }
        }
    }

    fn ignore_ref_siblings(&mut self, map: &Map<String, Value>, location: &SchemaLocation) -> Result<()> {
        let ignored: Vec<&str> = map.keys().map(String::as_str).filter(|k| *k != keys::REF).collect();
        if ignored.is_empty() {
            return Ok(());
        }
        self.record(
            LoadingIssue::new(
                IssueCode::RefSiblingsIgnored,
                location.to_string(),
                format!("keywords next to $ref are ignored: {}", ignored.join(", ")),
            )
            .with_argument(ignored),
        )
    }

    // =========================================================================
    // Reference resolution
    // =========================================================================

    fn resolve_ref(&mut self, reference: &str, from: &SchemaLocation) -> Result<SchemaId> {
        let origin = from.to_string();
        let target = match from.scope.join(reference) {
            Ok(target) => normalize(target),
            Err(e) => {
                return Err(self.fail(
                    LoadingIssue::new(
                        IssueCode::MalformedUri,
                        origin,
                        format!("$ref '{}' is not a valid URI reference: {}", reference, e),
                    )
                    .with_argument(reference),
                ))
            }
        };
        if let Some(id) = self.cache.schema(target.as_str()) {
            trace!(%target, %id, "Reference already loaded");
            return Ok(id);
        }

        let document = without_fragment(&target);
        let fragment = percent_decode(target.fragment().unwrap_or(""));

        if fragment.is_empty() || fragment.starts_with('/') {
            let Some(relative) = JsonPointer::parse(&fragment) else {
                return Err(self.unresolvable(&origin, &target, "the fragment is not a valid JSON pointer"));
            };
            let (document, base) = self.locate(&document, &origin)?;
            return self.load_pointer(&document, base.concat(&relative));
        }

        // Plain-name fragment: look for a matching `$id` in the target document.
        self.locate(&document, &origin)?;
        match self.cache.id_target(target.as_str()).cloned() {
            Some(found) => self.load_pointer(&found.document, found.pointer),
            None => Err(self.unresolvable(&origin, &target, "no schema declares this id")),
        }
    }

    /// Find the document holding `uri`: a known document, a schema embedded
    /// under that `$id`, or a freshly fetched document
    fn locate(&mut self, uri: &Url, origin: &str) -> Result<(Url, JsonPointer)> {
        if self.cache.contains_document(uri) {
            return Ok((uri.clone(), JsonPointer::root()));
        }
        if let Some(embedded) = self.cache.id_target(uri.as_str()) {
            return Ok((embedded.document.clone(), embedded.pointer.clone()));
        }

        debug!(%uri, "Fetching referenced document");
        match self.fetcher.fetch(uri) {
            Ok(document) => {
                self.add_document(uri, Arc::new(document));
                Ok((uri.clone(), JsonPointer::root()))
            }
            Err(e) => Err(self.fail(
                LoadingIssue::new(
                    IssueCode::FetchFailed,
                    origin.to_string(),
                    format!("failed to fetch '{}': {}", uri, e),
                )
                .with_argument(uri.as_str()),
            )),
        }
    }

    fn unresolvable(&mut self, origin: &str, target: &Url, reason: &str) -> SchemaError {
        self.fail(
            LoadingIssue::new(
                IssueCode::UnresolvableRef,
                origin.to_string(),
                format!("cannot resolve $ref '{}': {}", target, reason),
            )
            .with_argument(target.as_str()),
        )
    }
}

/// Resolution scope in effect for the node at `pointer`, from the `$id`s of
/// its ancestors. The node's own `$id` is applied when it is loaded.
fn scope_at(document: &Value, uri: &Url, pointer: &JsonPointer, draft: Draft) -> Url {
    let mut scope = without_fragment(uri);
    let mut current = document;
    for segment in pointer.segments() {
        if current.get(keys::REF).is_none() {
            if let Some(Ok(joined)) = draft::id_of(current, draft).map(|id| scope.join(id)) {
                scope = normalize(joined);
            }
        }
        let next = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => break,
        }
    }
    scope
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_at_applies_ancestor_ids() {
        let doc = json!({
            "$id": "http://example.com/root.json",
            "definitions": {
                "a": {"$id": "nested/", "properties": {"b": {"$id": "b.json"}}}
            }
        });
        let uri = Url::parse("http://example.com/root.json").unwrap();
        let pointer = JsonPointer::parse("/definitions/a/properties/b").unwrap();
        let scope = scope_at(&doc, &uri, &pointer, Draft::Draft6);
        assert_eq!(scope.as_str(), "http://example.com/nested/");
    }
}
