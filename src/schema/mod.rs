//! Schema Data Model
//!
//! Loaded schemas live in an arena ([`SchemaGraph`]). Nested schemas are
//! referenced by [`SchemaId`] index rather than owned, so `$ref` cycles are
//! just index cycles. Every node is immutable once the loader fills it.
//!
//! Slot 0 holds the always-valid schema (`true`, `{}`) and slot 1 the
//! always-invalid one (`false`); every boolean schema resolves to them.

pub mod builder;
pub mod draft;
pub mod equality;
pub mod values;

pub use builder::SchemaBuilder;
pub use equality::json_equal;
pub use values::{DependenciesValue, Items, ItemsValue, LimitValue, TypeSet};

use serde_json::{Number, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use url::Url;

use crate::error::{Result, SchemaError};
use crate::keyword::{registry, Draft, KeywordMetadata};
use crate::loader::LoadingReport;
use crate::location::SchemaLocation;

/// Index of a schema node inside a [`SchemaGraph`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    /// The always-valid schema
    pub const TRUE: SchemaId = SchemaId(0);
    /// The always-invalid schema
    pub const FALSE: SchemaId = SchemaId(1);

    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema#{}", self.0)
    }
}

// =============================================================================
// Keyword values
// =============================================================================

/// The value of one keyword on a schema node
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaKeyword {
    StringValue(String),
    NumberValue(Number),
    BooleanValue(bool),
    StringSet(BTreeSet<String>),
    JsonArrayValue(Vec<Value>),
    /// `default`, `const`
    JsonValue(Value),
    /// `not`, `propertyNames`, `additionalProperties`, `contains`, `$ref`
    SingleSchema(SchemaId),
    /// `allOf`, `anyOf`, `oneOf`, `extends`
    SchemaList(Vec<SchemaId>),
    /// `properties`, `definitions`, `patternProperties`
    SchemaMap(BTreeMap<String, SchemaId>),
    TypeSet(TypeSet),
    LimitValue(LimitValue),
    ItemsValue(ItemsValue),
    DependenciesValue(DependenciesValue),
}

impl SchemaKeyword {
    /// Nested schema ids, in keyword order
    pub fn subschemas(&self) -> Vec<SchemaId> {
        match self {
            Self::SingleSchema(id) => vec![*id],
            Self::SchemaList(ids) => ids.clone(),
            Self::SchemaMap(map) => map.values().copied().collect(),
            Self::ItemsValue(items) => items.subschemas(),
            Self::DependenciesValue(deps) => deps.schemas.values().copied().collect(),
            _ => Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::StringValue(_) => "string",
            Self::NumberValue(_) => "number",
            Self::BooleanValue(_) => "boolean",
            Self::StringSet(_) => "string set",
            Self::JsonArrayValue(_) => "array",
            Self::JsonValue(_) => "json",
            Self::SingleSchema(_) => "schema",
            Self::SchemaList(_) => "schema list",
            Self::SchemaMap(_) => "schema map",
            Self::TypeSet(_) => "type set",
            Self::LimitValue(_) => "limit",
            Self::ItemsValue(_) => "items",
            Self::DependenciesValue(_) => "dependencies",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::StringValue(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::NumberValue(n) => n.as_u64().or_else(|| {
                n.as_f64()
                    .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
                    .map(|f| f as u64)
            }),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::BooleanValue(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_schema(&self) -> Option<SchemaId> {
        match self {
            Self::SingleSchema(id) => Some(*id),
            _ => None,
        }
    }
}

// =============================================================================
// Schema node
// =============================================================================

/// An immutable schema node: where it came from, its draft, and its keywords
#[derive(Debug, Clone)]
pub struct Schema {
    location: SchemaLocation,
    draft: Draft,
    keywords: BTreeMap<&'static KeywordMetadata, SchemaKeyword>,
}

impl Schema {
    pub(crate) fn from_parts(
        location: SchemaLocation,
        draft: Draft,
        keywords: BTreeMap<&'static KeywordMetadata, SchemaKeyword>,
    ) -> Self {
        Self { location, draft, keywords }
    }

    fn always_valid(location: SchemaLocation) -> Self {
        Self::from_parts(location, Draft::Draft6, BTreeMap::new())
    }

    fn always_invalid(location: SchemaLocation) -> Self {
        let mut keywords = BTreeMap::new();
        keywords.insert(&registry::NOT, SchemaKeyword::SingleSchema(SchemaId::TRUE));
        Self::from_parts(location, Draft::Draft6, keywords)
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.location
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    pub fn keywords(&self) -> impl Iterator<Item = (&'static KeywordMetadata, &SchemaKeyword)> {
        self.keywords.iter().map(|(k, v)| (*k, v))
    }

    pub fn get(&self, keyword: &KeywordMetadata) -> Option<&SchemaKeyword> {
        self.keywords.get(keyword)
    }

    pub fn get_key(&self, key: &str) -> Option<&SchemaKeyword> {
        registry::lookup(key).and_then(|meta| self.keywords.get(meta))
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

    /// Target of `$ref`, if this node is a reference
    pub fn reference(&self) -> Option<SchemaId> {
        self.get(&registry::REF).and_then(SchemaKeyword::as_schema)
    }

    /// Every nested schema id
    pub fn subschemas(&self) -> impl Iterator<Item = SchemaId> + '_ {
        self.keywords.values().flat_map(SchemaKeyword::subschemas)
    }
}

/// Shallow equality: keyword mappings match, nested schemas by id
impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.keywords == other.keywords
    }
}

// =============================================================================
// Arena
// =============================================================================

/// Mutable arena used while a graph is under construction.
///
/// Slots are reserved before their content exists, which lets a descendant
/// refer back to an ancestor that is still being built.
#[derive(Debug)]
pub struct SchemaArena {
    slots: Vec<Option<Schema>>,
    locations: Vec<SchemaLocation>,
}

impl SchemaArena {
    pub fn new(base: &Url) -> Self {
        let location = SchemaLocation::document_root(base.clone());
        let mut arena = Self { slots: Vec::new(), locations: Vec::new() };
        arena.insert(Schema::always_valid(location.clone()));
        arena.insert(Schema::always_invalid(location));
        arena
    }

    /// Reserve a slot whose content will be provided by [`SchemaArena::fill`]
    pub fn reserve(&mut self, location: SchemaLocation) -> SchemaId {
        let id = SchemaId(self.slots.len());
        self.slots.push(None);
        self.locations.push(location);
        id
    }

    pub fn fill(&mut self, id: SchemaId, schema: Schema) -> Result<()> {
        match self.slots.get_mut(id.0) {
            Some(slot @ None) => {
                *slot = Some(schema);
                Ok(())
            }
            Some(Some(_)) => Err(SchemaError::invalid_keyword("$ref", format!("{id} is already filled"))),
            None => Err(SchemaError::invalid_keyword("$ref", format!("{id} was never reserved"))),
        }
    }

    pub fn insert(&mut self, schema: Schema) -> SchemaId {
        let id = SchemaId(self.slots.len());
        self.locations.push(schema.location.clone());
        self.slots.push(Some(schema));
        id
    }

    pub fn location(&self, id: SchemaId) -> Option<&SchemaLocation> {
        self.locations.get(id.0)
    }

    pub fn get(&self, id: SchemaId) -> Option<&Schema> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Freeze into a graph. Every reserved slot must have been filled.
    pub fn finish(self, root: SchemaId, report: LoadingReport) -> Result<SchemaGraph> {
        let mut nodes = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            match slot {
                Some(schema) => nodes.push(schema),
                None => {
                    return Err(SchemaError::invalid_keyword(
                        "$ref",
                        format!("{} at {} was reserved but never built", SchemaId(index), self.locations[index]),
                    ))
                }
            }
        }
        if root.0 >= nodes.len() {
            return Err(SchemaError::invalid_keyword("$ref", format!("root {root} is out of range")));
        }
        for node in &nodes {
            if let Some(bad) = node.subschemas().find(|id| id.0 >= nodes.len()) {
                return Err(SchemaError::invalid_keyword(
                    "$ref",
                    format!("{} refers to unknown {bad}", node.location),
                ));
            }
        }
        Ok(SchemaGraph { nodes, root, report })
    }
}

// =============================================================================
// Graph
// =============================================================================

/// A finished, immutable schema graph
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    nodes: Vec<Schema>,
    root: SchemaId,
    report: LoadingReport,
}

impl SchemaGraph {
    pub fn root(&self) -> SchemaRef<'_> {
        self.node(self.root)
    }

    pub fn root_id(&self) -> SchemaId {
        self.root
    }

    /// Handle for a node; `None` for an id that belongs to another graph
    pub fn get(&self, id: SchemaId) -> Option<SchemaRef<'_>> {
        (id.0 < self.nodes.len()).then(|| self.node(id))
    }

    /// Ids taken from this graph's own keywords are always in range
    pub(crate) fn node(&self, id: SchemaId) -> SchemaRef<'_> {
        SchemaRef { graph: self, id }
    }

    pub(crate) fn schema(&self, id: SchemaId) -> &Schema {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (SchemaId, &Schema)> {
        self.nodes.iter().enumerate().map(|(i, s)| (SchemaId(i), s))
    }

    /// Non-fatal issues recorded while loading
    pub fn report(&self) -> &LoadingReport {
        &self.report
    }
}

/// A schema node together with the graph it belongs to.
///
/// Equality and hashing look only at keyword mappings, following nested
/// schemas through the graph; locations are ignored.
#[derive(Clone, Copy)]
pub struct SchemaRef<'g> {
    graph: &'g SchemaGraph,
    id: SchemaId,
}

impl<'g> SchemaRef<'g> {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn graph(&self) -> &'g SchemaGraph {
        self.graph
    }

    pub fn schema(&self) -> &'g Schema {
        self.graph.schema(self.id)
    }

    pub fn location(&self) -> &'g SchemaLocation {
        self.schema().location()
    }

    pub fn draft(&self) -> Draft {
        self.schema().draft()
    }

    pub fn keyword(&self, key: &str) -> Option<&'g SchemaKeyword> {
        self.schema().get_key(key)
    }

    pub(crate) fn subschema(&self, id: SchemaId) -> SchemaRef<'g> {
        self.graph.node(id)
    }

    pub fn is_always_valid(&self) -> bool {
        self.id == SchemaId::TRUE
    }

    pub fn is_always_invalid(&self) -> bool {
        self.id == SchemaId::FALSE
    }

    /// The `$ref` target, if any
    pub fn reference(&self) -> Option<SchemaRef<'g>> {
        self.schema().reference().map(|id| self.subschema(id))
    }

    /// The schema under `properties/<name>`
    pub fn property(&self, name: &str) -> Option<SchemaRef<'g>> {
        match self.keyword(registry::keys::PROPERTIES)? {
            SchemaKeyword::SchemaMap(map) => map.get(name).map(|id| self.subschema(*id)),
            _ => None,
        }
    }

    /// The schema under `definitions/<name>`
    pub fn definition(&self, name: &str) -> Option<SchemaRef<'g>> {
        match self.keyword(registry::keys::DEFINITIONS)? {
            SchemaKeyword::SchemaMap(map) => map.get(name).map(|id| self.subschema(*id)),
            _ => None,
        }
    }
}

impl PartialEq for SchemaRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        equality::schemas_equal(*self, *other)
    }
}

impl Eq for SchemaRef<'_> {}

impl Hash for SchemaRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        equality::hash_schema(*self, state);
    }
}

impl fmt::Debug for SchemaRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRef")
            .field("id", &self.id)
            .field("location", &self.location().display_uri())
            .field("keywords", &self.schema().len())
            .finish()
    }
}
