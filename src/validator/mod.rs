//! Validator Composition Engine
//!
//! [`compile`] turns a [`SchemaGraph`] into a graph of keyword validators once;
//! [`CompiledValidator::validate`] then runs it against any number of
//! instances. Nested schemas are [`ValidatorId`] handles into the compiled
//! arena, so `$ref` recursion compiles to index cycles and terminates.
//!
//! ```
//! use familiar_jsonschema::JsonSchema;
//! use serde_json::json;
//!
//! let schema = JsonSchema::from_value(&json!({"type": "object", "required": ["x"]}))?;
//! let error = schema.validate(&json!({})).unwrap_err();
//! assert_eq!(error.pointer, "#");
//! assert_eq!(error.keyword.as_deref(), Some("required"));
//! # Ok::<(), familiar_jsonschema::SchemaError>(())
//! ```

pub mod format;
mod keywords;
pub mod report;

pub use format::{FormatRegistry, FormatValidator};
pub use report::{ValidationError, ValidationReport};

use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Result, SchemaError};
use crate::keyword::registry::keys;
use crate::loader::{LoaderOptions, SchemaLoader};
use crate::location::InstancePath;
use crate::schema::{draft, Items, Schema, SchemaGraph, SchemaId, SchemaKeyword};
use keywords::{Context, ItemsMode, Kind, KeywordValidator};

/// Index of a compiled schema node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValidatorId(usize);

impl ValidatorId {
    /// Compiled form of the always-valid schema
    pub const ALWAYS: ValidatorId = ValidatorId(0);
    /// Compiled form of the always-invalid schema
    pub const NEVER: ValidatorId = ValidatorId(1);
}

/// Compilation settings
#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub formats: Arc<FormatRegistry>,
    /// When false, `format` is an annotation only
    pub validate_formats: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            formats: Arc::new(FormatRegistry::builtin()),
            validate_formats: true,
        }
    }
}

impl CompileOptions {
    #[must_use]
    pub fn formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = Arc::new(formats);
        self
    }

    #[must_use]
    pub fn validate_formats(mut self, enabled: bool) -> Self {
        self.validate_formats = enabled;
        self
    }
}

// =============================================================================
// Compiled graph
// =============================================================================

#[derive(Debug)]
struct ValidatorNode {
    location: String,
    keywords: Vec<KeywordValidator>,
}

/// An immutable validator graph.
///
/// `validate` only reads the graph, so one instance can serve any number of
/// threads as long as each call has its own report.
pub struct CompiledValidator {
    nodes: Vec<ValidatorNode>,
    root: ValidatorId,
    formats: Arc<FormatRegistry>,
}

impl fmt::Debug for CompiledValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledValidator")
            .field("nodes", &self.nodes.len())
            .field("root", &self.root)
            .finish()
    }
}

impl CompiledValidator {
    /// Validate `instance`, adding at most one error tree to `report`
    pub fn validate(&self, instance: &Value, report: &mut ValidationReport) -> bool {
        self.validate_node(self.root, instance, &InstancePath::Root, report)
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validate(instance, &mut ValidationReport::new())
    }

    /// Number of compiled schema nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Run one node; every failing keyword lands in a local report that is
    /// collapsed into a single error for the caller
    pub(crate) fn validate_node(
        &self,
        id: ValidatorId,
        instance: &Value,
        path: &InstancePath<'_>,
        report: &mut ValidationReport,
    ) -> bool {
        let Some(node) = self.nodes.get(id.0) else {
            return true;
        };
        let cx = Context {
            validator: self,
            location: &node.location,
            path,
        };

        let mut local = report.child();
        for keyword in node.keywords.iter().filter(|k| k.meta.applies_to(instance)) {
            keyword.validate(&cx, instance, &mut local);
        }
        match local.into_error(path.to_fragment(), node.location.as_str()) {
            None => true,
            Some(error) => {
                report.add(error);
                false
            }
        }
    }
}

// =============================================================================
// Compilation
// =============================================================================

/// Compile with the built-in format checkers
pub fn compile(graph: &SchemaGraph) -> Result<CompiledValidator> {
    compile_with(graph, &CompileOptions::default())
}

pub fn compile_with(graph: &SchemaGraph, options: &CompileOptions) -> Result<CompiledValidator> {
    let mut compiler = Compiler::new(graph, options);
    // Boolean schemas take the first two slots.
    compiler.handle(SchemaId::TRUE);
    compiler.handle(SchemaId::FALSE);
    let root = compiler.handle(graph.root_id());

    while let Some(schema) = compiler.queue.pop_front() {
        let node = compiler.compile_node(graph.schema(schema))?;
        let id = compiler.ids[&schema];
        compiler.nodes[id.0] = Some(node);
    }

    let nodes: Vec<ValidatorNode> = compiler.nodes.into_iter().flatten().collect();
    debug!(nodes = nodes.len(), "Compiled validator");
    Ok(CompiledValidator {
        nodes,
        root,
        formats: Arc::clone(&options.formats),
    })
}

struct Compiler<'g> {
    graph: &'g SchemaGraph,
    options: &'g CompileOptions,
    ids: HashMap<SchemaId, ValidatorId>,
    queue: VecDeque<SchemaId>,
    nodes: Vec<Option<ValidatorNode>>,
}

impl<'g> Compiler<'g> {
    fn new(graph: &'g SchemaGraph, options: &'g CompileOptions) -> Self {
        Self {
            graph,
            options,
            ids: HashMap::new(),
            queue: VecDeque::new(),
            nodes: Vec::new(),
        }
    }

    /// The validator slot for a schema, queued for compilation on first sight
    fn handle(&mut self, schema: SchemaId) -> ValidatorId {
        if let Some(id) = self.ids.get(&schema) {
            return *id;
        }
        let id = ValidatorId(self.nodes.len());
        self.nodes.push(None);
        self.ids.insert(schema, id);
        self.queue.push_back(schema);
        id
    }

    fn handles(&mut self, schemas: &[SchemaId]) -> Vec<ValidatorId> {
        schemas.iter().map(|s| self.handle(*s)).collect()
    }

    fn compile_node(&mut self, schema: &Schema) -> Result<ValidatorNode> {
        let location = schema.location().to_string();
        trace!(%location, keywords = schema.len(), "Compiling schema node");

        let mut keywords = Vec::with_capacity(schema.len());
        for (meta, value) in schema.keywords() {
            if let Some(kind) = self.compile_keyword(schema, meta.key, value)? {
                keywords.push(KeywordValidator { meta, kind });
            }
        }
        Ok(ValidatorNode { location, keywords })
    }

    fn compile_keyword(&mut self, schema: &Schema, key: &str, value: &SchemaKeyword) -> Result<Option<Kind>> {
        let kind = match (key, value) {
            (keys::TYPE, SchemaKeyword::TypeSet(types)) => Kind::Type(types.clone()),
            (keys::DISALLOW, SchemaKeyword::TypeSet(types)) => Kind::Disallow(types.clone()),
            (keys::ENUM, SchemaKeyword::JsonArrayValue(values)) => Kind::Enum(values.clone()),
            (keys::CONST, SchemaKeyword::JsonValue(value)) => Kind::Const(value.clone()),
            (keys::REF, SchemaKeyword::SingleSchema(target)) => Kind::Ref(self.handle(*target)),
            (keys::ALL_OF | keys::EXTENDS, SchemaKeyword::SchemaList(list)) => Kind::AllOf(self.handles(list)),
            (keys::ANY_OF, SchemaKeyword::SchemaList(list)) => Kind::AnyOf(self.handles(list)),
            (keys::ONE_OF, SchemaKeyword::SchemaList(list)) => Kind::OneOf(self.handles(list)),
            (keys::NOT, SchemaKeyword::SingleSchema(negated)) => Kind::Not(self.handle(*negated)),

            (keys::MULTIPLE_OF | keys::DIVISIBLE_BY, SchemaKeyword::NumberValue(n)) => Kind::MultipleOf(n.clone()),
            (keys::MINIMUM | keys::EXCLUSIVE_MINIMUM, SchemaKeyword::LimitValue(limit)) => Kind::Minimum(limit.clone()),
            (keys::MAXIMUM | keys::EXCLUSIVE_MAXIMUM, SchemaKeyword::LimitValue(limit)) => Kind::Maximum(limit.clone()),

            (keys::MIN_LENGTH, count) => Kind::MinLength(count_of(key, count)?),
            (keys::MAX_LENGTH, count) => Kind::MaxLength(count_of(key, count)?),
            (keys::PATTERN, SchemaKeyword::StringValue(pattern)) => Kind::Pattern(compile_regex(key, pattern)?),
            (keys::FORMAT, SchemaKeyword::StringValue(name)) => {
                if !self.options.validate_formats {
                    return Ok(None);
                }
                if !self.options.formats.contains(name) {
                    trace!(format = %name, "No checker for format, treating it as an annotation");
                    return Ok(None);
                }
                Kind::Format(name.clone())
            }

            (keys::ITEMS, SchemaKeyword::ItemsValue(items)) => Kind::Items {
                items: match &items.items {
                    Some(Items::All(schema)) => Some(ItemsMode::All(self.handle(*schema))),
                    Some(Items::Tuple(list)) => Some(ItemsMode::Tuple(self.handles(list))),
                    None => None,
                },
                additional: items.additional.map(|s| self.handle(s)),
            },
            (keys::MIN_ITEMS, count) => Kind::MinItems(count_of(key, count)?),
            (keys::MAX_ITEMS, count) => Kind::MaxItems(count_of(key, count)?),
            (keys::UNIQUE_ITEMS, SchemaKeyword::BooleanValue(true)) => Kind::UniqueItems,
            (keys::CONTAINS, SchemaKeyword::SingleSchema(schema)) => Kind::Contains(self.handle(*schema)),

            (keys::MIN_PROPERTIES, count) => Kind::MinProperties(count_of(key, count)?),
            (keys::MAX_PROPERTIES, count) => Kind::MaxProperties(count_of(key, count)?),
            (keys::REQUIRED, SchemaKeyword::StringSet(names)) => Kind::Required(names.iter().cloned().collect()),
            (keys::PROPERTIES, SchemaKeyword::SchemaMap(map)) => {
                let flagged_required = map
                    .iter()
                    .filter(|(_, id)| draft::is_flagged_required(self.graph.node(**id)))
                    .map(|(name, _)| name.clone())
                    .collect();
                let properties = map.iter().map(|(name, id)| (name.clone(), self.handle(*id))).collect();
                Kind::Properties { properties, flagged_required }
            }
            (keys::PATTERN_PROPERTIES, SchemaKeyword::SchemaMap(map)) => {
                let mut patterns = Vec::with_capacity(map.len());
                for (pattern, id) in map {
                    patterns.push((compile_regex(key, pattern)?, self.handle(*id)));
                }
                Kind::PatternProperties(patterns)
            }
            (keys::ADDITIONAL_PROPERTIES, SchemaKeyword::SingleSchema(additional)) => {
                let (known, patterns) = sibling_properties(schema)?;
                Kind::AdditionalProperties {
                    known,
                    patterns,
                    schema: self.handle(*additional),
                }
            }
            (keys::PROPERTY_NAMES, SchemaKeyword::SingleSchema(schema)) => Kind::PropertyNames(self.handle(*schema)),
            (keys::DEPENDENCIES, SchemaKeyword::DependenciesValue(deps)) => Kind::Dependencies {
                properties: deps.properties.clone(),
                schemas: deps.schemas.iter().map(|(name, id)| (name.clone(), self.handle(*id))).collect(),
            },

            // Annotations, `definitions`, draft 3 `required: true` and
            // `uniqueItems: false` have nothing to check.
            _ => return Ok(None),
        };
        trace!(keyword = key, "Compiled keyword validator");
        Ok(Some(kind))
    }
}

fn count_of(key: &str, value: &SchemaKeyword) -> Result<u64> {
    value
        .as_u64()
        .ok_or_else(|| SchemaError::invalid_keyword(key, format!("expected a non-negative integer, got {}", value.kind())))
}

fn compile_regex(key: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| SchemaError::invalid_keyword(key, format!("invalid regex '{}': {}", pattern, e)))
}

/// Names from `properties` and regexes from `patternProperties` on the same node
fn sibling_properties(schema: &Schema) -> Result<(BTreeSet<String>, Vec<Regex>)> {
    let known = match schema.get_key(keys::PROPERTIES) {
        Some(SchemaKeyword::SchemaMap(map)) => map.keys().cloned().collect(),
        _ => BTreeSet::new(),
    };
    let patterns = match schema.get_key(keys::PATTERN_PROPERTIES) {
        Some(SchemaKeyword::SchemaMap(map)) => map
            .keys()
            .map(|p| compile_regex(keys::PATTERN_PROPERTIES, p))
            .collect::<Result<Vec<_>>>()?,
        _ => Vec::new(),
    };
    Ok((known, patterns))
}

// =============================================================================
// Convenience
// =============================================================================

/// A loaded and compiled schema
#[derive(Debug)]
pub struct JsonSchema {
    graph: SchemaGraph,
    validator: CompiledValidator,
}

impl JsonSchema {
    /// Load with default (flexible) options and compile
    pub fn from_value(schema: &Value) -> Result<Self> {
        Self::from_value_with(schema, LoaderOptions::default())
    }

    pub fn from_value_with(schema: &Value, options: LoaderOptions) -> Result<Self> {
        let graph = SchemaLoader::with_options(options).load(schema)?;
        Self::from_graph(graph)
    }

    pub fn from_graph(graph: SchemaGraph) -> Result<Self> {
        let validator = compile(&graph)?;
        Ok(Self { graph, validator })
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn validator(&self) -> &CompiledValidator {
        &self.validator
    }

    /// The single top-level error tree, if the instance is invalid
    pub fn validate(&self, instance: &Value) -> std::result::Result<(), ValidationError> {
        let mut report = ValidationReport::new();
        if self.validator.validate(instance, &mut report) {
            return Ok(());
        }
        Err(report.into_errors().into_iter().next().unwrap_or_else(|| {
            ValidationError::leaf("#", self.graph.root().location().to_string(), keys::NOT, "Instance is invalid")
        }))
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn property_handles(validator: &CompiledValidator, id: ValidatorId) -> BTreeMap<String, ValidatorId> {
        validator.nodes[id.0]
            .keywords
            .iter()
            .find_map(|k| match &k.kind {
                Kind::Properties { properties, .. } => Some(properties.clone()),
                _ => None,
            })
            .unwrap_or_default()
    }

    fn schema(value: Value) -> JsonSchema {
        JsonSchema::from_value(&value).unwrap()
    }

    #[test]
    fn test_compiled_validator_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CompiledValidator>();
        assert_send_sync::<JsonSchema>();
    }

    #[test]
    fn test_boolean_schemas_take_the_first_slots() {
        let compiled = schema(json!({"properties": {"a": true, "b": false}}));
        let validator = compiled.validator();
        let props = property_handles(validator, validator.root);
        assert_eq!(props["a"], ValidatorId::ALWAYS);
        assert_eq!(props["b"], ValidatorId::NEVER);
    }

    #[test]
    fn test_recursive_ref_compiles_to_a_cycle() {
        let compiled = schema(json!({"properties": {"x": {"$ref": "#"}}, "type": "object"}));
        let validator = compiled.validator();
        // true, false, root and the reference node
        assert_eq!(validator.len(), 4);
        assert!(compiled.is_valid(&json!({"x": {"x": {}}})));
        assert!(!compiled.is_valid(&json!({"x": {"x": 1}})));
    }

    #[test]
    fn test_multiple_keyword_failures_aggregate() {
        let compiled = schema(json!({"type": "string", "minLength": 3, "pattern": "^a"}));
        assert!(!compiled.is_valid(&json!(42)));
        let error = compiled.validate(&json!("b")).unwrap_err();
        assert_eq!(error.keyword, None);
        assert_eq!(error.causes.len(), 2);
        assert_eq!(error.message, "2 schema violations found");
    }

    #[test]
    fn test_format_checks_can_be_disabled() {
        let graph = SchemaLoader::new().load(&json!({"format": "email"})).unwrap();
        let strict = compile(&graph).unwrap();
        let lax = compile_with(&graph, &CompileOptions::default().validate_formats(false)).unwrap();
        assert!(!strict.is_valid(&json!("nobody")));
        assert!(lax.is_valid(&json!("nobody")));
        // non-strings are out of scope for format
        assert!(strict.is_valid(&json!(7)));
    }

    #[test]
    fn test_unknown_format_is_ignored() {
        let compiled = schema(json!({"format": "made-up"}));
        assert!(compiled.is_valid(&json!("anything")));
    }
}
