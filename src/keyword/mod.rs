//! Keyword Registry
//!
//! Static metadata for every keyword the loader recognizes: which drafts it
//! belongs to, which instance types it constrains, and the JSON shape its value
//! must have (optionally varying per draft).
//!
//! The registry is built once and never mutated. The loader consults it to
//! parse keyword values; the validator consults it to skip keywords whose
//! instance type does not match the value under validation.

pub mod registry;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

pub use registry::{all, keywords_for, lookup, lookup_for_draft};

// =============================================================================
// Draft
// =============================================================================

/// A JSON Schema draft revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Draft {
    Draft3,
    Draft4,
    Draft6,
}

impl Draft {
    pub const ALL: [Draft; 3] = [Draft::Draft3, Draft::Draft4, Draft::Draft6];

    /// Detect the draft from a `$schema` URI
    pub fn from_schema_uri(uri: &str) -> Option<Self> {
        let uri = uri.trim_end_matches('#');
        if uri.contains("draft-03") {
            Some(Self::Draft3)
        } else if uri.contains("draft-04") {
            Some(Self::Draft4)
        } else if uri.contains("draft-06") {
            Some(Self::Draft6)
        } else {
            None
        }
    }

    /// Parse a config-style name ("draft4", "4", "draft-04")
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "draft3" | "draft-03" | "3" => Some(Self::Draft3),
            "draft4" | "draft-04" | "4" => Some(Self::Draft4),
            "draft6" | "draft-06" | "6" => Some(Self::Draft6),
            _ => None,
        }
    }

    pub fn meta_schema_uri(&self) -> &'static str {
        match self {
            Self::Draft3 => "http://json-schema.org/draft-03/schema#",
            Self::Draft4 => "http://json-schema.org/draft-04/schema#",
            Self::Draft6 => "http://json-schema.org/draft-06/schema#",
        }
    }

    /// The keyword that rebases resolution scope in this draft
    pub fn id_keyword(&self) -> &'static str {
        match self {
            Self::Draft3 | Self::Draft4 => registry::keys::ID_LEGACY,
            Self::Draft6 => registry::keys::ID,
        }
    }

    /// Whether `true`/`false` are accepted wherever a schema is expected
    pub fn supports_boolean_schemas(&self) -> bool {
        matches!(self, Self::Draft6)
    }

    fn bit(&self) -> u8 {
        match self {
            Self::Draft3 => 0b001,
            Self::Draft4 => 0b010,
            Self::Draft6 => 0b100,
        }
    }
}

impl Default for Draft {
    fn default() -> Self {
        Self::Draft6
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft3 => write!(f, "draft-03"),
            Self::Draft4 => write!(f, "draft-04"),
            Self::Draft6 => write!(f, "draft-06"),
        }
    }
}

/// A set of drafts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftSet(u8);

impl DraftSet {
    pub const ALL: DraftSet = DraftSet(0b111);
    pub const DRAFT3: DraftSet = DraftSet(0b001);
    pub const DRAFT4: DraftSet = DraftSet(0b010);
    pub const DRAFT6: DraftSet = DraftSet(0b100);
    pub const DRAFT3_4: DraftSet = DraftSet(0b011);
    pub const DRAFT4_6: DraftSet = DraftSet(0b110);

    pub fn contains(&self, draft: Draft) -> bool {
        self.0 & draft.bit() != 0
    }

    pub fn drafts(&self) -> impl Iterator<Item = Draft> + '_ {
        Draft::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

// =============================================================================
// Instance types
// =============================================================================

/// Primitive JSON types plus the derived `integer` pseudo-type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Array,
    Boolean,
    Integer,
    Null,
    Number,
    Object,
    String,
}

impl JsonType {
    pub const PRIMITIVES: [JsonType; 6] = [
        JsonType::Array,
        JsonType::Boolean,
        JsonType::Null,
        JsonType::Number,
        JsonType::Object,
        JsonType::String,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "array" => Some(Self::Array),
            "boolean" => Some(Self::Boolean),
            "integer" => Some(Self::Integer),
            "null" => Some(Self::Null),
            "number" => Some(Self::Number),
            "object" => Some(Self::Object),
            "string" => Some(Self::String),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Array => "array",
            Self::Boolean => "boolean",
            Self::Integer => "integer",
            Self::Null => "null",
            Self::Number => "number",
            Self::Object => "object",
            Self::String => "string",
        }
    }

    /// The primitive type of a value. Never returns `Integer`.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Boolean,
            Value::Number(_) => Self::Number,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }

    /// Whether `value` is an instance of this type.
    ///
    /// A number is an `integer` only when it has no fractional part.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (Self::Integer, Value::Number(n)) => is_integral(n),
            (Self::Integer, _) => false,
            (ty, value) => *ty == Self::of(value),
        }
    }
}

impl fmt::Display for JsonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub(crate) fn is_integral(n: &serde_json::Number) -> bool {
    if n.is_i64() || n.is_u64() {
        return true;
    }
    n.as_f64().map(|f| f.is_finite() && f.fract() == 0.0).unwrap_or(false)
}

// =============================================================================
// Value shapes
// =============================================================================

/// The JSON shape a keyword value must have
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    /// Any string
    String,
    /// A string holding a URI reference
    UriReference,
    /// A string holding a regular expression
    Regex,
    /// Any number
    Number,
    /// A number strictly greater than zero
    PositiveNumber,
    /// An integer >= 0
    NonNegativeInteger,
    Boolean,
    /// Any JSON value
    Any,
    /// A non-empty array of arbitrary values
    NonEmptyArray,
    /// An array of arbitrary values
    Array,
    /// An array of unique strings
    StringArray,
    /// A non-empty array of unique strings
    NonEmptyStringArray,
    /// A single schema (an object, or a boolean where the draft allows it)
    Schema,
    /// A schema or a boolean, in every draft
    SchemaOrBoolean,
    /// A non-empty array of schemas
    SchemaArray,
    /// A schema or an array of schemas
    SchemaOrSchemaArray,
    /// An object whose values are schemas
    SchemaMap,
    /// A type name or an array of type names
    TypeSet,
    /// An object whose values are property lists or schemas
    Dependencies,
}

impl ValueShape {
    /// Whether values of this shape contain nested schemas
    pub fn holds_schemas(&self) -> bool {
        matches!(
            self,
            Self::Schema
                | Self::SchemaOrBoolean
                | Self::SchemaArray
                | Self::SchemaOrSchemaArray
                | Self::SchemaMap
                | Self::Dependencies
        )
    }

    /// Human-readable description used in loading diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::UriReference => "a URI reference string",
            Self::Regex => "a regular expression string",
            Self::Number => "a number",
            Self::PositiveNumber => "a number greater than zero",
            Self::NonNegativeInteger => "a non-negative integer",
            Self::Boolean => "a boolean",
            Self::Any => "any value",
            Self::NonEmptyArray => "a non-empty array",
            Self::Array => "an array",
            Self::StringArray => "an array of unique strings",
            Self::NonEmptyStringArray => "a non-empty array of unique strings",
            Self::Schema => "a schema",
            Self::SchemaOrBoolean => "a schema or a boolean",
            Self::SchemaArray => "a non-empty array of schemas",
            Self::SchemaOrSchemaArray => "a schema or an array of schemas",
            Self::SchemaMap => "an object of schemas",
            Self::TypeSet => "a type name or an array of type names",
            Self::Dependencies => "an object of property lists or schemas",
        }
    }
}

// =============================================================================
// Keyword metadata
// =============================================================================

/// A per-draft override of a keyword's value shape
#[derive(Debug, Clone, Copy)]
pub struct ShapeVariant {
    pub drafts: DraftSet,
    pub shape: ValueShape,
}

/// Immutable description of one keyword
#[derive(Debug)]
pub struct KeywordMetadata {
    /// The keyword as it appears in schema documents
    pub key: &'static str,
    /// Drafts in which the keyword is defined
    pub drafts: DraftSet,
    /// Instance types the keyword constrains; empty means every type
    pub instance_types: &'static [JsonType],
    /// Expected value shape unless a variant applies
    pub shape: ValueShape,
    pub variants: &'static [ShapeVariant],
}

impl KeywordMetadata {
    pub fn applies_to_draft(&self, draft: Draft) -> bool {
        self.drafts.contains(draft)
    }

    /// The value shape in effect for `draft`
    pub fn shape_for(&self, draft: Draft) -> ValueShape {
        self.variants
            .iter()
            .find(|v| v.drafts.contains(draft))
            .map(|v| v.shape)
            .unwrap_or(self.shape)
    }

    /// Whether this keyword constrains instances of the given type
    pub fn applies_to_type(&self, ty: JsonType) -> bool {
        if self.instance_types.is_empty() {
            return true;
        }
        let ty = if ty == JsonType::Integer { JsonType::Number } else { ty };
        self.instance_types.contains(&ty)
    }

    /// Whether this keyword should run against `value` at all
    pub fn applies_to(&self, value: &Value) -> bool {
        self.applies_to_type(JsonType::of(value))
    }

    pub fn holds_schemas(&self, draft: Draft) -> bool {
        self.shape_for(draft).holds_schemas()
    }
}

impl PartialEq for KeywordMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for KeywordMetadata {}

impl Hash for KeywordMetadata {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for KeywordMetadata {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KeywordMetadata {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(other.key)
    }
}

impl fmt::Display for KeywordMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key)
    }
}
