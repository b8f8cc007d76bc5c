//! The static keyword table

use once_cell::sync::Lazy;
use std::collections::HashMap;

use super::{Draft, DraftSet, JsonType, KeywordMetadata, ShapeVariant, ValueShape};

/// Keyword names
pub mod keys {
    pub const SCHEMA: &str = "$schema";
    pub const ID: &str = "$id";
    pub const ID_LEGACY: &str = "id";
    pub const REF: &str = "$ref";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const DEFAULT: &str = "default";
    pub const EXAMPLES: &str = "examples";
    pub const DEFINITIONS: &str = "definitions";
    pub const TYPE: &str = "type";
    pub const DISALLOW: &str = "disallow";
    pub const EXTENDS: &str = "extends";
    pub const ENUM: &str = "enum";
    pub const CONST: &str = "const";
    pub const MULTIPLE_OF: &str = "multipleOf";
    pub const DIVISIBLE_BY: &str = "divisibleBy";
    pub const MAXIMUM: &str = "maximum";
    pub const EXCLUSIVE_MAXIMUM: &str = "exclusiveMaximum";
    pub const MINIMUM: &str = "minimum";
    pub const EXCLUSIVE_MINIMUM: &str = "exclusiveMinimum";
    pub const MAX_LENGTH: &str = "maxLength";
    pub const MIN_LENGTH: &str = "minLength";
    pub const PATTERN: &str = "pattern";
    pub const FORMAT: &str = "format";
    pub const ITEMS: &str = "items";
    pub const ADDITIONAL_ITEMS: &str = "additionalItems";
    pub const MAX_ITEMS: &str = "maxItems";
    pub const MIN_ITEMS: &str = "minItems";
    pub const UNIQUE_ITEMS: &str = "uniqueItems";
    pub const CONTAINS: &str = "contains";
    pub const MAX_PROPERTIES: &str = "maxProperties";
    pub const MIN_PROPERTIES: &str = "minProperties";
    pub const REQUIRED: &str = "required";
    pub const PROPERTIES: &str = "properties";
    pub const PATTERN_PROPERTIES: &str = "patternProperties";
    pub const ADDITIONAL_PROPERTIES: &str = "additionalProperties";
    pub const DEPENDENCIES: &str = "dependencies";
    pub const PROPERTY_NAMES: &str = "propertyNames";
    pub const ALL_OF: &str = "allOf";
    pub const ANY_OF: &str = "anyOf";
    pub const ONE_OF: &str = "oneOf";
    pub const NOT: &str = "not";
}

const ANY_TYPE: &[JsonType] = &[];
const NUMBER: &[JsonType] = &[JsonType::Number];
const STRING: &[JsonType] = &[JsonType::String];
const ARRAY: &[JsonType] = &[JsonType::Array];
const OBJECT: &[JsonType] = &[JsonType::Object];

const fn keyword(
    key: &'static str,
    drafts: DraftSet,
    instance_types: &'static [JsonType],
    shape: ValueShape,
) -> KeywordMetadata {
    KeywordMetadata {
        key,
        drafts,
        instance_types,
        shape,
        variants: &[],
    }
}

const fn varying(
    key: &'static str,
    drafts: DraftSet,
    instance_types: &'static [JsonType],
    shape: ValueShape,
    variants: &'static [ShapeVariant],
) -> KeywordMetadata {
    KeywordMetadata {
        key,
        drafts,
        instance_types,
        shape,
        variants,
    }
}

// --- Core / annotation keywords ---

pub static SCHEMA: KeywordMetadata = keyword(keys::SCHEMA, DraftSet::ALL, ANY_TYPE, ValueShape::UriReference);
pub static ID: KeywordMetadata = keyword(keys::ID, DraftSet::DRAFT6, ANY_TYPE, ValueShape::UriReference);
pub static ID_LEGACY: KeywordMetadata = keyword(keys::ID_LEGACY, DraftSet::DRAFT3_4, ANY_TYPE, ValueShape::UriReference);
pub static REF: KeywordMetadata = keyword(keys::REF, DraftSet::ALL, ANY_TYPE, ValueShape::UriReference);
pub static TITLE: KeywordMetadata = keyword(keys::TITLE, DraftSet::ALL, ANY_TYPE, ValueShape::String);
pub static DESCRIPTION: KeywordMetadata = keyword(keys::DESCRIPTION, DraftSet::ALL, ANY_TYPE, ValueShape::String);
pub static DEFAULT: KeywordMetadata = keyword(keys::DEFAULT, DraftSet::ALL, ANY_TYPE, ValueShape::Any);
pub static EXAMPLES: KeywordMetadata = keyword(keys::EXAMPLES, DraftSet::DRAFT6, ANY_TYPE, ValueShape::Array);
pub static DEFINITIONS: KeywordMetadata = keyword(keys::DEFINITIONS, DraftSet::ALL, ANY_TYPE, ValueShape::SchemaMap);

// --- Any-type validation ---

pub static TYPE: KeywordMetadata = keyword(keys::TYPE, DraftSet::ALL, ANY_TYPE, ValueShape::TypeSet);
pub static DISALLOW: KeywordMetadata = keyword(keys::DISALLOW, DraftSet::DRAFT3, ANY_TYPE, ValueShape::TypeSet);
pub static EXTENDS: KeywordMetadata = keyword(keys::EXTENDS, DraftSet::DRAFT3, ANY_TYPE, ValueShape::SchemaOrSchemaArray);
pub static ENUM: KeywordMetadata = keyword(keys::ENUM, DraftSet::ALL, ANY_TYPE, ValueShape::NonEmptyArray);
pub static CONST: KeywordMetadata = keyword(keys::CONST, DraftSet::DRAFT6, ANY_TYPE, ValueShape::Any);
pub static ALL_OF: KeywordMetadata = keyword(keys::ALL_OF, DraftSet::DRAFT4_6, ANY_TYPE, ValueShape::SchemaArray);
pub static ANY_OF: KeywordMetadata = keyword(keys::ANY_OF, DraftSet::DRAFT4_6, ANY_TYPE, ValueShape::SchemaArray);
pub static ONE_OF: KeywordMetadata = keyword(keys::ONE_OF, DraftSet::DRAFT4_6, ANY_TYPE, ValueShape::SchemaArray);
pub static NOT: KeywordMetadata = keyword(keys::NOT, DraftSet::DRAFT4_6, ANY_TYPE, ValueShape::Schema);

// --- Numbers ---

pub static MULTIPLE_OF: KeywordMetadata = keyword(keys::MULTIPLE_OF, DraftSet::DRAFT4_6, NUMBER, ValueShape::PositiveNumber);
pub static DIVISIBLE_BY: KeywordMetadata = keyword(keys::DIVISIBLE_BY, DraftSet::DRAFT3, NUMBER, ValueShape::PositiveNumber);
pub static MAXIMUM: KeywordMetadata = keyword(keys::MAXIMUM, DraftSet::ALL, NUMBER, ValueShape::Number);
pub static MINIMUM: KeywordMetadata = keyword(keys::MINIMUM, DraftSet::ALL, NUMBER, ValueShape::Number);

const EXCLUSIVE_LIMIT_VARIANTS: &[ShapeVariant] = &[ShapeVariant {
    drafts: DraftSet::DRAFT6,
    shape: ValueShape::Number,
}];

pub static EXCLUSIVE_MAXIMUM: KeywordMetadata = varying(
    keys::EXCLUSIVE_MAXIMUM,
    DraftSet::ALL,
    NUMBER,
    ValueShape::Boolean,
    EXCLUSIVE_LIMIT_VARIANTS,
);
pub static EXCLUSIVE_MINIMUM: KeywordMetadata = varying(
    keys::EXCLUSIVE_MINIMUM,
    DraftSet::ALL,
    NUMBER,
    ValueShape::Boolean,
    EXCLUSIVE_LIMIT_VARIANTS,
);

// --- Strings ---

pub static MAX_LENGTH: KeywordMetadata = keyword(keys::MAX_LENGTH, DraftSet::ALL, STRING, ValueShape::NonNegativeInteger);
pub static MIN_LENGTH: KeywordMetadata = keyword(keys::MIN_LENGTH, DraftSet::ALL, STRING, ValueShape::NonNegativeInteger);
pub static PATTERN: KeywordMetadata = keyword(keys::PATTERN, DraftSet::ALL, STRING, ValueShape::Regex);
pub static FORMAT: KeywordMetadata = keyword(keys::FORMAT, DraftSet::ALL, STRING, ValueShape::String);

// --- Arrays ---

pub static ITEMS: KeywordMetadata = keyword(keys::ITEMS, DraftSet::ALL, ARRAY, ValueShape::SchemaOrSchemaArray);
pub static ADDITIONAL_ITEMS: KeywordMetadata = keyword(keys::ADDITIONAL_ITEMS, DraftSet::ALL, ARRAY, ValueShape::SchemaOrBoolean);
pub static MAX_ITEMS: KeywordMetadata = keyword(keys::MAX_ITEMS, DraftSet::ALL, ARRAY, ValueShape::NonNegativeInteger);
pub static MIN_ITEMS: KeywordMetadata = keyword(keys::MIN_ITEMS, DraftSet::ALL, ARRAY, ValueShape::NonNegativeInteger);
pub static UNIQUE_ITEMS: KeywordMetadata = keyword(keys::UNIQUE_ITEMS, DraftSet::ALL, ARRAY, ValueShape::Boolean);
pub static CONTAINS: KeywordMetadata = keyword(keys::CONTAINS, DraftSet::DRAFT6, ARRAY, ValueShape::Schema);

// --- Objects ---

pub static MAX_PROPERTIES: KeywordMetadata = keyword(keys::MAX_PROPERTIES, DraftSet::DRAFT4_6, OBJECT, ValueShape::NonNegativeInteger);
pub static MIN_PROPERTIES: KeywordMetadata = keyword(keys::MIN_PROPERTIES, DraftSet::DRAFT4_6, OBJECT, ValueShape::NonNegativeInteger);

// draft3 `required` is a boolean flag on the property schema itself; it does
// not constrain the instance the flagged schema is applied to.
pub static REQUIRED: KeywordMetadata = varying(
    keys::REQUIRED,
    DraftSet::ALL,
    OBJECT,
    ValueShape::StringArray,
    &[
        ShapeVariant { drafts: DraftSet::DRAFT3, shape: ValueShape::Boolean },
        ShapeVariant { drafts: DraftSet::DRAFT4, shape: ValueShape::NonEmptyStringArray },
    ],
);
pub static PROPERTIES: KeywordMetadata = keyword(keys::PROPERTIES, DraftSet::ALL, OBJECT, ValueShape::SchemaMap);
pub static PATTERN_PROPERTIES: KeywordMetadata = keyword(keys::PATTERN_PROPERTIES, DraftSet::ALL, OBJECT, ValueShape::SchemaMap);
pub static ADDITIONAL_PROPERTIES: KeywordMetadata = keyword(keys::ADDITIONAL_PROPERTIES, DraftSet::ALL, OBJECT, ValueShape::SchemaOrBoolean);
pub static DEPENDENCIES: KeywordMetadata = keyword(keys::DEPENDENCIES, DraftSet::ALL, OBJECT, ValueShape::Dependencies);
pub static PROPERTY_NAMES: KeywordMetadata = keyword(keys::PROPERTY_NAMES, DraftSet::DRAFT6, OBJECT, ValueShape::Schema);

static KEYWORDS: &[&KeywordMetadata] = &[
    &SCHEMA,
    &ID,
    &ID_LEGACY,
    &REF,
    &TITLE,
    &DESCRIPTION,
    &DEFAULT,
    &EXAMPLES,
    &DEFINITIONS,
    &TYPE,
    &DISALLOW,
    &EXTENDS,
    &ENUM,
    &CONST,
    &ALL_OF,
    &ANY_OF,
    &ONE_OF,
    &NOT,
    &MULTIPLE_OF,
    &DIVISIBLE_BY,
    &MAXIMUM,
    &MINIMUM,
    &EXCLUSIVE_MAXIMUM,
    &EXCLUSIVE_MINIMUM,
    &MAX_LENGTH,
    &MIN_LENGTH,
    &PATTERN,
    &FORMAT,
    &ITEMS,
    &ADDITIONAL_ITEMS,
    &MAX_ITEMS,
    &MIN_ITEMS,
    &UNIQUE_ITEMS,
    &CONTAINS,
    &MAX_PROPERTIES,
    &MIN_PROPERTIES,
    &REQUIRED,
    &PROPERTIES,
    &PATTERN_PROPERTIES,
    &ADDITIONAL_PROPERTIES,
    &DEPENDENCIES,
    &PROPERTY_NAMES,
];

static INDEX: Lazy<HashMap<&'static str, &'static KeywordMetadata>> =
    Lazy::new(|| KEYWORDS.iter().map(|k| (k.key, *k)).collect());

/// Every registered keyword
pub fn all() -> &'static [&'static KeywordMetadata] {
    KEYWORDS
}

/// Metadata by keyword name, regardless of draft
pub fn lookup(key: &str) -> Option<&'static KeywordMetadata> {
    INDEX.get(key).copied()
}

/// Metadata by keyword name, only if the keyword exists in `draft`
pub fn lookup_for_draft(key: &str, draft: Draft) -> Option<&'static KeywordMetadata> {
    lookup(key).filter(|k| k.applies_to_draft(draft))
}

/// Keywords of `draft` that constrain instances of type `ty`
pub fn keywords_for(draft: Draft, ty: JsonType) -> Vec<&'static KeywordMetadata> {
    KEYWORDS
        .iter()
        .copied()
        .filter(|k| k.applies_to_draft(draft) && k.applies_to_type(ty))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        assert_eq!(lookup("minLength").map(|k| k.key), Some("minLength"));
        assert!(lookup("x-custom").is_none());
        assert!(lookup_for_draft("const", Draft::Draft4).is_none());
        assert!(lookup_for_draft("const", Draft::Draft6).is_some());
        assert!(lookup_for_draft("divisibleBy", Draft::Draft3).is_some());
    }

    #[test]
    fn test_keys_are_unique() {
        assert_eq!(INDEX.len(), KEYWORDS.len());
    }

    #[test]
    fn test_shape_variants() {
        assert_eq!(EXCLUSIVE_MINIMUM.shape_for(Draft::Draft4), ValueShape::Boolean);
        assert_eq!(EXCLUSIVE_MINIMUM.shape_for(Draft::Draft6), ValueShape::Number);
        assert_eq!(REQUIRED.shape_for(Draft::Draft3), ValueShape::Boolean);
        assert_eq!(REQUIRED.shape_for(Draft::Draft4), ValueShape::NonEmptyStringArray);
        assert_eq!(REQUIRED.shape_for(Draft::Draft6), ValueShape::StringArray);
    }

    #[test]
    fn test_keywords_for_instance_type() {
        let string_keywords: Vec<_> = keywords_for(Draft::Draft6, JsonType::String)
            .into_iter()
            .map(|k| k.key)
            .collect();
        assert!(string_keywords.contains(&"pattern"));
        assert!(string_keywords.contains(&"enum"));
        assert!(!string_keywords.contains(&"minimum"));

        let integer_keywords = keywords_for(Draft::Draft4, JsonType::Integer);
        assert!(integer_keywords.iter().any(|k| k.key == "multipleOf"));
    }
}
