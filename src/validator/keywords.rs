//! Keyword validators
//!
//! One [`KeywordValidator`] per keyword present on a schema node. Nested
//! schemas are held as [`ValidatorId`] handles into the compiled arena.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::report::{ValidationError, ValidationReport};
use super::{CompiledValidator, ValidatorId};
use crate::keyword::{registry::keys, JsonType, KeywordMetadata};
use crate::location::InstancePath;
use crate::number::is_multiple_of;
use crate::schema::{json_equal, LimitValue, TypeSet};

#[derive(Debug)]
pub(crate) enum ItemsMode {
    All(ValidatorId),
    Tuple(Vec<ValidatorId>),
}

#[derive(Debug)]
pub(crate) enum Kind {
    // === Any type ===
    Type(TypeSet),
    Disallow(TypeSet),
    Enum(Vec<Value>),
    Const(Value),
    Ref(ValidatorId),
    AllOf(Vec<ValidatorId>),
    AnyOf(Vec<ValidatorId>),
    OneOf(Vec<ValidatorId>),
    Not(ValidatorId),

    // === Numbers ===
    MultipleOf(Number),
    Minimum(LimitValue),
    Maximum(LimitValue),

    // === Strings ===
    MinLength(u64),
    MaxLength(u64),
    Pattern(Regex),
    Format(String),

    // === Arrays ===
    Items {
        items: Option<ItemsMode>,
        additional: Option<ValidatorId>,
    },
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Contains(ValidatorId),

    // === Objects ===
    MinProperties(u64),
    MaxProperties(u64),
    Required(Vec<String>),
    Properties {
        properties: BTreeMap<String, ValidatorId>,
        /// Draft 3 `required: true` on the property schemas
        flagged_required: Vec<String>,
    },
    PatternProperties(Vec<(Regex, ValidatorId)>),
    AdditionalProperties {
        known: BTreeSet<String>,
        patterns: Vec<Regex>,
        schema: ValidatorId,
    },
    PropertyNames(ValidatorId),
    Dependencies {
        properties: BTreeMap<String, BTreeSet<String>>,
        schemas: BTreeMap<String, ValidatorId>,
    },
}

#[derive(Debug)]
pub(crate) struct KeywordValidator {
    pub meta: &'static KeywordMetadata,
    pub kind: Kind,
}

/// What a keyword needs while it runs
pub(crate) struct Context<'v, 'p> {
    pub validator: &'v CompiledValidator,
    pub location: &'v str,
    pub path: &'p InstancePath<'p>,
}

impl Context<'_, '_> {
    fn leaf(&self, keyword: &str, message: String) -> ValidationError {
        ValidationError::leaf(self.path.to_fragment(), self.location, keyword, message)
    }

    fn leaf_at(&self, path: &InstancePath<'_>, keyword: &str, message: String) -> ValidationError {
        ValidationError::leaf(path.to_fragment(), self.location, keyword, message)
    }
}

impl KeywordValidator {
    /// Run against `instance`; the caller has already checked the instance type
    pub(crate) fn validate(&self, cx: &Context<'_, '_>, instance: &Value, report: &mut ValidationReport) {
        let key = self.meta.key;
        match (&self.kind, instance) {
            (Kind::Type(types), value) => {
                if !types.matches(value) {
                    report.add(
                        cx.leaf(key, format!("Must be of type {}, found {}", types, JsonType::of(value)))
                            .with_argument(types.to_string())
                            .with_argument(JsonType::of(value).as_str()),
                    );
                }
            }
            (Kind::Disallow(types), value) => {
                if types.matches(value) {
                    report.add(cx.leaf(key, format!("Must not be of type {}", types)).with_argument(types.to_string()));
                }
            }
            (Kind::Enum(variants), value) => {
                if !variants.iter().any(|v| json_equal(v, value)) {
                    let listed: Vec<String> = variants.iter().map(Value::to_string).collect();
                    report.add(
                        cx.leaf(key, format!("Must be one of {}", listed.join(", ")))
                            .with_argument(Value::Array(variants.clone())),
                    );
                }
            }
            (Kind::Const(expected), value) => {
                if !json_equal(expected, value) {
                    report.add(cx.leaf(key, format!("Must be the constant {}", expected)).with_argument(expected.clone()));
                }
            }
            (Kind::Ref(target), value) => {
                cx.validator.validate_node(*target, value, cx.path, report);
            }
            (Kind::AllOf(branches), value) => {
                let mut trial = report.child();
                let failed = branches
                    .iter()
                    .filter(|b| !cx.validator.validate_node(**b, value, cx.path, &mut trial))
                    .count();
                if failed > 0 {
                    report.add(trial.merge(
                        cx.path.to_fragment(),
                        cx.location,
                        key,
                        format!("Must match all {} schemas, {} failed", branches.len(), failed),
                    ));
                }
            }
            (Kind::AnyOf(branches), value) => {
                let mut trial = report.child();
                for branch in branches {
                    if cx.validator.validate_node(*branch, value, cx.path, &mut trial) {
                        return;
                    }
                }
                report.add(trial.merge(
                    cx.path.to_fragment(),
                    cx.location,
                    key,
                    format!("Must match at least one of {} schemas", branches.len()),
                ));
            }
            (Kind::OneOf(branches), value) => {
                let mut trial = report.child();
                let matched = branches
                    .iter()
                    .filter(|b| cx.validator.validate_node(**b, value, cx.path, &mut trial))
                    .count();
                match matched {
                    1 => {}
                    0 => report.add(
                        trial
                            .merge(
                                cx.path.to_fragment(),
                                cx.location,
                                key,
                                format!("Must match exactly one of {} schemas, matched none", branches.len()),
                            )
                            .with_argument(0),
                    ),
                    n => report.add(
                        cx.leaf(key, format!("Must match exactly one of {} schemas, matched {}", branches.len(), n))
                            .with_argument(n),
                    ),
                }
            }
            (Kind::Not(negated), value) => {
                let mut trial = report.child();
                if cx.validator.validate_node(*negated, value, cx.path, &mut trial) {
                    report.add(cx.leaf(key, "Must not match the schema in 'not'".to_string()));
                }
            }

            (Kind::MultipleOf(divisor), Value::Number(n)) => {
                if !is_multiple_of(n, divisor) {
                    report.add(cx.leaf(key, format!("Must be a multiple of {}", divisor)).with_argument(divisor.clone()));
                }
            }
            (Kind::Minimum(limit), Value::Number(n)) => {
                if !limit.admits_as_minimum(n) {
                    let message = if limit.exclusive {
                        format!("Must be greater than {}", limit.limit)
                    } else {
                        format!("Must be greater than or equal to {}", limit.limit)
                    };
                    report.add(cx.leaf(key, message).with_argument(limit.limit.clone()));
                }
            }
            (Kind::Maximum(limit), Value::Number(n)) => {
                if !limit.admits_as_maximum(n) {
                    let message = if limit.exclusive {
                        format!("Must be less than {}", limit.limit)
                    } else {
                        format!("Must be less than or equal to {}", limit.limit)
                    };
                    report.add(cx.leaf(key, message).with_argument(limit.limit.clone()));
                }
            }

            (Kind::MinLength(min), Value::String(s)) => {
                if (s.chars().count() as u64) < *min {
                    report.add(cx.leaf(key, format!("Minimum length is {}", min)).with_argument(*min));
                }
            }
            (Kind::MaxLength(max), Value::String(s)) => {
                if (s.chars().count() as u64) > *max {
                    report.add(cx.leaf(key, format!("Maximum length is {}", max)).with_argument(*max));
                }
            }
            (Kind::Pattern(pattern), Value::String(s)) => {
                if !pattern.is_match(s) {
                    report.add(
                        cx.leaf(key, format!("Must match the pattern \"{}\"", pattern))
                            .with_argument(pattern.as_str()),
                    );
                }
            }
            (Kind::Format(name), Value::String(s)) => {
                if let Some(format) = cx.validator.formats.get(name) {
                    if !format.is_valid(s) {
                        report.add(cx.leaf(key, format!("Must match the format \"{}\"", name)).with_argument(name.as_str()));
                    }
                }
            }

            (Kind::Items { items, additional }, Value::Array(elements)) => {
                validate_items(cx, items.as_ref(), *additional, elements, report);
            }
            (Kind::MinItems(min), Value::Array(elements)) => {
                if (elements.len() as u64) < *min {
                    report.add(cx.leaf(key, format!("Must have a minimum of {} items", min)).with_argument(*min));
                }
            }
            (Kind::MaxItems(max), Value::Array(elements)) => {
                if (elements.len() as u64) > *max {
                    report.add(cx.leaf(key, format!("Must have a maximum of {} items", max)).with_argument(*max));
                }
            }
            (Kind::UniqueItems, Value::Array(elements)) => {
                if let Some((i, j)) = first_duplicate(elements) {
                    report.add(
                        cx.leaf(key, format!("Items must be unique, items {} and {} are equal", i, j))
                            .with_argument(i)
                            .with_argument(j),
                    );
                }
            }
            (Kind::Contains(schema), Value::Array(elements)) => {
                if *schema == ValidatorId::NEVER {
                    report.add(cx.leaf(key, "No item can match 'contains: false'".to_string()));
                    return;
                }
                let mut trial = report.child();
                for (i, element) in elements.iter().enumerate() {
                    let path = cx.path.push_item(i);
                    if cx.validator.validate_node(*schema, element, &path, &mut trial) {
                        return;
                    }
                }
                let message = "Must contain at least one item matching the 'contains' schema".to_string();
                if trial.is_empty() {
                    report.add(cx.leaf(key, message));
                } else {
                    report.add(trial.merge(cx.path.to_fragment(), cx.location, key, message));
                }
            }

            (Kind::MinProperties(min), Value::Object(object)) => {
                if (object.len() as u64) < *min {
                    report.add(cx.leaf(key, format!("Must have a minimum of {} properties", min)).with_argument(*min));
                }
            }
            (Kind::MaxProperties(max), Value::Object(object)) => {
                if (object.len() as u64) > *max {
                    report.add(cx.leaf(key, format!("Must have a maximum of {} properties", max)).with_argument(*max));
                }
            }
            (Kind::Required(names), Value::Object(object)) => {
                for name in names.iter().filter(|n| !object.contains_key(n.as_str())) {
                    report.add(cx.leaf(key, format!("Property \"{}\" is required", name)).with_argument(name.as_str()));
                }
            }
            (Kind::Properties { properties, flagged_required }, Value::Object(object)) => {
                for (name, schema) in properties {
                    if let Some(value) = object.get(name) {
                        let path = cx.path.push_prop(name);
                        validate_child(cx, *schema, value, &path, key, report);
                    } else if flagged_required.contains(name) {
                        report.add(
                            cx.leaf(keys::REQUIRED, format!("Property \"{}\" is required", name))
                                .with_argument(name.as_str()),
                        );
                    }
                }
            }
            (Kind::PatternProperties(patterns), Value::Object(object)) => {
                for (name, value) in object {
                    for (pattern, schema) in patterns.iter().filter(|(p, _)| p.is_match(name)) {
                        let path = cx.path.push_prop(name);
                        if *schema == ValidatorId::NEVER {
                            report.add(cx.leaf_at(
                                &path,
                                key,
                                format!("Property \"{}\" matching \"{}\" is not allowed", name, pattern),
                            ));
                        } else {
                            cx.validator.validate_node(*schema, value, &path, report);
                        }
                    }
                }
            }
            (Kind::AdditionalProperties { known, patterns, schema }, Value::Object(object)) => {
                validate_additional_properties(cx, known, patterns, *schema, object, report);
            }
            (Kind::PropertyNames(schema), Value::Object(object)) => {
                for name in object.keys() {
                    let path = cx.path.push_prop(name);
                    if *schema == ValidatorId::NEVER {
                        report.add(cx.leaf_at(&path, key, format!("Property name \"{}\" is not allowed", name)));
                    } else {
                        let as_value = Value::String(name.clone());
                        cx.validator.validate_node(*schema, &as_value, &path, report);
                    }
                }
            }
            (Kind::Dependencies { properties, schemas }, Value::Object(object)) => {
                for (trigger, needed) in properties.iter().filter(|(t, _)| object.contains_key(t.as_str())) {
                    let missing: Vec<&str> = needed
                        .iter()
                        .map(String::as_str)
                        .filter(|n| !object.contains_key(*n))
                        .collect();
                    if !missing.is_empty() {
                        report.add(
                            cx.leaf(
                                key,
                                format!(
                                    "If \"{}\" is present, then \"{}\" must also be present",
                                    trigger,
                                    missing.join("\", \"")
                                ),
                            )
                            .with_argument(trigger.as_str())
                            .with_argument(missing),
                        );
                    }
                }
                for (trigger, schema) in schemas.iter().filter(|(t, _)| object.contains_key(t.as_str())) {
                    if *schema == ValidatorId::NEVER {
                        report.add(cx.leaf(key, format!("Property \"{}\" is not allowed", trigger)));
                    } else {
                        cx.validator.validate_node(*schema, instance, cx.path, report);
                    }
                }
            }

            // Type-directed keywords never reach here with another instance type.
            _ => {}
        }
    }
}

/// Validate a nested value; the always-invalid schema is reported against the
/// keyword that led to it instead of its own `not`
fn validate_child(
    cx: &Context<'_, '_>,
    schema: ValidatorId,
    value: &Value,
    path: &InstancePath<'_>,
    keyword: &str,
    report: &mut ValidationReport,
) -> bool {
    if schema == ValidatorId::NEVER {
        report.add(cx.leaf_at(path, keyword, "No value is allowed here".to_string()));
        return false;
    }
    cx.validator.validate_node(schema, value, path, report)
}

fn validate_items(
    cx: &Context<'_, '_>,
    items: Option<&ItemsMode>,
    additional: Option<ValidatorId>,
    elements: &[Value],
    report: &mut ValidationReport,
) {
    let covered = match items {
        None => return,
        Some(ItemsMode::All(schema)) => {
            for (i, element) in elements.iter().enumerate() {
                let path = cx.path.push_item(i);
                validate_child(cx, *schema, element, &path, keys::ITEMS, report);
            }
            return;
        }
        Some(ItemsMode::Tuple(schemas)) => {
            for (i, (schema, element)) in schemas.iter().zip(elements).enumerate() {
                let path = cx.path.push_item(i);
                validate_child(cx, *schema, element, &path, keys::ITEMS, report);
            }
            schemas.len()
        }
    };

    match additional {
        Some(ValidatorId::NEVER) if elements.len() > covered => report.add(
            cx.leaf(
                keys::ADDITIONAL_ITEMS,
                format!("Must have a maximum of {} items, found {}", covered, elements.len()),
            )
            .with_argument(covered),
        ),
        Some(schema) => {
            for (i, element) in elements.iter().enumerate().skip(covered) {
                let path = cx.path.push_item(i);
                cx.validator.validate_node(schema, element, &path, report);
            }
        }
        None => {}
    }
}

fn validate_additional_properties(
    cx: &Context<'_, '_>,
    known: &BTreeSet<String>,
    patterns: &[Regex],
    schema: ValidatorId,
    object: &Map<String, Value>,
    report: &mut ValidationReport,
) {
    let additional = object
        .iter()
        .filter(|(name, _)| !known.contains(name.as_str()) && !patterns.iter().any(|p| p.is_match(name)));
    for (name, value) in additional {
        let path = cx.path.push_prop(name);
        if schema == ValidatorId::NEVER {
            report.add(
                cx.leaf_at(&path, keys::ADDITIONAL_PROPERTIES, format!("Additional property \"{}\" is not allowed", name))
                    .with_argument(name.as_str()),
            );
        } else {
            cx.validator.validate_node(schema, value, &path, report);
        }
    }
}

/// Indexes of the first pair of structurally equal elements
fn first_duplicate(elements: &[Value]) -> Option<(usize, usize)> {
    for (i, a) in elements.iter().enumerate() {
        for (j, b) in elements.iter().enumerate().skip(i + 1) {
            if json_equal(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}
