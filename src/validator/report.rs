//! Validation Report
//!
//! A [`ValidationReport`] collects errors for one `validate` call. Combinator
//! keywords run their subschemas into a disposable child report and then
//! either drop it or fold it into a single aggregate [`ValidationError`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One node of a failure tree.
///
/// Leaves name the violated keyword and have no causes; aggregates have at
/// least one cause and may have no keyword.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[error("{pointer}: {message}")]
pub struct ValidationError {
    /// Instance location, e.g. `#/items/0`
    pub pointer: String,
    /// Schema node that rejected the instance
    pub schema_location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    pub fn leaf(
        pointer: impl Into<String>,
        schema_location: impl Into<String>,
        keyword: &str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            pointer: pointer.into(),
            schema_location: schema_location.into(),
            keyword: Some(keyword.to_string()),
            message: message.into(),
            arguments: Vec::new(),
            causes: Vec::new(),
        }
    }

    pub fn aggregate(
        pointer: impl Into<String>,
        schema_location: impl Into<String>,
        keyword: Option<&str>,
        message: impl Into<String>,
        causes: Vec<ValidationError>,
    ) -> Self {
        Self {
            pointer: pointer.into(),
            schema_location: schema_location.into(),
            keyword: keyword.map(str::to_string),
            message: message.into(),
            arguments: Vec::new(),
            causes,
        }
    }

    #[must_use]
    pub fn with_argument(mut self, arg: impl Into<Value>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.causes.is_empty()
    }

    /// Every leaf of the tree, depth first
    pub fn leaves(&self) -> Vec<&ValidationError> {
        if self.is_leaf() {
            return vec![self];
        }
        self.causes.iter().flat_map(ValidationError::leaves).collect()
    }

    /// `pointer: message` for every leaf
    pub fn all_messages(&self) -> Vec<String> {
        self.leaves()
            .into_iter()
            .map(|e| format!("{}: {}", e.pointer, e.message))
            .collect()
    }

    /// Indented tree rendering, one error per line
    pub fn format_tree(&self) -> String {
        let mut out = String::new();
        self.write_tree(&mut out, 0);
        out
    }

    fn write_tree(&self, out: &mut String, depth: usize) {
        let keyword = self.keyword.as_deref().map(|k| format!(" [{}]", k)).unwrap_or_default();
        out.push_str(&format!("{}{}{}: {}\n", "  ".repeat(depth), self.pointer, keyword, self.message));
        for cause in &self.causes {
            cause.write_tree(out, depth + 1);
        }
    }
}

/// Errors gathered while validating one instance
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A disposable report for trial runs; nothing reaches `self` unless the
    /// caller adds it
    pub fn child(&self) -> ValidationReport {
        ValidationReport::new()
    }

    pub fn add(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// The top-level error of a finished `validate` call
    pub fn error(&self) -> Option<&ValidationError> {
        self.errors.first()
    }

    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Fold everything into one aggregate error owned by a combinator keyword
    pub fn merge(
        self,
        pointer: impl Into<String>,
        schema_location: impl Into<String>,
        keyword: &str,
        message: impl Into<String>,
    ) -> ValidationError {
        ValidationError::aggregate(pointer, schema_location, Some(keyword), message, self.errors)
    }

    /// Collapse into at most one error: nothing, the single error as is, or an
    /// aggregate without keyword when several keywords failed
    pub fn into_error(mut self, pointer: impl Into<String>, schema_location: impl Into<String>) -> Option<ValidationError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            n => Some(ValidationError::aggregate(
                pointer,
                schema_location,
                None,
                format!("{} schema violations found", n),
                self.errors,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_error_shapes() {
        assert!(ValidationReport::new().into_error("#", "#").is_none());

        let mut single = ValidationReport::new();
        single.add(ValidationError::leaf("#/a", "#/properties/a", "type", "Must be of type string"));
        let error = single.into_error("#", "#").unwrap();
        assert_eq!(error.keyword.as_deref(), Some("type"));
        assert!(error.is_leaf());

        let mut several = ValidationReport::new();
        several.add(ValidationError::leaf("#/a", "#/properties/a", "type", "Must be of type string"));
        several.add(ValidationError::leaf("#", "#", "required", "Property \"b\" is required"));
        let error = several.into_error("#", "#").unwrap();
        assert_eq!(error.keyword, None);
        assert_eq!(error.causes.len(), 2);
        assert_eq!(error.leaves().len(), 2);
        assert_eq!(
            error.all_messages(),
            vec!["#/a: Must be of type string", "#: Property \"b\" is required"]
        );
    }

    #[test]
    fn test_serialized_leaf_omits_empty_fields() {
        let leaf = ValidationError::leaf("#", "#", "minimum", "Must be greater than or equal to 2");
        let json = serde_json::to_value(&leaf).unwrap();
        assert!(json.get("causes").is_none());
        assert!(json.get("arguments").is_none());
        assert_eq!(json["keyword"], "minimum");
    }
}
