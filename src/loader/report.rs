//! Loading Report
//!
//! Collects warnings and errors while a schema document is loaded.
//! In flexible mode everything is collected and the session fails at the end
//! if any error was recorded; in strict mode the first error aborts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// =============================================================================
// Issue Codes
// =============================================================================

/// Category of a loading issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    // === Keywords ===
    /// Key is not a keyword of the document's draft
    UnknownKeyword,
    /// Keyword value has the wrong JSON shape
    KeywordTypeMismatch,
    /// Keyword only makes sense next to another keyword that is absent
    MissingKeyword,
    /// Two keywords contradict each other; one is ignored
    ConflictingKeywords,
    /// Keyword value has the right shape but is unusable (bad regex, ...)
    InvalidKeyword,

    // === References ===
    /// `$id` or `$ref` is not a valid URI reference
    MalformedUri,
    /// `$ref` target does not exist
    UnresolvableRef,
    /// Keywords next to `$ref` are not loaded
    RefSiblingsIgnored,
    /// A referenced document could not be fetched
    FetchFailed,

    // === Schemas ===
    /// A schema position holds something other than an object
    InvalidSchema,
    /// Boolean schema used before draft 6
    BooleanSchemaUnsupported,
    /// `$schema` names no known draft
    UnknownVersion,
    /// In-place applicators form a cycle that never consumes the instance
    SchemaCycle,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownKeyword => "keyword.unknown",
            Self::KeywordTypeMismatch => "keyword.type.mismatch",
            Self::MissingKeyword => "keyword.missing",
            Self::ConflictingKeywords => "keyword.conflict",
            Self::InvalidKeyword => "keyword.invalid",
            Self::MalformedUri => "uri.malformed",
            Self::UnresolvableRef => "ref.unresolvable",
            Self::RefSiblingsIgnored => "ref.siblings.ignored",
            Self::FetchFailed => "document.fetch.failed",
            Self::InvalidSchema => "schema.invalid",
            Self::BooleanSchemaUnsupported => "schema.boolean.unsupported",
            Self::UnknownVersion => "schema.version.unknown",
            Self::SchemaCycle => "schema.cycle",
        }
    }

    /// Level used unless the session overrides it
    pub fn default_level(&self) -> Severity {
        match self {
            Self::KeywordTypeMismatch
            | Self::InvalidKeyword
            | Self::MalformedUri
            | Self::UnresolvableRef
            | Self::FetchFailed
            | Self::InvalidSchema
            | Self::SchemaCycle => Severity::Error,

            Self::UnknownKeyword
            | Self::MissingKeyword
            | Self::ConflictingKeywords
            | Self::RefSiblingsIgnored
            | Self::BooleanSchemaUnsupported
            | Self::UnknownVersion => Severity::Warning,
        }
    }

    /// Issues that abort loading no matter the mode
    pub fn is_always_fatal(&self) -> bool {
        matches!(self, Self::UnresolvableRef | Self::FetchFailed)
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Severity
// =============================================================================

/// Issue severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

// =============================================================================
// Loading Issue
// =============================================================================

/// A single loading issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadingIssue {
    pub code: IssueCode,
    pub level: Severity,
    /// URI of the schema node (`#/pointer` inside the default document)
    pub location: String,
    /// Human-readable message
    pub message: String,
    /// Values the message was built from
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
}

impl LoadingIssue {
    pub fn new(code: IssueCode, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            level: code.default_level(),
            location: location.into(),
            message: message.into(),
            arguments: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Severity) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_argument(mut self, arg: impl Into<Value>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == Severity::Error
    }
}

impl fmt::Display for LoadingIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {} ({})", self.code, self.level, self.message, self.location)
    }
}

// =============================================================================
// Loading Report
// =============================================================================

/// Ordered issues from one loading session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoadingReport {
    issues: Vec<LoadingIssue>,
}

impl LoadingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: LoadingIssue) {
        self.issues.push(issue);
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(LoadingIssue::is_error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &LoadingIssue> {
        self.issues.iter().filter(|i| i.level == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &LoadingIssue> {
        self.issues.iter().filter(|i| i.level == Severity::Warning)
    }

    pub fn all(&self) -> &[LoadingIssue] {
        &self.issues
    }

    /// Issues with the given code
    pub fn with_code(&self, code: IssueCode) -> impl Iterator<Item = &LoadingIssue> {
        self.issues.iter().filter(move |i| i.code == code)
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn merge(&mut self, other: LoadingReport) {
        self.issues.extend(other.issues);
    }

    /// Format all issues for display
    pub fn format_all(&self) -> String {
        let mut output = String::new();

        for issue in &self.issues {
            output.push_str(&format!("{}\n", issue));
        }

        if self.has_errors() {
            output.push_str(&format!(
                "\n{} error(s), {} warning(s)\n",
                self.error_count(),
                self.warning_count()
            ));
        } else if !self.is_empty() {
            output.push_str(&format!("\n{} warning(s)\n", self.warning_count()));
        }

        output
    }
}

impl fmt::Display for LoadingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format_all())
    }
}

impl IntoIterator for LoadingReport {
    type Item = LoadingIssue;
    type IntoIter = std::vec::IntoIter<LoadingIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.into_iter()
    }
}

impl<'a> IntoIterator for &'a LoadingReport {
    type Item = &'a LoadingIssue;
    type IntoIter = std::slice::Iter<'a, LoadingIssue>;

    fn into_iter(self) -> Self::IntoIter {
        self.issues.iter()
    }
}
