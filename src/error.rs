//! Error types for schema loading and validation

use thiserror::Error;

use crate::loader::LoadingReport;
use crate::validator::ValidationError;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema loading and validation errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema loading failed with {} error(s)", .0.error_count())]
    Loading(LoadingReport),

    #[error("Failed to fetch document {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid value for keyword '{keyword}': {reason}")]
    InvalidKeyword { keyword: String, reason: String },

    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URI error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl SchemaError {
    pub(crate) fn invalid_keyword(keyword: &str, reason: impl Into<String>) -> Self {
        Self::InvalidKeyword {
            keyword: keyword.to_string(),
            reason: reason.into(),
        }
    }

    /// The loading report, if this error came out of a loading session
    pub fn loading_report(&self) -> Option<&LoadingReport> {
        match self {
            Self::Loading(report) => Some(report),
            _ => None,
        }
    }
}

/// Document fetch errors
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("document not found")]
    NotFound,

    #[error("unsupported URI scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("fetch timed out after {0} ms")]
    Timeout(u64),

    #[error("gave up after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: Box<FetchError> },
}
