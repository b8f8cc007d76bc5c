//! Schema Loader
//!
//! Turns JSON documents into a [`SchemaGraph`]:
//! - documents can be preloaded by URI (or from a directory) to avoid fetching
//! - `$id` changes the resolution scope, `$ref` is resolved against it
//! - each load runs in a fresh session with its own cache and report
//!
//! ```no_run
//! use familiar_jsonschema::loader::{LoaderOptions, SchemaLoader};
//! use serde_json::json;
//!
//! let loader = SchemaLoader::with_options(LoaderOptions::default().strict(true));
//! let graph = loader.load(&json!({"type": "string", "minLength": 2}))?;
//! assert!(graph.report().is_empty());
//! # Ok::<(), familiar_jsonschema::SchemaError>(())
//! ```

pub mod cache;
mod cycles;
pub mod fetch;
mod parse;
pub mod report;
mod session;

pub use cache::{CachedDocument, IdTarget, SchemaCache};
pub use fetch::{DocumentFetcher, FileFetcher, NoFetcher, RetryingFetcher};
pub use report::{IssueCode, LoadingIssue, LoadingReport, Severity};

use serde_json::Value;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;
use walkdir::WalkDir;

use crate::error::{Result, SchemaError};
use crate::keyword::Draft;
use crate::location::{default_base_uri, without_fragment};
use crate::schema::{draft, SchemaGraph};
use cache::normalize;
use session::LoadingSession;

// =============================================================================
// Options
// =============================================================================

/// Loader settings
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Abort on the first error-level issue
    pub strict: bool,
    /// Draft for documents without a recognized `$schema`
    pub default_draft: Draft,
    /// URI of documents loaded without one
    pub base_uri: Url,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            strict: false,
            default_draft: Draft::default(),
            base_uri: default_base_uri(),
        }
    }
}

impl LoaderOptions {
    #[must_use]
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    #[must_use]
    pub fn default_draft(mut self, draft: Draft) -> Self {
        self.default_draft = draft;
        self
    }

    #[must_use]
    pub fn base_uri(mut self, uri: Url) -> Self {
        self.base_uri = uri;
        self
    }
}

// =============================================================================
// Loader
// =============================================================================

/// Loads schema documents into graphs. Reusable; every load is independent.
pub struct SchemaLoader {
    options: LoaderOptions,
    fetcher: Arc<dyn DocumentFetcher>,
    documents: Vec<(Url, Arc<Value>)>,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SchemaLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaLoader")
            .field("options", &self.options)
            .field("documents", &self.documents.iter().map(|(uri, _)| uri.as_str()).collect::<Vec<_>>())
            .finish()
    }
}

impl SchemaLoader {
    /// Flexible loader that never fetches
    pub fn new() -> Self {
        Self::with_options(LoaderOptions::default())
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Self {
            options,
            fetcher: Arc::new(NoFetcher),
            documents: Vec::new(),
        }
    }

    /// Use `fetcher` for documents that were not preloaded
    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn DocumentFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// Number of preloaded documents
    pub fn preloaded(&self) -> usize {
        self.documents.len()
    }

    /// Make `document` available under `uri` to every later load
    pub fn preload(&mut self, uri: &str, document: Value) -> Result<&mut Self> {
        let uri = normalize(without_fragment(&Url::parse(uri)?));
        debug!(%uri, "Preloading schema document");
        self.documents.push((uri, Arc::new(document)));
        Ok(self)
    }

    /// Preload every `*.json` file below `dir`.
    ///
    /// Files are registered under `base` joined with their relative path, or
    /// under their `file://` URI when no base is given. Returns the number of
    /// documents added.
    pub fn preload_dir(&mut self, dir: impl AsRef<Path>, base: Option<&Url>) -> Result<usize> {
        let dir = fs::canonicalize(dir.as_ref())?;
        let mut count = 0;

        for entry in WalkDir::new(&dir).follow_links(true).sort_by_file_name() {
            let entry = entry.map_err(|e| SchemaError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "json") {
                continue;
            }

            let uri = match base {
                Some(base) => {
                    let relative = path.strip_prefix(&dir).unwrap_or(path);
                    let segments: Vec<String> = relative
                        .components()
                        .map(|c| c.as_os_str().to_string_lossy().into_owned())
                        .collect();
                    base.join(&segments.join("/"))?
                }
                None => match Url::from_file_path(path) {
                    Ok(uri) => uri,
                    Err(()) => {
                        warn!(path = %path.display(), "Skipping file without a file:// URI");
                        continue;
                    }
                },
            };

            let content = fs::read_to_string(path)?;
            let document: Value = serde_json::from_str(&content)?;
            self.documents.push((uri, Arc::new(document)));
            count += 1;
        }

        info!(dir = %dir.display(), count, "Preloaded schema directory");
        Ok(count)
    }

    /// Load a schema document that has no URI of its own.
    ///
    /// An absolute root `$id` becomes the document URI; otherwise the
    /// configured base URI is used.
    pub fn load(&self, document: &Value) -> Result<SchemaGraph> {
        let (draft, _) = draft::detect_draft(document, self.options.default_draft);
        let uri = draft::id_of(document, draft)
            .and_then(|id| self.options.base_uri.join(id).ok())
            .unwrap_or_else(|| self.options.base_uri.clone());
        self.load_document(Arc::new(document.clone()), &uri)
    }

    /// Load a schema document under an explicit URI
    pub fn load_with_uri(&self, document: &Value, uri: &Url) -> Result<SchemaGraph> {
        self.load_document(Arc::new(document.clone()), uri)
    }

    /// Load the schema a URI points at, from the preloaded documents or the
    /// fetcher. A fragment selects a subschema.
    pub fn load_uri(&self, uri: &Url) -> Result<SchemaGraph> {
        let document_uri = normalize(without_fragment(uri));
        let document = match self.documents.iter().find(|(known, _)| *known == document_uri) {
            Some((_, document)) => Arc::clone(document),
            None => {
                let fetched = self.fetcher.fetch(&document_uri).map_err(|source| SchemaError::Fetch {
                    uri: document_uri.to_string(),
                    source,
                })?;
                Arc::new(fetched)
            }
        };

        let mut session = self.start_session(&document_uri, document)?;
        let root = session.load_entry(uri)?;
        session.finish(root)
    }

    /// Read and load a schema file; its `file://` URI is the document URI
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<SchemaGraph> {
        let path = fs::canonicalize(path.as_ref())?;
        let content = fs::read_to_string(&path)?;
        let document: Value = serde_json::from_str(&content)?;
        let uri = Url::from_file_path(&path).map_err(|()| {
            SchemaError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} has no file:// URI", path.display()),
            ))
        })?;
        self.load_document(Arc::new(document), &uri)
    }

    fn load_document(&self, document: Arc<Value>, uri: &Url) -> Result<SchemaGraph> {
        let uri = normalize(without_fragment(uri));
        let mut session = self.start_session(&uri, document)?;
        let root = session.load_entry(&uri)?;
        session.finish(root)
    }

    /// New session with the root document registered first, then the
    /// preloaded ones
    fn start_session(&self, uri: &Url, document: Arc<Value>) -> Result<LoadingSession<'_>> {
        let mut session = LoadingSession::new(&self.options, self.fetcher.as_ref());

        let (draft, unknown) = draft::detect_draft(&document, self.options.default_draft);
        if let Some(declared) = unknown {
            session.record(
                LoadingIssue::new(
                    IssueCode::UnknownVersion,
                    uri.to_string(),
                    format!("unrecognized $schema '{}', reading the document as {}", declared, draft),
                )
                .with_argument(declared),
            )?;
        }
        debug!(%uri, %draft, preloaded = self.documents.len(), "Starting loading session");

        session.add_document(uri, document);
        for (known, preloaded) in &self.documents {
            session.add_document(known, Arc::clone(preloaded));
        }
        Ok(session)
    }
}
