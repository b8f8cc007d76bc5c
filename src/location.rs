//! Schema and instance addressing
//!
//! A [`SchemaLocation`] pins a schema node three ways: the resolution scope
//! produced by the `$id` chain, the document the node lives in, and the JSON
//! Pointer from that document's root. The document URI plus the pointer form
//! the canonical URI used as the loader's cache key.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use url::Url;

/// Base URI for documents loaded without an absolute `$id`
pub const DEFAULT_BASE_URI: &str = "json-schema:///";

pub fn default_base_uri() -> Url {
    // A constant, syntactically valid absolute URI.
    Url::parse(DEFAULT_BASE_URI).unwrap_or_else(|_| unreachable!("default base URI is valid"))
}

// =============================================================================
// JSON Pointer
// =============================================================================

/// An RFC 6901 JSON Pointer, stored unescaped
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JsonPointer(Vec<String>);

impl JsonPointer {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse the textual form (`""` or `/a/b~1c`)
    pub fn parse(text: &str) -> Option<Self> {
        if text.is_empty() {
            return Some(Self::root());
        }
        let rest = text.strip_prefix('/')?;
        let mut segments = Vec::new();
        for raw in rest.split('/') {
            segments.push(unescape_segment(raw)?);
        }
        Some(Self(segments))
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.0.push(segment.into());
    }

    #[must_use]
    pub fn join(&self, segment: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.push(segment);
        next
    }

    #[must_use]
    pub fn join_index(&self, index: usize) -> Self {
        self.join(index.to_string())
    }

    #[must_use]
    pub fn concat(&self, other: &JsonPointer) -> Self {
        let mut next = self.clone();
        next.0.extend(other.0.iter().cloned());
        next
    }

    /// Walk `document` along this pointer
    pub fn resolve<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in &self.0 {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => {
                    if segment.starts_with('+') || (segment.len() > 1 && segment.starts_with('0')) {
                        return None;
                    }
                    items.get(segment.parse::<usize>().ok()?)?
                }
                _ => return None,
            };
        }
        Some(current)
    }

    /// The fragment form, `#/a/b`
    pub fn to_fragment(&self) -> String {
        format!("#{}", self)
    }
}

impl fmt::Display for JsonPointer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.0 {
            write!(f, "/{}", escape_segment(segment))?;
        }
        Ok(())
    }
}

pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

fn unescape_segment(raw: &str) -> Option<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '~' {
            match chars.next() {
                Some('0') => out.push('~'),
                Some('1') => out.push('/'),
                _ => return None,
            }
        } else {
            out.push(c);
        }
    }
    Some(out)
}

/// Decode `%XX` escapes in a URI fragment
pub fn percent_decode(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

// =============================================================================
// Schema location
// =============================================================================

/// Where a schema node lives
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaLocation {
    /// Resolution scope after applying every enclosing `$id`
    pub scope: Url,
    /// URI of the containing document, without fragment
    pub document: Url,
    /// Pointer from the document root
    pub pointer: JsonPointer,
}

impl SchemaLocation {
    /// The root of a document
    pub fn document_root(document: Url) -> Self {
        let document = without_fragment(&document);
        Self {
            scope: document.clone(),
            document,
            pointer: JsonPointer::root(),
        }
    }

    /// A child location one segment below this one, inheriting scope
    #[must_use]
    pub fn child(&self, segment: impl Into<String>) -> Self {
        Self {
            scope: self.scope.clone(),
            document: self.document.clone(),
            pointer: self.pointer.join(segment),
        }
    }

    #[must_use]
    pub fn child_index(&self, index: usize) -> Self {
        self.child(index.to_string())
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Url) -> Self {
        self.scope = scope;
        self
    }

    /// `document#pointer`, unique per node; used as cache key
    pub fn canonical_uri(&self) -> String {
        canonical_key(&self.document, &self.pointer)
    }

    /// Short display form: `#/pointer` for the default document, else the canonical URI
    pub fn display_uri(&self) -> String {
        if self.document.as_str() == DEFAULT_BASE_URI {
            self.pointer.to_fragment()
        } else {
            self.canonical_uri()
        }
    }
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_uri())
    }
}

pub(crate) fn canonical_key(document: &Url, pointer: &JsonPointer) -> String {
    format!("{}#{}", without_fragment(document), pointer)
}

pub(crate) fn without_fragment(uri: &Url) -> Url {
    let mut uri = uri.clone();
    uri.set_fragment(None);
    uri
}

// =============================================================================
// Instance paths
// =============================================================================

/// Position inside the instance under validation, built on the stack
#[derive(Debug, Clone, Copy)]
pub enum InstancePath<'a> {
    Root,
    Property(&'a InstancePath<'a>, &'a str),
    Index(&'a InstancePath<'a>, usize),
}

impl<'a> InstancePath<'a> {
    pub fn push_prop(&'a self, name: &'a str) -> InstancePath<'a> {
        InstancePath::Property(self, name)
    }

    pub fn push_item(&'a self, index: usize) -> InstancePath<'a> {
        InstancePath::Index(self, index)
    }

    /// JSON Pointer fragment form, e.g. `#/a/0`
    pub fn to_fragment(&self) -> String {
        let mut segments = Vec::new();
        let mut current = self;
        loop {
            match current {
                InstancePath::Root => break,
                InstancePath::Property(parent, name) => {
                    segments.push(escape_segment(name));
                    current = parent;
                }
                InstancePath::Index(parent, index) => {
                    segments.push(index.to_string());
                    current = parent;
                }
            }
        }
        let mut out = String::from("#");
        for segment in segments.iter().rev() {
            out.push('/');
            out.push_str(segment);
        }
        out
    }
}
