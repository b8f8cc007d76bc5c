//! Format checks
//!
//! `format` is advisory: names without a registered checker pass. The default
//! registry covers the draft 3/4/6 formats plus the draft 3 `color`, `phone`,
//! `host-name` and `ip-address` spellings.

use chrono::{DateTime, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::Url;

use crate::location::JsonPointer;

/// Checks one string format
pub trait FormatValidator: Send + Sync {
    fn is_valid(&self, value: &str) -> bool;
}

impl<F> FormatValidator for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_valid(&self, value: &str) -> bool {
        self(value)
    }
}

/// Format checkers by name
#[derive(Clone)]
pub struct FormatRegistry {
    formats: HashMap<String, Arc<dyn FormatValidator>>,
}

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("FormatRegistry").field("formats", &names).finish()
    }
}

impl FormatRegistry {
    /// A registry without any checkers
    pub fn empty() -> Self {
        Self { formats: HashMap::new() }
    }

    /// The standard checkers
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry
            .register("date", is_date)
            .register("time", is_time)
            .register("date-time", is_date_time)
            .register("email", is_email)
            .register("hostname", is_hostname)
            .register("host-name", is_hostname)
            .register("ipv4", is_ipv4)
            .register("ip-address", is_ipv4)
            .register("ipv6", is_ipv6)
            .register("uri", is_uri)
            .register("uri-reference", is_uri_reference)
            .register("uri-template", is_uri_template)
            .register("json-pointer", is_json_pointer)
            .register("regex", is_regex)
            .register("color", is_color)
            .register("phone", is_phone);
        registry
    }

    /// Add or replace the checker for `name`
    pub fn register(&mut self, name: impl Into<String>, validator: impl FormatValidator + 'static) -> &mut Self {
        self.formats.insert(name.into(), Arc::new(validator));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn FormatValidator> {
        self.formats.get(name).map(|v| v.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formats.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.formats.keys().map(String::as_str)
    }
}

// =============================================================================
// Built-in checkers
// =============================================================================

fn is_date(value: &str) -> bool {
    value.len() == 10 && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// `HH:MM:SS` with optional fraction and optional offset
fn is_time(value: &str) -> bool {
    if NaiveTime::parse_from_str(value, "%H:%M:%S%.f").is_ok() {
        return true;
    }
    DateTime::parse_from_rfc3339(&format!("1970-01-01T{}", value)).is_ok()
}

fn is_date_time(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
}

fn is_email(value: &str) -> bool {
    match value.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && local.len() <= 64
                && !local.chars().any(|c| c.is_whitespace() || c == '@')
                && is_hostname(domain)
        }
        None => false,
    }
}

fn is_hostname(value: &str) -> bool {
    let value = value.strip_suffix('.').unwrap_or(value);
    !value.is_empty()
        && value.len() <= 253
        && value.split('.').all(|label| {
            !label.is_empty()
                && label.len() <= 63
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn is_ipv4(value: &str) -> bool {
    value.parse::<Ipv4Addr>().is_ok()
}

fn is_ipv6(value: &str) -> bool {
    value.parse::<Ipv6Addr>().is_ok()
}

fn is_uri(value: &str) -> bool {
    !value.contains(char::is_whitespace) && Url::parse(value).is_ok()
}

static REFERENCE_BASE: Lazy<Option<Url>> = Lazy::new(|| Url::parse("json-schema:///").ok());

fn is_uri_reference(value: &str) -> bool {
    if value.contains(char::is_whitespace) || value.contains('\\') {
        return false;
    }
    match REFERENCE_BASE.as_ref() {
        Some(base) => base.join(value).is_ok(),
        None => Url::parse(value).is_ok(),
    }
}

static URI_TEMPLATE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?:[^{}\s]|\{[+#./;?&=,!@|]?[A-Za-z0-9_%.]+(?::[0-9]+|\*)?(?:,[A-Za-z0-9_%.]+(?::[0-9]+|\*)?)*\})*$").ok());

fn is_uri_template(value: &str) -> bool {
    URI_TEMPLATE.as_ref().map_or(true, |re| re.is_match(value))
}

fn is_json_pointer(value: &str) -> bool {
    JsonPointer::parse(value).is_some()
}

fn is_regex(value: &str) -> bool {
    Regex::new(value).is_ok()
}

const COLOR_NAMES: [&str; 17] = [
    "aqua", "black", "blue", "fuchsia", "gray", "green", "lime", "maroon", "navy", "olive", "orange", "purple",
    "red", "silver", "teal", "white", "yellow",
];

/// CSS 2.1 color: a basic name, `#rgb` or `#rrggbb`
fn is_color(value: &str) -> bool {
    if let Some(hex) = value.strip_prefix('#') {
        return matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    COLOR_NAMES.contains(&value.to_ascii_lowercase().as_str())
}

static PHONE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^\+?[0-9][0-9 ().-]{5,}[0-9]$").ok());

/// E.123-style phone number
fn is_phone(value: &str) -> bool {
    PHONE.as_ref().map_or(true, |re| re.is_match(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_formats() {
        let registry = FormatRegistry::builtin();
        let check = |name: &str, value: &str| registry.get(name).unwrap().is_valid(value);

        assert!(check("date", "2024-02-29"));
        assert!(!check("date", "2023-02-29"));
        assert!(check("date-time", "2024-01-01T12:00:00Z"));
        assert!(!check("date-time", "2024-01-01 12:00"));
        assert!(check("time", "23:59:59"));
        assert!(check("time", "08:30:00.5+02:00"));
        assert!(check("email", "someone@example.com"));
        assert!(!check("email", "nobody"));
        assert!(check("hostname", "api.example.com"));
        assert!(!check("hostname", "-bad-.example"));
        assert!(check("ipv4", "192.168.0.1"));
        assert!(!check("ipv4", "256.0.0.1"));
        assert!(check("ipv6", "::1"));
        assert!(check("uri", "https://example.com/a?b=c"));
        assert!(!check("uri", "/relative/path"));
        assert!(check("uri-reference", "/relative/path"));
        assert!(check("uri-template", "http://example.com/{id}{?q,page}"));
        assert!(!check("uri-template", "http://example.com/{id"));
        assert!(check("json-pointer", "/a/~1b"));
        assert!(!check("json-pointer", "a/b"));
        assert!(!check("regex", "(unclosed"));
        assert!(check("color", "#FF0000"));
        assert!(check("color", "Navy"));
        assert!(!check("color", "#12"));
        assert!(check("phone", "+1 (555) 010-9999"));
        assert!(!check("phone", "call me"));
    }

    #[test]
    fn test_custom_format() {
        let mut registry = FormatRegistry::empty();
        registry.register("even-length", |s: &str| s.len() % 2 == 0);
        assert!(registry.get("even-length").unwrap().is_valid("ab"));
        assert!(registry.get("date").is_none());
    }
}
