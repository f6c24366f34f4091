//! Ordered header collection and the envelope ingestion rules.
//!
//! # Design
//! Headers live in a plain `Vec`, not a map: duplicates are legal, order is
//! significant on the wire, and the collection is small. `add` preserves
//! duplicates; `set` is the merging form that updates the first
//! case-insensitive match in place (keeping its original spelling) and
//! drops later duplicates.
//!
//! `from_envelope_keys` is the one place reply headers enter the model. It
//! filters the engine's status-line artifact key, skips the reserved scalar
//! metadata keys, and routes `set-cookie` into structured cookies, so a
//! collection built from an envelope never contains either.

use serde_json::{Map, Value};

use crate::cookie::{parse_cookie_header, Cookie};
use crate::error::EnvelopeError;

/// Envelope keys that carry reply metadata rather than headers.
pub(crate) const RESERVED_KEYS: [&str; 4] = ["uri", "method", "status", "agreement"];

/// One header entry with its original spelling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: &str, value: &str) -> Header {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    /// Case-insensitive name comparison, the header equality the wire uses.
    pub fn name_matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// Insertion-ordered header collection plus the cookies extracted from
/// `set-cookie` entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    headers: Vec<Header>,
    cookies: Vec<Cookie>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers::default()
    }

    /// Append an entry, keeping any existing entries with the same name.
    pub fn add(&mut self, name: &str, value: &str) {
        self.headers.push(Header::new(name, value));
    }

    /// Merge an entry: the first case-insensitive match is updated in place
    /// (its original spelling wins), later duplicates are removed, and a
    /// missing name appends.
    pub fn set(&mut self, name: &str, value: &str) {
        let mut updated = false;
        self.headers.retain_mut(|header| {
            if !header.name_matches(name) {
                return true;
            }
            if updated {
                return false;
            }
            header.value = value.to_string();
            updated = true;
            true
        });
        if !updated {
            self.add(name, value);
        }
    }

    /// First value whose name matches case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name_matches(name))
            .map(|header| header.value.as_str())
    }

    /// Every value whose name matches case-insensitively, in insertion order.
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|header| header.name_matches(name))
            .map(|header| header.value.as_str())
            .collect()
    }

    /// Value of the `location` header, if present.
    pub fn location(&self) -> Option<&str> {
        self.get("location")
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Header> {
        self.headers.iter()
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Attach one structured cookie.
    pub fn add_cookie(&mut self, cookie: Cookie) {
        self.cookies.push(cookie);
    }

    /// Parse a raw `Cookie:` header value and attach every cookie in it.
    pub fn add_cookies_from_str(&mut self, raw: &str) {
        self.cookies.extend(parse_cookie_header(raw));
    }

    /// Cookies attached to this collection, in arrival order.
    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// Ingest the envelope's header object.
    ///
    /// Iteration follows the object's insertion order. Keys are handled in
    /// two steps: a filter pass drops the reserved metadata keys and any
    /// name starting with `HTTP/` (the engine serializes the status line as
    /// a key with an empty value), then the rest are classified. A
    /// case-insensitive `set-cookie` key must hold an array of cookie
    /// objects; every other value must be a scalar, with numbers and bools
    /// stringified. Nested values are a schema error, never dropped.
    pub fn from_envelope_keys(keys: &Map<String, Value>) -> Result<Headers, EnvelopeError> {
        let mut out = Headers::new();
        for (name, value) in keys {
            if RESERVED_KEYS.contains(&name.as_str()) || name.starts_with("HTTP/") {
                continue;
            }
            if name.eq_ignore_ascii_case("set-cookie") {
                let entries = value.as_array().ok_or_else(|| {
                    EnvelopeError::Schema(format!("`{name}` is not an array of cookies"))
                })?;
                for entry in entries {
                    out.cookies.push(Cookie::from_envelope_value(entry)?);
                }
            } else {
                out.headers.push(Header {
                    name: name.clone(),
                    value: scalar_to_string(name, value)?,
                });
            }
        }
        Ok(out)
    }
}

fn scalar_to_string(name: &str, value: &Value) -> Result<String, EnvelopeError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        _ => Err(EnvelopeError::Schema(format!(
            "header `{name}` has a non-scalar value"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &str) -> Map<String, Value> {
        serde_json::from_str::<Value>(raw)
            .unwrap()
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn add_preserves_duplicates_and_order() {
        let mut headers = Headers::new();
        headers.add("accept", "text/html");
        headers.add("x-tag", "one");
        headers.add("x-tag", "two");
        assert_eq!(headers.len(), 3);
        assert_eq!(headers.get_all("x-tag"), vec!["one", "two"]);
    }

    #[test]
    fn set_updates_first_match_and_drops_later_duplicates() {
        let mut headers = Headers::new();
        headers.add("X-Tag", "one");
        headers.add("accept", "text/html");
        headers.add("x-tag", "two");
        headers.set("x-TAG", "three");

        assert_eq!(headers.get_all("x-tag"), vec!["three"]);
        // original spelling of the surviving entry wins
        let first = headers.iter().next().unwrap();
        assert_eq!(first.name, "X-Tag");
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn set_appends_when_absent() {
        let mut headers = Headers::new();
        headers.set("host", "example.com");
        assert_eq!(headers.get("host"), Some("example.com"));
    }

    #[test]
    fn get_is_case_insensitive() {
        let mut headers = Headers::new();
        headers.add("Content-Type", "application/json");
        assert_eq!(headers.get("content-type"), Some("application/json"));
        assert_eq!(headers.get("CONTENT-TYPE"), Some("application/json"));
        assert_eq!(headers.get("missing"), None);
    }

    #[test]
    fn location_reads_the_location_header() {
        let mut headers = Headers::new();
        headers.add("Location", "https://example.com/next");
        assert_eq!(headers.location(), Some("https://example.com/next"));
    }

    #[test]
    fn add_cookies_from_str_parses_the_request_grammar() {
        let mut headers = Headers::new();
        headers.add_cookies_from_str("a=1; flag");
        assert_eq!(headers.cookies().len(), 2);
        assert_eq!(headers.cookies()[0].name, "a");
        assert_eq!(headers.cookies()[1].value, "");
    }

    #[test]
    fn ingest_filters_status_line_artifact() {
        let map = keys(r#"{"HTTP/1.1 200 OK": "", "server": "nginx"}"#);
        let headers = Headers::from_envelope_keys(&map).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("server"), Some("nginx"));
        assert!(headers.iter().all(|h| !h.name.starts_with("HTTP/")));
    }

    #[test]
    fn ingest_skips_reserved_metadata_keys() {
        let map = keys(
            r#"{"uri": "https://example.com", "method": "GET", "status": 200,
                "agreement": "HTTP/1.1", "server": "nginx"}"#,
        );
        let headers = Headers::from_envelope_keys(&map).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("server"), Some("nginx"));
    }

    #[test]
    fn ingest_classifies_set_cookie_case_insensitively() {
        let map = keys(
            r#"{"Set-Cookie": [{"name": "sid", "value": "abc", "age": -1,
                "domain": "", "path": "/", "http_only": true, "secure": false,
                "expires": "", "same_site": "lax", "icpsp": false}]}"#,
        );
        let headers = Headers::from_envelope_keys(&map).unwrap();
        assert!(headers.is_empty());
        assert_eq!(headers.cookies().len(), 1);
        assert_eq!(headers.cookies()[0].name, "sid");
        assert_eq!(headers.cookies()[0].path.as_deref(), Some("/"));
        assert!(headers.cookies()[0].http_only);
    }

    #[test]
    fn ingest_rejects_non_array_set_cookie() {
        let map = keys(r#"{"set-cookie": "sid=abc"}"#);
        let err = Headers::from_envelope_keys(&map).unwrap_err();
        assert!(matches!(err, EnvelopeError::Schema(_)));
    }

    #[test]
    fn ingest_stringifies_numbers_and_bools() {
        let map = keys(r#"{"content-length": 42, "x-cached": true}"#);
        let headers = Headers::from_envelope_keys(&map).unwrap();
        assert_eq!(headers.get("content-length"), Some("42"));
        assert_eq!(headers.get("x-cached"), Some("true"));
    }

    #[test]
    fn ingest_rejects_nested_values() {
        let map = keys(r#"{"x-meta": {"a": 1}}"#);
        let err = Headers::from_envelope_keys(&map).unwrap_err();
        assert!(matches!(err, EnvelopeError::Schema(_)));
    }

    #[test]
    fn ingest_preserves_insertion_order() {
        let map = keys(r#"{"b-first": "1", "a-second": "2", "c-third": "3"}"#);
        let headers = Headers::from_envelope_keys(&map).unwrap();
        let names: Vec<_> = headers.iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["b-first", "a-second", "c-third"]);
    }
}
