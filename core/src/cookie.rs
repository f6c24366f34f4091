//! Cookie model and the `Cookie:` request-header grammar.
//!
//! # Design
//! The engine's reply envelope carries cookies as JSON objects in which an
//! empty string or `-1` means "attribute not set". The model maps those
//! markers to `Option` so callers never have to compare against magic
//! values; `to_envelope_value` reproduces them exactly, which is what the
//! mock engine uses to synthesize wire-faithful replies.
//!
//! Request-side serialization is the plain `name=value; ...` join. Parsing
//! the same grammar is deliberately permissive: an attribute-free flag
//! becomes a cookie with an empty value rather than an error.

use serde_json::{json, Value};

use crate::error::EnvelopeError;

/// `SameSite` cookie attribute. The wire form is lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Wire spelling used in envelope cookie objects.
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "strict",
            SameSite::Lax => "lax",
            SameSite::None => "none",
        }
    }

    /// Parse the wire spelling, case-insensitively. Empty or unknown input
    /// yields `Option::None` (attribute not set).
    pub fn from_wire(s: &str) -> Option<SameSite> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Some(SameSite::Strict),
            "lax" => Some(SameSite::Lax),
            "none" => Some(SameSite::None),
            _ => None,
        }
    }
}

impl std::fmt::Display for SameSite {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cookie with the attributes the engine reports.
///
/// `icpsp` is a non-standard flag the engine forwards verbatim from
/// upstream `Set-Cookie` headers; it is kept under its wire name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub max_age: Option<i64>,
    pub domain: Option<String>,
    pub path: Option<String>,
    pub expires: Option<String>,
    pub same_site: Option<SameSite>,
    pub http_only: bool,
    pub secure: bool,
    pub icpsp: bool,
}

impl Cookie {
    /// Cookie with only a name and value; every attribute unset.
    pub fn new(name: &str, value: &str) -> Cookie {
        Cookie {
            name: name.to_string(),
            value: value.to_string(),
            ..Cookie::default()
        }
    }

    /// Request form, `name=value`.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Build a cookie from one element of the envelope's `set-cookie`
    /// array. `name` and `value` must be strings; `-1` ages and empty
    /// string attributes decode as unset.
    pub fn from_envelope_value(value: &Value) -> Result<Cookie, EnvelopeError> {
        let obj = value
            .as_object()
            .ok_or_else(|| EnvelopeError::Schema("set-cookie entry is not an object".to_string()))?;
        let name = obj
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| EnvelopeError::Schema("cookie entry has no string `name`".to_string()))?;
        let cookie_value = obj
            .get("value")
            .and_then(Value::as_str)
            .ok_or_else(|| EnvelopeError::Schema("cookie entry has no string `value`".to_string()))?;

        Ok(Cookie {
            name: name.to_string(),
            value: cookie_value.to_string(),
            max_age: obj.get("age").and_then(Value::as_i64).filter(|age| *age >= 0),
            domain: non_empty(obj.get("domain")),
            path: non_empty(obj.get("path")),
            expires: non_empty(obj.get("expires")),
            same_site: obj
                .get("same_site")
                .and_then(Value::as_str)
                .and_then(SameSite::from_wire),
            http_only: obj.get("http_only").and_then(Value::as_bool).unwrap_or(false),
            secure: obj.get("secure").and_then(Value::as_bool).unwrap_or(false),
            icpsp: obj.get("icpsp").and_then(Value::as_bool).unwrap_or(false),
        })
    }

    /// Envelope object form, reproducing the engine's unset markers
    /// (`-1` age, empty strings).
    pub fn to_envelope_value(&self) -> Value {
        json!({
            "name": self.name,
            "value": self.value,
            "age": self.max_age.unwrap_or(-1),
            "domain": self.domain.as_deref().unwrap_or(""),
            "path": self.path.as_deref().unwrap_or(""),
            "http_only": self.http_only,
            "secure": self.secure,
            "expires": self.expires.as_deref().unwrap_or(""),
            "same_site": self.same_site.map(|s| s.as_str()).unwrap_or(""),
            "icpsp": self.icpsp,
        })
    }
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Serialize cookies into a `Cookie:` header value, `name=value` pairs
/// joined with `"; "`.
pub fn cookie_header(cookies: &[Cookie]) -> String {
    cookies.iter().map(Cookie::pair).collect::<Vec<_>>().join("; ")
}

/// Parse a raw `Cookie:` header value into structured cookies.
///
/// Splits on `"; "`; within a segment the first `=` separates name from
/// value, so values keep any further `=` characters. A segment without `=`
/// becomes a cookie with an empty value. Empty segments are skipped, never
/// rejected.
pub fn parse_cookie_header(raw: &str) -> Vec<Cookie> {
    raw.split("; ")
        .filter(|segment| !segment.is_empty())
        .map(|segment| match segment.split_once('=') {
            Some((name, value)) => Cookie::new(name, value),
            None => Cookie::new(segment, ""),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_joins_name_and_value() {
        assert_eq!(Cookie::new("sid", "abc123").pair(), "sid=abc123");
    }

    #[test]
    fn cookie_header_joins_with_semicolon_space() {
        let cookies = vec![Cookie::new("a", "1"), Cookie::new("b", "2")];
        assert_eq!(cookie_header(&cookies), "a=1; b=2");
    }

    #[test]
    fn parse_then_serialize_is_identity() {
        let raw = "a=1; b=2";
        assert_eq!(cookie_header(&parse_cookie_header(raw)), raw);
    }

    #[test]
    fn parse_segment_without_equals_gets_empty_value() {
        let cookies = parse_cookie_header("flag");
        assert_eq!(cookies, vec![Cookie::new("flag", "")]);
    }

    #[test]
    fn parse_value_keeps_further_equals_characters() {
        let cookies = parse_cookie_header("tok=a=b=c");
        assert_eq!(cookies[0].name, "tok");
        assert_eq!(cookies[0].value, "a=b=c");
    }

    #[test]
    fn parse_empty_input_yields_no_cookies() {
        assert!(parse_cookie_header("").is_empty());
    }

    #[test]
    fn from_envelope_value_maps_unset_markers_to_none() {
        let entry = json!({
            "name": "sid",
            "value": "abc",
            "age": -1,
            "domain": "",
            "path": "",
            "http_only": false,
            "secure": false,
            "expires": "",
            "same_site": "",
            "icpsp": false,
        });
        let cookie = Cookie::from_envelope_value(&entry).unwrap();
        assert_eq!(cookie, Cookie::new("sid", "abc"));
        assert!(cookie.max_age.is_none());
        assert!(cookie.same_site.is_none());
    }

    #[test]
    fn from_envelope_value_reads_all_attributes() {
        let entry = json!({
            "name": "sid",
            "value": "abc",
            "age": 3600,
            "domain": ".example.com",
            "path": "/",
            "http_only": true,
            "secure": true,
            "expires": "Fri, 19 Dec 2025 03:53:27 GMT",
            "same_site": "none",
            "icpsp": true,
        });
        let cookie = Cookie::from_envelope_value(&entry).unwrap();
        assert_eq!(cookie.max_age, Some(3600));
        assert_eq!(cookie.domain.as_deref(), Some(".example.com"));
        assert_eq!(cookie.path.as_deref(), Some("/"));
        assert_eq!(cookie.expires.as_deref(), Some("Fri, 19 Dec 2025 03:53:27 GMT"));
        assert_eq!(cookie.same_site, Some(SameSite::None));
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert!(cookie.icpsp);
    }

    #[test]
    fn from_envelope_value_missing_name_is_schema_error() {
        let entry = json!({ "value": "abc" });
        let err = Cookie::from_envelope_value(&entry).unwrap_err();
        assert!(matches!(err, EnvelopeError::Schema(_)));
    }

    #[test]
    fn from_envelope_value_non_object_is_schema_error() {
        let err = Cookie::from_envelope_value(&json!("sid=abc")).unwrap_err();
        assert!(matches!(err, EnvelopeError::Schema(_)));
    }

    #[test]
    fn envelope_value_round_trips() {
        let cookie = Cookie {
            max_age: Some(60),
            same_site: Some(SameSite::Lax),
            secure: true,
            ..Cookie::new("k", "v")
        };
        let back = Cookie::from_envelope_value(&cookie.to_envelope_value()).unwrap();
        assert_eq!(back, cookie);
    }

    #[test]
    fn same_site_parses_case_insensitively() {
        assert_eq!(SameSite::from_wire("Strict"), Some(SameSite::Strict));
        assert_eq!(SameSite::from_wire("LAX"), Some(SameSite::Lax));
        assert_eq!(SameSite::from_wire("None"), Some(SameSite::None));
        assert_eq!(SameSite::from_wire(""), None);
        assert_eq!(SameSite::from_wire("weird"), None);
    }
}
