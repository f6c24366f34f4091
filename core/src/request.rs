//! Request descriptor accumulated locally before being pushed to the engine.
//!
//! # Design
//! `Request` is a mutable builder over plain owned data. Nothing here talks
//! to the engine: `Session::apply` walks the descriptor and performs the
//! per-field calls, so a descriptor can be reused or adjusted between
//! sends. Scalar setters are last-write-wins; `add_header`, `add_cookie`
//! and `add_param` accumulate.

use std::fmt;

use serde::Serialize;

use crate::cookie::{cookie_header, Cookie};
use crate::error::Error;
use crate::headers::Headers;

/// HTTP verb, one per engine dispatch entry point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Options,
    Delete,
    Head,
    Trace,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Options => "OPTIONS",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Trace => "TRACE",
        }
    }

    /// Parse the verb spelling the engine writes into reply envelopes.
    /// Unknown verbs (`CONNECT` included) yield `None`; the model only
    /// carries verbs it can dispatch.
    pub fn from_wire(s: &str) -> Option<Method> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Some(Method::Get),
            "POST" => Some(Method::Post),
            "PUT" => Some(Method::Put),
            "OPTIONS" => Some(Method::Options),
            "DELETE" => Some(Method::Delete),
            "HEAD" => Some(Method::Head),
            "TRACE" => Some(Method::Trace),
            _ => None,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-layer protocol requested from the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Alpn {
    Http10,
    #[default]
    Http11,
    Http2,
}

impl Alpn {
    /// Wire identifier pushed through `set_alpn`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Alpn::Http10 => "http/1.0",
            Alpn::Http11 => "http/1.1",
            Alpn::Http2 => "h2",
        }
    }
}

impl fmt::Display for Alpn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request body in one of the engine's accepted forms.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Raw bytes pushed through `set_bytes`.
    Bytes(Vec<u8>),
    /// Form parameters pushed pair-by-pair through `add_param`.
    Form(Vec<(String, String)>),
    /// Pre-serialized JSON text pushed through `set_json`.
    Json(String),
    /// Plain text pushed through `set_data`.
    Text(String),
}

/// Timeout configuration, serialized as one JSON object for `set_timeout`.
///
/// Durations are seconds; `*_times` are retry counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Timeout {
    pub connect: u64,
    pub read: u64,
    pub write: u64,
    pub handle: u64,
    pub connect_times: u32,
    pub handle_times: u32,
}

impl Default for Timeout {
    fn default() -> Timeout {
        Timeout {
            connect: 3,
            read: 3,
            write: 3,
            handle: 30,
            connect_times: 3,
            handle_times: 3,
        }
    }
}

/// A request described as plain data, applied to the engine by `Session`.
#[derive(Debug, Clone, Default)]
pub struct Request {
    method: Method,
    url: String,
    alpn: Alpn,
    proxy: Option<String>,
    content_type: Option<String>,
    timeout: Timeout,
    headers: Headers,
    raw_cookies: Option<String>,
    body: Option<Body>,
}

impl Request {
    pub fn new() -> Request {
        Request::default()
    }

    pub fn set_method(&mut self, method: Method) -> &mut Request {
        self.method = method;
        self
    }

    pub fn set_url(&mut self, url: &str) -> &mut Request {
        self.url = url.to_string();
        self
    }

    pub fn set_alpn(&mut self, alpn: Alpn) -> &mut Request {
        self.alpn = alpn;
        self
    }

    /// Proxy in the engine's `scheme://host:port` form
    /// (`http://127.0.0.1:10000`, `socks5://127.0.0.1:10001`).
    pub fn set_proxy(&mut self, proxy: &str) -> &mut Request {
        self.proxy = Some(proxy.to_string());
        self
    }

    pub fn set_content_type(&mut self, content_type: &str) -> &mut Request {
        self.content_type = Some(content_type.to_string());
        self
    }

    pub fn set_timeout(&mut self, timeout: Timeout) -> &mut Request {
        self.timeout = timeout;
        self
    }

    /// Append a header; duplicates accumulate.
    pub fn add_header(&mut self, name: &str, value: &str) -> &mut Request {
        self.headers.add(name, value);
        self
    }

    /// Attach one structured cookie. Structured cookies take precedence
    /// over a raw cookie string when the request is applied.
    pub fn add_cookie(&mut self, cookie: Cookie) -> &mut Request {
        self.headers.add_cookie(cookie);
        self
    }

    /// Supply a pre-serialized `Cookie:` header value, used only when no
    /// structured cookies are attached.
    pub fn set_cookie_header(&mut self, raw: &str) -> &mut Request {
        self.raw_cookies = Some(raw.to_string());
        self
    }

    /// Append one form parameter, switching the body to form encoding if it
    /// was anything else.
    pub fn add_param(&mut self, name: &str, value: &str) -> &mut Request {
        match &mut self.body {
            Some(Body::Form(pairs)) => pairs.push((name.to_string(), value.to_string())),
            _ => self.body = Some(Body::Form(vec![(name.to_string(), value.to_string())])),
        }
        self
    }

    /// Append several form parameters at once.
    pub fn add_params<'a, I>(&mut self, pairs: I) -> &mut Request
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in pairs {
            self.add_param(name, value);
        }
        self
    }

    /// Serialize `payload` to JSON and use it as the body.
    pub fn set_json<T: Serialize>(&mut self, payload: &T) -> Result<&mut Request, Error> {
        let json = serde_json::to_string(payload).map_err(|e| Error::Serialization(e.to_string()))?;
        self.body = Some(Body::Json(json));
        Ok(self)
    }

    /// Use plain text as the body.
    pub fn set_data(&mut self, data: &str) -> &mut Request {
        self.body = Some(Body::Text(data.to_string()));
        self
    }

    /// Use raw bytes as the body.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> &mut Request {
        self.body = Some(Body::Bytes(bytes));
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn alpn(&self) -> Alpn {
        self.alpn
    }

    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn timeout(&self) -> &Timeout {
        &self.timeout
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// The `Cookie:` value this request will push, if any: structured
    /// cookies re-serialized when present, otherwise the raw string.
    pub fn resolved_cookie_header(&self) -> Option<String> {
        if !self.headers.cookies().is_empty() {
            return Some(cookie_header(self.headers.cookies()));
        }
        self.raw_cookies.clone()
    }
}
