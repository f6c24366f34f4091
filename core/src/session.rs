//! Engine session: handle lifecycle, field pushes, dispatch.
//!
//! # Design
//! A `Session` owns one engine handle from `init` to `destroy`. The handle
//! is never cloned or exposed for keeping, so release-on-drop cannot double
//! up and a closed session cannot be used again; `close()` exists only to
//! make the release explicit at a chosen point.
//!
//! The engine has no error channel besides the reply buffer: failures come
//! back as hex-encoded plaintext, which fails the envelope's JSON stage.
//! `send` therefore decodes first, releases the engine buffer, and then
//! classifies JSON-stage failures by the carried text (timeout wording
//! becomes `Error::Timeout`, other printable text `Error::Engine`, anything
//! else stays a malformed envelope).

use tracing::{debug, trace};

use crate::engine::Engine;
use crate::envelope::Response;
use crate::error::{EnvelopeError, Error, Field};
use crate::request::{Alpn, Body, Method, Request, Timeout};

/// One configured request slot inside the engine.
///
/// Construction allocates the handle; dropping the session releases it.
/// Setters push single fields, `apply` pushes a whole `Request`, and the
/// verb methods dispatch and decode.
#[derive(Debug)]
pub struct Session<E: Engine> {
    engine: E,
    handle: i32,
}

impl<E: Engine> Session<E> {
    /// Allocate a handle on `engine`.
    pub fn new(mut engine: E) -> Result<Session<E>, Error> {
        let handle = engine.init();
        if handle < 0 {
            return Err(Error::Init);
        }
        debug!(handle, "engine handle allocated");
        Ok(Session { engine, handle })
    }

    /// Raw engine handle, for diagnostics only.
    pub fn handle(&self) -> i32 {
        self.handle
    }

    /// Replace the whole header set with a JSON object of name/value pairs.
    pub fn set_header_json(&mut self, header: &str) -> Result<(), Error> {
        let status = self.engine.set_header_json(self.handle, header);
        field_status(Field::SetHeaderJson, status)
    }

    pub fn add_header(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let status = self.engine.add_header(self.handle, name, value);
        field_status(Field::AddHeader, status)
    }

    pub fn set_alpn(&mut self, alpn: Alpn) -> Result<(), Error> {
        let status = self.engine.set_alpn(self.handle, alpn.as_str());
        field_status(Field::SetAlpn, status)
    }

    pub fn set_proxy(&mut self, proxy: &str) -> Result<(), Error> {
        let status = self.engine.set_proxy(self.handle, proxy);
        field_status(Field::SetProxy, status)
    }

    pub fn set_url(&mut self, url: &str) -> Result<(), Error> {
        let status = self.engine.set_url(self.handle, url);
        field_status(Field::SetUrl, status)
    }

    pub fn add_param(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let status = self.engine.add_param(self.handle, name, value);
        field_status(Field::AddParam, status)
    }

    pub fn set_data(&mut self, data: &str) -> Result<(), Error> {
        let status = self.engine.set_data(self.handle, data);
        field_status(Field::SetData, status)
    }

    /// Push pre-serialized JSON text as the body.
    pub fn set_json(&mut self, json: &str) -> Result<(), Error> {
        let status = self.engine.set_json(self.handle, json);
        field_status(Field::SetJson, status)
    }

    pub fn set_content_type(&mut self, content_type: &str) -> Result<(), Error> {
        let status = self.engine.set_content_type(self.handle, content_type);
        field_status(Field::SetContentType, status)
    }

    /// Push a raw `Cookie:` header value (`name=value` pairs joined with
    /// `"; "`).
    pub fn set_cookie(&mut self, cookie: &str) -> Result<(), Error> {
        let status = self.engine.set_cookie(self.handle, cookie);
        field_status(Field::SetCookie, status)
    }

    pub fn add_cookie(&mut self, name: &str, value: &str) -> Result<(), Error> {
        let status = self.engine.add_cookie(self.handle, name, value);
        field_status(Field::AddCookie, status)
    }

    /// Serialize `timeout` to its wire object and push it.
    pub fn set_timeout(&mut self, timeout: &Timeout) -> Result<(), Error> {
        let wire =
            serde_json::to_string(timeout).map_err(|e| Error::Serialization(e.to_string()))?;
        let status = self.engine.set_timeout(self.handle, &wire);
        field_status(Field::SetTimeout, status)
    }

    pub fn set_bytes(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let status = self.engine.set_bytes(self.handle, bytes);
        field_status(Field::SetBytes, status)
    }

    /// Push every field of `request`, stopping at the first rejection.
    ///
    /// Order is fixed: timeout, ALPN, proxy, URL, content type, headers,
    /// cookies, body. The URL is skipped while empty so a descriptor can be
    /// applied before the target is known; cookies follow the
    /// structured-over-raw precedence of
    /// [`Request::resolved_cookie_header`].
    pub fn apply(&mut self, request: &Request) -> Result<(), Error> {
        self.set_timeout(request.timeout())?;
        self.set_alpn(request.alpn())?;
        if let Some(proxy) = request.proxy() {
            self.set_proxy(proxy)?;
        }
        if !request.url().is_empty() {
            self.set_url(request.url())?;
        }
        if let Some(content_type) = request.content_type() {
            self.set_content_type(content_type)?;
        }
        for header in request.headers().iter() {
            self.add_header(&header.name, &header.value)?;
        }
        if let Some(cookies) = request.resolved_cookie_header() {
            self.set_cookie(&cookies)?;
        }
        match request.body() {
            Some(Body::Bytes(bytes)) => self.set_bytes(bytes)?,
            Some(Body::Form(pairs)) => {
                for (name, value) in pairs {
                    self.add_param(name, value)?;
                }
            }
            Some(Body::Json(json)) => self.set_json(json)?,
            Some(Body::Text(text)) => self.set_data(text)?,
            None => {}
        }
        Ok(())
    }

    /// Dispatch the configured request with `method` and decode the reply.
    ///
    /// The engine buffer is released as soon as decoding has consumed it,
    /// on the error path included.
    pub fn send(&mut self, method: Method) -> Result<Response, Error> {
        trace!(handle = self.handle, method = %method, "dispatching request");
        let reply = self.engine.send(self.handle, method);
        let decoded = Response::decode(reply.as_ref());
        drop(reply);
        match decoded {
            Ok(response) => Ok(response),
            Err(EnvelopeError::Json { detail, text }) => Err(classify_reply_text(detail, text)),
            Err(e) => Err(Error::Envelope(e)),
        }
    }

    /// Apply `request` and dispatch it with its own method.
    pub fn execute(&mut self, request: &Request) -> Result<Response, Error> {
        self.apply(request)?;
        self.send(request.method())
    }

    pub fn get(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Get)
    }

    pub fn post(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Post)
    }

    pub fn put(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Put)
    }

    pub fn options(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Options)
    }

    pub fn delete(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Delete)
    }

    pub fn head(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Head)
    }

    pub fn trace(&mut self, url: &str) -> Result<Response, Error> {
        self.set_url(url)?;
        self.send(Method::Trace)
    }

    /// Release the handle now instead of at end of scope.
    pub fn close(self) {}
}

impl<E: Engine> Drop for Session<E> {
    fn drop(&mut self) {
        debug!(handle = self.handle, "releasing engine handle");
        self.engine.destroy(self.handle);
    }
}

fn field_status(field: Field, status: i32) -> Result<(), Error> {
    if status < 0 {
        return Err(Error::FieldSet(field));
    }
    Ok(())
}

/// Decide what a reply that failed the JSON stage actually was.
///
/// The engine writes its own error messages, hex-encoded, through the reply
/// channel. Printable text that does not look like attempted JSON is such a
/// report: timeout wording maps to `Error::Timeout` (the engine's runtime
/// phrases elapsed deadlines as "deadline has elapsed"), the rest to
/// `Error::Engine`. Everything else is a genuinely malformed envelope.
fn classify_reply_text(detail: String, text: String) -> Error {
    let report = text.trim();
    if report.is_empty() || report.starts_with('{') || !is_printable(report) {
        return Error::Envelope(EnvelopeError::Json { detail, text });
    }
    let lowered = report.to_ascii_lowercase();
    if lowered.contains("timeout") || lowered.contains("deadline has elapsed") {
        return Error::Timeout;
    }
    Error::Engine(report.to_string())
}

fn is_printable(s: &str) -> bool {
    s.chars()
        .all(|c| !c.is_control() || c == '\n' || c == '\r' || c == '\t')
}
