//! Decoder for the engine's reply envelope.
//!
//! # Design
//! Every reply crosses the C boundary as one NUL-terminated string:
//! `hex(json)` on the outside so the buffer survives a C string, and a
//! second hex layer around the body so arbitrary bytes never have to be
//! valid UTF-8 inside the JSON. The header object is flat: reserved scalar
//! keys (`uri`, `method`, `status`, `agreement`) sit next to the real
//! header keys and the status-line artifact, and `Headers` ingestion
//! handles the rest.
//!
//! This module only decodes. The engine is the sole producer of envelopes,
//! so there is no encoder here; the mock engine synthesizes its own.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::cookie::Cookie;
use crate::error::{EnvelopeError, Error};
use crate::headers::Headers;
use crate::request::Method;

/// A decoded engine reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: u16,
    uri: String,
    method: Method,
    agreement: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Decode one reply buffer.
    ///
    /// Stages run in order: outer hex, JSON parse, header schema, body hex.
    /// Each failure names its stage; nothing is silently defaulted except
    /// the reserved scalars, which the engine omits on error replies
    /// (absent `status` decodes as `0`).
    pub fn decode(reply: &[u8]) -> Result<Response, EnvelopeError> {
        let outer = hex::decode(reply)
            .map_err(|e| EnvelopeError::Hex(format!("outer buffer: {e}")))?;
        let root: Value = serde_json::from_slice(&outer).map_err(|e| EnvelopeError::Json {
            detail: e.to_string(),
            text: String::from_utf8_lossy(&outer).into_owned(),
        })?;
        let root = root
            .as_object()
            .ok_or_else(|| EnvelopeError::Schema("envelope root is not an object".to_string()))?;

        let header = root
            .get("header")
            .ok_or_else(|| EnvelopeError::Schema("envelope has no `header` key".to_string()))?
            .as_object()
            .ok_or_else(|| EnvelopeError::Schema("`header` is not an object".to_string()))?;
        let body_hex = root
            .get("body")
            .ok_or_else(|| EnvelopeError::Schema("envelope has no `body` key".to_string()))?
            .as_str()
            .ok_or_else(|| EnvelopeError::Schema("`body` is not a string".to_string()))?;
        let body = hex::decode(body_hex)
            .map_err(|e| EnvelopeError::Hex(format!("body payload: {e}")))?;

        Ok(Response {
            status: decode_status(header)?,
            uri: scalar_str(header, "uri")?,
            method: decode_method(header)?,
            agreement: scalar_str(header, "agreement")?,
            headers: Headers::from_envelope_keys(header)?,
            body,
        })
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Final URI after any redirects the engine followed.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn method(&self) -> Method {
        self.method
    }

    /// Negotiated protocol as the engine reports it, e.g. `HTTP/1.1`.
    pub fn agreement(&self) -> &str {
        &self.agreement
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Cookies the reply set, in arrival order.
    pub fn cookies(&self) -> &[Cookie] {
        self.headers.cookies()
    }

    /// Raw body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<&str, Error> {
        std::str::from_utf8(&self.body)
            .map_err(|e| Error::Deserialization(format!("body is not valid UTF-8: {e}")))
    }

    /// Body deserialized from JSON into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        serde_json::from_slice(&self.body).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

fn scalar_str(header: &Map<String, Value>, key: &str) -> Result<String, EnvelopeError> {
    match header.get(key) {
        None => Ok(String::new()),
        Some(Value::String(s)) => Ok(s.clone()),
        Some(_) => Err(EnvelopeError::Schema(format!("`{key}` is not a string"))),
    }
}

fn decode_status(header: &Map<String, Value>) -> Result<u16, EnvelopeError> {
    let Some(value) = header.get("status") else {
        return Ok(0);
    };
    let n = value
        .as_i64()
        .ok_or_else(|| EnvelopeError::Schema("`status` is not an integer".to_string()))?;
    u16::try_from(n).map_err(|_| EnvelopeError::Schema(format!("status {n} is out of range")))
}

fn decode_method(header: &Map<String, Value>) -> Result<Method, EnvelopeError> {
    let Some(value) = header.get("method") else {
        return Ok(Method::default());
    };
    let s = value
        .as_str()
        .ok_or_else(|| EnvelopeError::Schema("`method` is not a string".to_string()))?;
    Method::from_wire(s).ok_or_else(|| EnvelopeError::Schema(format!("unknown method `{s}`")))
}
