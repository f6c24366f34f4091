//! Error types for the engine binding.
//!
//! # Design
//! Setter failures carry the exact configuration step the engine rejected,
//! because the engine itself reports nothing but a bare sentinel. Decode
//! failures carry the stage (`Hex`/`Json`/`Schema`) plus context so a caller
//! can tell a truncated buffer from a shape violation. `Timeout` gets a
//! dedicated variant because callers frequently back off and retry on it,
//! while other engine-reported failures land in `Engine` with the raw
//! message for debugging.

use std::fmt;

/// Configuration steps that push one request field to the engine.
///
/// Named after the engine entry points they drive, so a `FieldSet` error
/// identifies the exact call that came back with the failure sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SetHeaderJson,
    AddHeader,
    SetAlpn,
    SetProxy,
    SetUrl,
    AddParam,
    SetData,
    SetJson,
    SetContentType,
    SetCookie,
    AddCookie,
    SetTimeout,
    SetBytes,
}

impl Field {
    /// Entry point name as exported by the engine library.
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::SetHeaderJson => "set_header_json",
            Field::AddHeader => "add_header",
            Field::SetAlpn => "set_alpn",
            Field::SetProxy => "set_proxy",
            Field::SetUrl => "set_url",
            Field::AddParam => "add_param",
            Field::SetData => "set_data",
            Field::SetJson => "set_json",
            Field::SetContentType => "set_content_type",
            Field::SetCookie => "set_cookie",
            Field::AddCookie => "add_cookie",
            Field::SetTimeout => "set_timeout",
            Field::SetBytes => "set_bytes",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stage of envelope decoding at which a reply was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStage {
    /// One of the two hex layers (outer buffer or body payload).
    Hex,
    /// The decoded outer buffer did not parse as JSON.
    Json,
    /// The JSON parsed but violated the envelope shape.
    Schema,
}

/// A reply envelope that could not be decoded.
#[derive(Debug)]
pub enum EnvelopeError {
    /// Hex decoding failed; the detail names which layer.
    Hex(String),

    /// The outer buffer is valid hex but not valid JSON. `text` holds the
    /// decoded buffer (lossy UTF-8) because the engine reports its own
    /// errors as plaintext through this same channel.
    Json { detail: String, text: String },

    /// The envelope JSON is missing a required key or a value has the
    /// wrong shape.
    Schema(String),
}

impl EnvelopeError {
    /// Decode stage this error surfaced at.
    pub fn stage(&self) -> DecodeStage {
        match self {
            EnvelopeError::Hex(_) => DecodeStage::Hex,
            EnvelopeError::Json { .. } => DecodeStage::Json,
            EnvelopeError::Schema(_) => DecodeStage::Schema,
        }
    }
}

impl fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeError::Hex(detail) => write!(f, "hex layer: {detail}"),
            EnvelopeError::Json { detail, .. } => write!(f, "json layer: {detail}"),
            EnvelopeError::Schema(detail) => write!(f, "header schema: {detail}"),
        }
    }
}

impl std::error::Error for EnvelopeError {}

/// Errors returned by `Session` operations and response accessors.
#[derive(Debug)]
pub enum Error {
    /// The engine failed to allocate a request handle.
    Init,

    /// The engine rejected one configuration step; the field names it.
    FieldSet(Field),

    /// The reply buffer was not a decodable envelope.
    Envelope(EnvelopeError),

    /// The engine reported a timeout while executing the request.
    Timeout,

    /// The engine reported a failure other than a timeout; carries the raw
    /// message text.
    Engine(String),

    /// A request-side payload could not be serialized to its wire form.
    Serialization(String),

    /// The response body could not be read as the requested type.
    Deserialization(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Init => write!(f, "engine failed to allocate a request handle"),
            Error::FieldSet(field) => write!(f, "engine rejected {field}"),
            Error::Envelope(e) => write!(f, "malformed reply envelope: {e}"),
            Error::Timeout => write!(f, "engine timed out executing the request"),
            Error::Engine(msg) => write!(f, "engine error: {msg}"),
            Error::Serialization(msg) => write!(f, "serialization failed: {msg}"),
            Error::Deserialization(msg) => write!(f, "deserialization failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<EnvelopeError> for Error {
    fn from(e: EnvelopeError) -> Self {
        Error::Envelope(e)
    }
}
