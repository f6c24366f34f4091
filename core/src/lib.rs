//! Client binding for the native HTTP engine.
//!
//! # Overview
//! The engine is a prebuilt C library: requests are configured field by
//! field against an integer handle, dispatched with a verb entry point, and
//! answered with a hex-encoded JSON envelope. This crate owns everything on
//! the Rust side of that boundary: the request/response model, the envelope
//! decoder, and the `Session` handle lifecycle.
//!
//! # Design
//! - `Engine` is the seam: one trait method per native entry point, raw
//!   sentinel conventions preserved. The real library lives behind it in
//!   `ferry-ffi`; tests run against the in-process `mock-engine`.
//! - `Session` owns its handle. Errors name the exact setter or decode
//!   stage that failed, because the engine itself reports only sentinels.
//! - Types use owned `String` / `Vec` fields; nothing borrows across the
//!   FFI boundary.

pub mod cookie;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod headers;
pub mod request;
pub mod session;

pub use cookie::{Cookie, SameSite};
pub use engine::{Engine, ENGINE_FAILURE, ENGINE_OK};
pub use envelope::Response;
pub use error::{DecodeStage, EnvelopeError, Error, Field};
pub use headers::{Header, Headers};
pub use request::{Alpn, Body, Method, Request, Timeout};
pub use session::Session;
