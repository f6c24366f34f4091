//! Contract between the session layer and an engine implementation.
//!
//! # Design
//! One trait method per native entry point, keeping the engine's raw
//! conventions at this seam: setters report an `i32` status where negative
//! means failure, and `send` returns an opaque reply buffer. `Session` is
//! the only layer that maps sentinels to typed errors, so alternative
//! engines (the dynamically loaded library, the in-process mock) stay
//! trivially shaped like the C surface.

use crate::request::Method;

/// Status an engine entry point returns on failure.
pub const ENGINE_FAILURE: i32 = -1;

/// Status an engine setter returns on success.
pub const ENGINE_OK: i32 = 0;

/// The native engine surface, one method per entry point.
///
/// `id` is the request handle obtained from `init`. Implementations keep
/// the engine's sentinel conventions; callers go through `Session`, which
/// owns the handle lifecycle and the error mapping.
pub trait Engine {
    /// Reply buffer returned by `send`. Implementations that hand out
    /// engine-owned memory release it when the value drops.
    type Reply: AsRef<[u8]>;

    /// Allocate a request handle. Negative means allocation failed.
    fn init(&mut self) -> i32;

    /// Replace the whole header set with a JSON object of name/value pairs.
    fn set_header_json(&mut self, id: i32, header: &str) -> i32;

    fn add_header(&mut self, id: i32, name: &str, value: &str) -> i32;

    fn set_alpn(&mut self, id: i32, alpn: &str) -> i32;

    fn set_proxy(&mut self, id: i32, proxy: &str) -> i32;

    fn set_url(&mut self, id: i32, url: &str) -> i32;

    fn add_param(&mut self, id: i32, name: &str, value: &str) -> i32;

    fn set_data(&mut self, id: i32, data: &str) -> i32;

    fn set_json(&mut self, id: i32, json: &str) -> i32;

    fn set_content_type(&mut self, id: i32, content_type: &str) -> i32;

    fn set_cookie(&mut self, id: i32, cookie: &str) -> i32;

    fn add_cookie(&mut self, id: i32, name: &str, value: &str) -> i32;

    fn set_timeout(&mut self, id: i32, timeout: &str) -> i32;

    fn set_bytes(&mut self, id: i32, bytes: &[u8]) -> i32;

    /// Execute the configured request with `method` and return the reply
    /// envelope. Errors travel inside the buffer; this call itself cannot
    /// fail.
    fn send(&mut self, id: i32, method: Method) -> Self::Reply;

    /// Release the handle and everything the engine holds for it.
    fn destroy(&mut self, id: i32);
}
