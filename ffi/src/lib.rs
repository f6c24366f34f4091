//! Loader for the native HTTP engine library.
//!
//! # Overview
//! The engine ships as a shared library exporting C entry points: `init_http`
//! allocates an integer request handle, `set_*`/`add_*` push one field each,
//! the verb functions execute the request and return a heap buffer that must
//! go back through `free_pointer`. This crate opens that library at runtime
//! and adapts it to `ferry_core::Engine`, so `Session` drives the real engine
//! exactly the way it drives the mock.
//!
//! # Design
//! - Every entry point is resolved once at load time and copied out of its
//!   `Symbol` as a plain fn pointer; calls never borrow the `Library`.
//! - `NativeEngine` clones share one `Arc`-held library, and every
//!   `NativeReply` holds the same `Arc`, so the library outlives any buffer
//!   it returned.
//! - Reply buffers are NUL-terminated C strings. Their length is measured
//!   once at construction; `Drop` releases them through `free_pointer`.
//! - Arguments containing interior NUL bytes cannot cross the C boundary,
//!   so those calls return the engine failure sentinel instead.
//! - All entry points use the `system` convention except `destroy`, which
//!   the engine exports with the `C` convention.

use std::ffi::{CString, OsStr};
use std::os::raw::{c_char, c_int};
use std::sync::Arc;

use libloading::{Library, Symbol};
use tracing::debug;

use ferry_core::{Engine, Method, ENGINE_FAILURE};

type InitFn = unsafe extern "system" fn() -> c_int;
type SetStrFn = unsafe extern "system" fn(c_int, *const c_char) -> c_int;
type SetPairFn = unsafe extern "system" fn(c_int, *const c_char, *const c_char) -> c_int;
type SetBytesFn = unsafe extern "system" fn(c_int, *const c_char, u32) -> c_int;
type VerbFn = unsafe extern "system" fn(c_int) -> *mut c_char;
type FreeFn = unsafe extern "system" fn(*mut c_char);
type DestroyFn = unsafe extern "C" fn(c_int);

/// Entry points resolved from the engine library.
///
/// The field for `Method::Trace` is named after the symbol the engine
/// actually exports, `trach`.
#[derive(Clone, Copy, Debug)]
struct Api {
    init_http: InitFn,
    set_header_json: SetStrFn,
    add_header: SetPairFn,
    set_alpn: SetStrFn,
    set_proxy: SetStrFn,
    set_url: SetStrFn,
    add_param: SetPairFn,
    set_data: SetStrFn,
    set_json: SetStrFn,
    set_content_type: SetStrFn,
    set_cookie: SetStrFn,
    add_cookie: SetPairFn,
    set_timeout: SetStrFn,
    set_bytes: SetBytesFn,
    get: VerbFn,
    post: VerbFn,
    put: VerbFn,
    options: VerbFn,
    delete: VerbFn,
    head: VerbFn,
    trach: VerbFn,
    destroy: DestroyFn,
    free_pointer: FreeFn,
}

#[derive(Debug)]
struct Shared {
    _library: Library,
    api: Api,
}

/// The engine library could not be opened or is missing an entry point.
#[derive(Debug)]
pub enum LoadError {
    /// The dynamic loader rejected the library itself.
    Library(String),
    /// The library opened but one required symbol was absent.
    Symbol { name: &'static str, detail: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Library(detail) => write!(f, "failed to load engine library: {detail}"),
            LoadError::Symbol { name, detail } => {
                write!(f, "engine symbol `{name}` unavailable: {detail}")
            }
        }
    }
}

impl std::error::Error for LoadError {}

/// Copy a typed entry point out of the library so calls do not borrow it.
fn sym<T: Copy>(library: &Library, name: &'static str) -> Result<T, LoadError> {
    // Safety: the signature behind each name is fixed by the engine ABI.
    let symbol: Symbol<T> = unsafe { library.get(name.as_bytes()) }.map_err(|e| {
        LoadError::Symbol {
            name,
            detail: e.to_string(),
        }
    })?;
    Ok(*symbol)
}

/// Handle to a loaded engine library, usable as a `ferry_core::Engine`.
///
/// Clones share the underlying library; a `Session` typically owns one
/// clone while the caller keeps another for opening further sessions.
#[derive(Clone, Debug)]
pub struct NativeEngine {
    shared: Arc<Shared>,
}

impl NativeEngine {
    /// Open the engine library at `path` and resolve every entry point.
    pub fn load(path: impl AsRef<OsStr>) -> Result<NativeEngine, LoadError> {
        let path = path.as_ref();
        // Safety: loading runs the library's initializers; the engine is
        // trusted code supplied by the caller.
        let library =
            unsafe { Library::new(path) }.map_err(|e| LoadError::Library(e.to_string()))?;

        let api = Api {
            init_http: sym::<InitFn>(&library, "init_http")?,
            set_header_json: sym::<SetStrFn>(&library, "set_header_json")?,
            add_header: sym::<SetPairFn>(&library, "add_header")?,
            set_alpn: sym::<SetStrFn>(&library, "set_alpn")?,
            set_proxy: sym::<SetStrFn>(&library, "set_proxy")?,
            set_url: sym::<SetStrFn>(&library, "set_url")?,
            add_param: sym::<SetPairFn>(&library, "add_param")?,
            set_data: sym::<SetStrFn>(&library, "set_data")?,
            set_json: sym::<SetStrFn>(&library, "set_json")?,
            set_content_type: sym::<SetStrFn>(&library, "set_content_type")?,
            set_cookie: sym::<SetStrFn>(&library, "set_cookie")?,
            add_cookie: sym::<SetPairFn>(&library, "add_cookie")?,
            set_timeout: sym::<SetStrFn>(&library, "set_timeout")?,
            set_bytes: sym::<SetBytesFn>(&library, "set_bytes")?,
            get: sym::<VerbFn>(&library, "get")?,
            post: sym::<VerbFn>(&library, "post")?,
            put: sym::<VerbFn>(&library, "put")?,
            options: sym::<VerbFn>(&library, "options")?,
            delete: sym::<VerbFn>(&library, "delete")?,
            head: sym::<VerbFn>(&library, "head")?,
            trach: sym::<VerbFn>(&library, "trach")?,
            destroy: sym::<DestroyFn>(&library, "destroy")?,
            free_pointer: sym::<FreeFn>(&library, "free_pointer")?,
        };

        debug!(path = ?path, "engine library loaded");
        Ok(NativeEngine {
            shared: Arc::new(Shared {
                _library: library,
                api,
            }),
        })
    }

    fn call_str(&self, entry: SetStrFn, id: i32, value: &str) -> i32 {
        let Ok(value) = CString::new(value) else {
            return ENGINE_FAILURE;
        };
        // Safety: the pointer stays valid for the duration of the call.
        unsafe { entry(id, value.as_ptr()) }
    }

    fn call_pair(&self, entry: SetPairFn, id: i32, name: &str, value: &str) -> i32 {
        let (Ok(name), Ok(value)) = (CString::new(name), CString::new(value)) else {
            return ENGINE_FAILURE;
        };
        // Safety: both pointers stay valid for the duration of the call.
        unsafe { entry(id, name.as_ptr(), value.as_ptr()) }
    }
}

impl Engine for NativeEngine {
    type Reply = NativeReply;

    fn init(&mut self) -> i32 {
        unsafe { (self.shared.api.init_http)() }
    }

    fn set_header_json(&mut self, id: i32, header: &str) -> i32 {
        self.call_str(self.shared.api.set_header_json, id, header)
    }

    fn add_header(&mut self, id: i32, name: &str, value: &str) -> i32 {
        self.call_pair(self.shared.api.add_header, id, name, value)
    }

    fn set_alpn(&mut self, id: i32, alpn: &str) -> i32 {
        self.call_str(self.shared.api.set_alpn, id, alpn)
    }

    fn set_proxy(&mut self, id: i32, proxy: &str) -> i32 {
        self.call_str(self.shared.api.set_proxy, id, proxy)
    }

    fn set_url(&mut self, id: i32, url: &str) -> i32 {
        self.call_str(self.shared.api.set_url, id, url)
    }

    fn add_param(&mut self, id: i32, name: &str, value: &str) -> i32 {
        self.call_pair(self.shared.api.add_param, id, name, value)
    }

    fn set_data(&mut self, id: i32, data: &str) -> i32 {
        self.call_str(self.shared.api.set_data, id, data)
    }

    fn set_json(&mut self, id: i32, json: &str) -> i32 {
        self.call_str(self.shared.api.set_json, id, json)
    }

    fn set_content_type(&mut self, id: i32, content_type: &str) -> i32 {
        self.call_str(self.shared.api.set_content_type, id, content_type)
    }

    fn set_cookie(&mut self, id: i32, cookie: &str) -> i32 {
        self.call_str(self.shared.api.set_cookie, id, cookie)
    }

    fn add_cookie(&mut self, id: i32, name: &str, value: &str) -> i32 {
        self.call_pair(self.shared.api.add_cookie, id, name, value)
    }

    fn set_timeout(&mut self, id: i32, timeout: &str) -> i32 {
        self.call_str(self.shared.api.set_timeout, id, timeout)
    }

    fn set_bytes(&mut self, id: i32, bytes: &[u8]) -> i32 {
        let Ok(len) = u32::try_from(bytes.len()) else {
            return ENGINE_FAILURE;
        };
        // Safety: the engine reads exactly `len` bytes; the slice outlives
        // the call.
        unsafe { (self.shared.api.set_bytes)(id, bytes.as_ptr() as *const c_char, len) }
    }

    fn send(&mut self, id: i32, method: Method) -> NativeReply {
        let verb = match method {
            Method::Get => self.shared.api.get,
            Method::Post => self.shared.api.post,
            Method::Put => self.shared.api.put,
            Method::Options => self.shared.api.options,
            Method::Delete => self.shared.api.delete,
            Method::Head => self.shared.api.head,
            Method::Trace => self.shared.api.trach,
        };
        // Safety: the engine returns null or a NUL-terminated buffer it owns
        // until free_pointer.
        let ptr = unsafe { verb(id) };
        NativeReply::new(ptr, self.shared.clone())
    }

    fn destroy(&mut self, id: i32) {
        unsafe { (self.shared.api.destroy)(id) }
    }
}

/// A reply buffer owned by the engine, released on drop.
pub struct NativeReply {
    ptr: *mut c_char,
    len: usize,
    shared: Arc<Shared>,
}

impl NativeReply {
    fn new(ptr: *mut c_char, shared: Arc<Shared>) -> NativeReply {
        // Safety: a non-null reply is NUL-terminated. The length is measured
        // once here; reads never walk the buffer again.
        let len = if ptr.is_null() {
            0
        } else {
            unsafe { std::ffi::CStr::from_ptr(ptr) }.to_bytes().len()
        };
        NativeReply { ptr, len, shared }
    }
}

impl AsRef<[u8]> for NativeReply {
    fn as_ref(&self) -> &[u8] {
        if self.ptr.is_null() {
            return &[];
        }
        // Safety: the buffer lives until Drop and `len` was fixed at
        // construction.
        unsafe { std::slice::from_raw_parts(self.ptr as *const u8, self.len) }
    }
}

impl Drop for NativeReply {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            // Safety: the pointer came from this library and is released
            // exactly once.
            unsafe { (self.shared.api.free_pointer)(self.ptr) }
        }
    }
}
