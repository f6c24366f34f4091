use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde_json::{json, Map, Value};

use ferry_core::cookie::parse_cookie_header;
use ferry_core::{Cookie, Engine, Field, Method, ENGINE_FAILURE, ENGINE_OK};

/// Everything pushed to one mock handle, in the raw form it arrived.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub header_json: Option<String>,
    pub headers: Vec<(String, String)>,
    pub alpn: Option<String>,
    pub proxy: Option<String>,
    pub url: Option<String>,
    pub params: Vec<(String, String)>,
    pub data: Option<String>,
    pub json: Option<String>,
    pub content_type: Option<String>,
    pub cookie: Option<String>,
    pub cookie_pairs: Vec<(String, String)>,
    pub timeout: Option<String>,
    pub bytes: Option<Vec<u8>>,
    /// Entry point names in call order, `send <METHOD>` included.
    pub calls: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    next_handle: i32,
    fail_init: bool,
    failing: HashSet<Field>,
    queued: VecDeque<Vec<u8>>,
    requests: HashMap<i32, RecordedRequest>,
    destroyed: Vec<i32>,
}

/// In-process stand-in for the native engine.
///
/// Clones share state, so a test can keep one clone for scripting and
/// inspection while a `Session` owns the other. Unscripted sends answer
/// with an echo envelope built from the recorded request; `queue_reply`
/// substitutes raw buffers in FIFO order for decode and failure tests.
#[derive(Clone, Debug, Default)]
pub struct MockEngine {
    inner: Arc<Mutex<Inner>>,
}

impl MockEngine {
    pub fn new() -> MockEngine {
        MockEngine::default()
    }

    /// Make every subsequent `init` return the failure sentinel.
    pub fn fail_init(&self) {
        self.inner.lock().unwrap().fail_init = true;
    }

    /// Make the setters behind `field` return the failure sentinel.
    pub fn fail_field(&self, field: Field) {
        self.inner.lock().unwrap().failing.insert(field);
    }

    pub fn clear_failures(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.fail_init = false;
        inner.failing.clear();
    }

    /// Queue a raw reply buffer; queued buffers answer sends before any
    /// echo envelope is synthesized.
    pub fn queue_reply(&self, reply: Vec<u8>) {
        self.inner.lock().unwrap().queued.push_back(reply);
    }

    /// Snapshot of what has been pushed to `id` so far.
    pub fn request(&self, id: i32) -> Option<RecordedRequest> {
        self.inner.lock().unwrap().requests.get(&id).cloned()
    }

    pub fn live_handles(&self) -> usize {
        self.inner.lock().unwrap().requests.len()
    }

    /// Handles released through `destroy`, in release order.
    pub fn destroyed(&self) -> Vec<i32> {
        self.inner.lock().unwrap().destroyed.clone()
    }

    fn setter<F>(&self, id: i32, field: Field, call: String, update: F) -> i32
    where
        F: FnOnce(&mut RecordedRequest),
    {
        let mut inner = self.inner.lock().unwrap();
        let scripted_failure = inner.failing.contains(&field);
        let Some(request) = inner.requests.get_mut(&id) else {
            return ENGINE_FAILURE;
        };
        request.calls.push(call);
        if scripted_failure {
            return ENGINE_FAILURE;
        }
        update(request);
        ENGINE_OK
    }
}

impl Engine for MockEngine {
    type Reply = Vec<u8>;

    fn init(&mut self) -> i32 {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_init {
            return ENGINE_FAILURE;
        }
        let id = inner.next_handle;
        inner.next_handle += 1;
        inner.requests.insert(id, RecordedRequest::default());
        id
    }

    fn set_header_json(&mut self, id: i32, header: &str) -> i32 {
        let header = header.to_string();
        self.setter(id, Field::SetHeaderJson, "set_header_json".to_string(), |r| {
            r.header_json = Some(header);
        })
    }

    fn add_header(&mut self, id: i32, name: &str, value: &str) -> i32 {
        let pair = (name.to_string(), value.to_string());
        self.setter(id, Field::AddHeader, format!("add_header {name}"), |r| {
            r.headers.push(pair);
        })
    }

    fn set_alpn(&mut self, id: i32, alpn: &str) -> i32 {
        let alpn = alpn.to_string();
        self.setter(id, Field::SetAlpn, "set_alpn".to_string(), |r| {
            r.alpn = Some(alpn);
        })
    }

    fn set_proxy(&mut self, id: i32, proxy: &str) -> i32 {
        let proxy = proxy.to_string();
        self.setter(id, Field::SetProxy, "set_proxy".to_string(), |r| {
            r.proxy = Some(proxy);
        })
    }

    fn set_url(&mut self, id: i32, url: &str) -> i32 {
        let url = url.to_string();
        self.setter(id, Field::SetUrl, "set_url".to_string(), |r| {
            r.url = Some(url);
        })
    }

    fn add_param(&mut self, id: i32, name: &str, value: &str) -> i32 {
        let pair = (name.to_string(), value.to_string());
        self.setter(id, Field::AddParam, format!("add_param {name}"), |r| {
            r.params.push(pair);
        })
    }

    fn set_data(&mut self, id: i32, data: &str) -> i32 {
        let data = data.to_string();
        self.setter(id, Field::SetData, "set_data".to_string(), |r| {
            r.data = Some(data);
        })
    }

    fn set_json(&mut self, id: i32, body: &str) -> i32 {
        let body = body.to_string();
        self.setter(id, Field::SetJson, "set_json".to_string(), |r| {
            r.json = Some(body);
        })
    }

    fn set_content_type(&mut self, id: i32, content_type: &str) -> i32 {
        let content_type = content_type.to_string();
        self.setter(id, Field::SetContentType, "set_content_type".to_string(), |r| {
            r.content_type = Some(content_type);
        })
    }

    fn set_cookie(&mut self, id: i32, cookie: &str) -> i32 {
        let cookie = cookie.to_string();
        self.setter(id, Field::SetCookie, "set_cookie".to_string(), |r| {
            r.cookie = Some(cookie);
        })
    }

    fn add_cookie(&mut self, id: i32, name: &str, value: &str) -> i32 {
        let pair = (name.to_string(), value.to_string());
        self.setter(id, Field::AddCookie, format!("add_cookie {name}"), |r| {
            r.cookie_pairs.push(pair);
        })
    }

    fn set_timeout(&mut self, id: i32, timeout: &str) -> i32 {
        let timeout = timeout.to_string();
        self.setter(id, Field::SetTimeout, "set_timeout".to_string(), |r| {
            r.timeout = Some(timeout);
        })
    }

    fn set_bytes(&mut self, id: i32, bytes: &[u8]) -> i32 {
        let bytes = bytes.to_vec();
        self.setter(id, Field::SetBytes, "set_bytes".to_string(), |r| {
            r.bytes = Some(bytes);
        })
    }

    fn send(&mut self, id: i32, method: Method) -> Vec<u8> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(reply) = inner.queued.pop_front() {
            return reply;
        }
        match inner.requests.get_mut(&id) {
            Some(request) => {
                request.calls.push(format!("send {method}"));
                echo_envelope(request, method)
            }
            None => error_reply("request handle not found"),
        }
    }

    fn destroy(&mut self, id: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.remove(&id);
        inner.destroyed.push(id);
    }
}

/// Encode a reply buffer the way the engine does: the body hex-encoded
/// into the JSON, the whole JSON hex-encoded again.
pub fn encode_envelope(header: &Value, body: &[u8]) -> Vec<u8> {
    let root = json!({ "header": header, "body": hex::encode(body) });
    hex::encode(root.to_string()).into_bytes()
}

/// The engine's in-band error form: the bare message, hex-encoded.
pub fn error_reply(message: &str) -> Vec<u8> {
    hex::encode(message).into_bytes()
}

fn echo_envelope(request: &RecordedRequest, method: Method) -> Vec<u8> {
    let agreement = match request.alpn.as_deref() {
        Some("http/1.0") => "HTTP/1.0",
        Some("h2") => "HTTP/2",
        _ => "HTTP/1.1",
    };
    let body = echo_body(request);

    let mut header = Map::new();
    header.insert(format!("{agreement} 200 OK"), json!(""));
    header.insert(
        "uri".to_string(),
        json!(request.url.clone().unwrap_or_default()),
    );
    header.insert("method".to_string(), json!(method.as_str()));
    header.insert("status".to_string(), json!(200));
    header.insert("agreement".to_string(), json!(agreement));
    header.insert("server".to_string(), json!("mock-engine"));
    header.insert("content-length".to_string(), json!(body.len()));
    let cookies = echoed_cookies(request);
    if !cookies.is_empty() {
        header.insert("set-cookie".to_string(), Value::Array(cookies));
    }

    encode_envelope(&Value::Object(header), &body)
}

/// Body precedence mirrors the engine: a session pushes at most one body
/// form, but direct setter calls may leave several recorded.
fn echo_body(request: &RecordedRequest) -> Vec<u8> {
    if let Some(bytes) = &request.bytes {
        return bytes.clone();
    }
    if let Some(body) = &request.json {
        return body.clone().into_bytes();
    }
    if let Some(data) = &request.data {
        return data.clone().into_bytes();
    }
    if !request.params.is_empty() {
        return request
            .params
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&")
            .into_bytes();
    }
    Vec::new()
}

fn echoed_cookies(request: &RecordedRequest) -> Vec<Value> {
    let mut cookies = Vec::new();
    if let Some(raw) = &request.cookie {
        cookies.extend(
            parse_cookie_header(raw)
                .iter()
                .map(Cookie::to_envelope_value),
        );
    }
    cookies.extend(
        request
            .cookie_pairs
            .iter()
            .map(|(name, value)| Cookie::new(name, value).to_envelope_value()),
    );
    cookies
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::Response;

    fn configured(engine: &MockEngine) -> i32 {
        let mut handle = engine.clone();
        let id = handle.init();
        assert!(id >= 0);
        id
    }

    #[test]
    fn init_allocates_distinct_handles() {
        let engine = MockEngine::new();
        let a = configured(&engine);
        let b = configured(&engine);
        assert_ne!(a, b);
        assert_eq!(engine.live_handles(), 2);
    }

    #[test]
    fn fail_init_scripts_the_sentinel() {
        let engine = MockEngine::new();
        engine.fail_init();
        assert_eq!(engine.clone().init(), -1);
        engine.clear_failures();
        assert!(engine.clone().init() >= 0);
    }

    #[test]
    fn scripted_field_failure_hits_only_that_setter() {
        let engine = MockEngine::new();
        let id = configured(&engine);
        engine.fail_field(Field::SetProxy);

        let mut handle = engine.clone();
        assert_eq!(handle.set_proxy(id, "http://127.0.0.1:1"), -1);
        assert_eq!(handle.set_url(id, "https://example.com"), 0);
        assert_eq!(
            engine.request(id).unwrap().url.as_deref(),
            Some("https://example.com")
        );
    }

    #[test]
    fn setters_against_unknown_handles_fail() {
        let mut engine = MockEngine::new();
        assert_eq!(engine.set_url(99, "https://example.com"), -1);
    }

    #[test]
    fn echo_reply_is_a_decodable_envelope() {
        let engine = MockEngine::new();
        let id = configured(&engine);
        let mut handle = engine.clone();
        handle.set_url(id, "https://example.com/echo");
        handle.set_alpn(id, "h2");
        handle.set_data(id, "payload");

        let reply = handle.send(id, Method::Post);
        let response = Response::decode(&reply).unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.uri(), "https://example.com/echo");
        assert_eq!(response.method(), Method::Post);
        assert_eq!(response.agreement(), "HTTP/2");
        assert_eq!(response.headers().get("server"), Some("mock-engine"));
        assert_eq!(response.headers().get("content-length"), Some("7"));
        assert_eq!(response.text().unwrap(), "payload");
    }

    #[test]
    fn echoed_set_cookie_round_trips_through_decoding() {
        let engine = MockEngine::new();
        let id = configured(&engine);
        let mut handle = engine.clone();
        handle.set_cookie(id, "a=1; b=2");
        handle.add_cookie(id, "c", "3");

        let reply = handle.send(id, Method::Get);
        let response = Response::decode(&reply).unwrap();
        let names: Vec<_> = response.cookies().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn queued_replies_answer_in_fifo_order() {
        let engine = MockEngine::new();
        let id = configured(&engine);
        engine.queue_reply(error_reply("first"));
        engine.queue_reply(error_reply("second"));

        let mut handle = engine.clone();
        assert_eq!(handle.send(id, Method::Get), error_reply("first"));
        assert_eq!(handle.send(id, Method::Get), error_reply("second"));
        // queue drained; echo resumes
        assert!(Response::decode(&handle.send(id, Method::Get)).is_ok());
    }

    #[test]
    fn send_on_an_unknown_handle_reports_in_band() {
        let mut engine = MockEngine::new();
        let reply = engine.send(42, Method::Get);
        let err = Response::decode(&reply).unwrap_err();
        assert!(matches!(err, ferry_core::EnvelopeError::Json { .. }));
    }

    #[test]
    fn destroy_removes_the_handle() {
        let engine = MockEngine::new();
        let id = configured(&engine);
        engine.clone().destroy(id);
        assert_eq!(engine.live_handles(), 0);
        assert_eq!(engine.destroyed(), vec![id]);
        assert!(engine.request(id).is_none());
    }
}
