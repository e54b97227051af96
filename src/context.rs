//! Per-request context and the chain executor.
//!
//! One [`Context`] is created per request, owns that request's resolved
//! handler chain, and is dropped once the response has been handed to the
//! transport. It is never shared between requests.

use bytes::Bytes;
use http::header::{HeaderValue, IntoHeaderName};
use http::{Method, StatusCode};
use http_body_util::Full;
use tracing::{debug, warn};

use crate::handler::{BoxFuture, BoxedHandler, Next};
use crate::request::Request;
use crate::response::{ContentType, ResponseState};

/// Dispatch state for one request: the chain, the cursor and the response
/// being built.
pub struct Context {
    request: Request,
    handlers: Vec<BoxedHandler>,
    index: usize,
    response: ResponseState,
}

impl Context {
    pub(crate) fn new(request: Request, handlers: Vec<BoxedHandler>) -> Self {
        Self { request, handlers, index: 0, response: ResponseState::new() }
    }

    // ── Executor ──────────────────────────────────────────────────────────────

    /// Runs the chain from the first handler.
    pub(crate) async fn run(&mut self) {
        self.advance().await;
    }

    /// Moves the cursor forward by one and runs the handler it passed over.
    ///
    /// The cursor never moves backwards, so a handler can only ever be
    /// reached once per request.
    pub(crate) fn advance(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let Some(handler) = self.handlers.get(self.index).cloned() else {
                return;
            };
            self.index += 1;
            handler(&mut *self, Next::new()).await;
        })
    }

    pub(crate) fn into_response(self) -> http::Response<Full<Bytes>> {
        self.response.into_http()
    }

    // ── Request ───────────────────────────────────────────────────────────────

    pub fn request(&self) -> &Request { &self.request }
    pub fn method(&self) -> &Method { self.request.method() }
    pub fn path(&self) -> &str { self.request.path() }
    pub fn body(&self) -> &[u8] { self.request.body() }
    pub fn header(&self, name: &str) -> Option<&str> { self.request.header(name) }
    pub fn param(&self, key: &str) -> Option<&str> { self.request.param(key) }

    // ── Response ──────────────────────────────────────────────────────────────

    /// The status the response would be sent with if the chain ended now.
    pub fn status_code(&self) -> StatusCode {
        self.response.status
    }

    /// Sets the status without touching the body.
    pub fn status(&mut self, code: StatusCode) {
        if self.frozen("status") {
            return;
        }
        self.response.status = code;
    }

    /// Sets an outbound header, replacing any earlier value for `name`.
    ///
    /// Headers stay writable after [`fail`](Context::fail): the response is
    /// buffered until the chain returns. A value that is not a legal header
    /// value is dropped with a warning.
    ///
    /// # Panics
    ///
    /// Panics if `name` is a `&'static str` that is not a valid header name,
    /// like [`http::HeaderMap::insert`].
    pub fn set_header<K: IntoHeaderName>(&mut self, name: K, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.response.headers.insert(name, value);
            }
            Err(e) => warn!(value, "ignoring invalid header value: {e}"),
        }
    }

    pub fn text(&mut self, code: StatusCode, body: impl Into<String>) {
        self.data(code, ContentType::Text, body.into().into_bytes());
    }

    pub fn html(&mut self, code: StatusCode, body: impl Into<String>) {
        self.data(code, ContentType::Html, body.into().into_bytes());
    }

    /// JSON body from pre-serialised bytes (`serde_json::to_vec`, `format!`, …).
    pub fn json(&mut self, code: StatusCode, body: Vec<u8>) {
        self.data(code, ContentType::Json, body);
    }

    /// Writes a status and a body of the given type, replacing any earlier body.
    pub fn data(&mut self, code: StatusCode, content_type: ContentType, body: Vec<u8>) {
        if self.frozen("body") {
            return;
        }
        self.response.write(code, content_type, body);
    }

    /// Writes an error status with a plain-text message and freezes the
    /// response: status and body writes made afterwards, by this handler or
    /// any other, are ignored.
    ///
    /// `fail` does not unwind anything. The calling handler should return
    /// right after it and not run `next`.
    pub fn fail(&mut self, code: StatusCode, message: &str) {
        if self.frozen("failure") {
            return;
        }
        self.response.write(code, ContentType::Text, message.as_bytes().to_vec());
        self.response.committed = true;
    }

    /// Discards whatever body the chain produced and fails with `code`,
    /// even if the response was already frozen. Headers are kept.
    pub(crate) fn override_failure(&mut self, code: StatusCode, message: &str) {
        self.response.committed = false;
        self.fail(code, message);
    }

    fn frozen(&self, what: &str) -> bool {
        if self.response.committed {
            debug!(path = self.request.path(), "response already failed, dropping {what} write");
        }
        self.response.committed
    }
}
