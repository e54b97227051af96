//! The buffered response a [`Context`](crate::Context) writes into.
//!
//! Nothing reaches the wire until the whole chain has returned, which is what
//! lets outer middleware inspect (and Recovery replace) what inner handlers
//! produced.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderValue};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`Context::data`](crate::Context::data).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContentType {
    Html,  // text/html; charset=utf-8
    Json,  // application/json
    Text,  // text/plain; charset=utf-8
}

impl ContentType {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Html => "text/html; charset=utf-8",
            Self::Json => "application/json",
            Self::Text => "text/plain; charset=utf-8",
        }
    }
}

// ── ResponseState ─────────────────────────────────────────────────────────────

/// Status, headers and body accumulated while the chain runs.
///
/// `committed` is set by `fail`: from then on status and body are frozen.
pub(crate) struct ResponseState {
    pub(crate) status: StatusCode,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Vec<u8>,
    pub(crate) committed: bool,
}

impl ResponseState {
    pub(crate) fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Vec::new(),
            committed: false,
        }
    }

    pub(crate) fn write(&mut self, status: StatusCode, content_type: ContentType, body: Vec<u8>) {
        self.status = status;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
        self.body = body;
    }

    pub(crate) fn into_http(self) -> http::Response<Full<Bytes>> {
        let mut res = http::Response::new(Full::new(Bytes::from(self.body)));
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}
