//! Permissive CORS headers and preflight short-circuit.

use http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use http::{Method, StatusCode};

use crate::context::Context;
use crate::handler::{BoxFuture, Next};

const ALLOW_ORIGIN: &str = "*";
const ALLOW_METHODS: &str = "GET,POST,PUT,DELETE,OPTIONS";
const ALLOW_HEADERS: &str = "Content-Type,Authorization,X-Requested-With";
/// Preflight cache lifetime, in seconds (one day).
const MAX_AGE: &str = "86400";

/// Sets the CORS headers on every response and answers preflight requests.
///
/// Headers are set before anything downstream runs, so error responses
/// (including the 500 from [`recovery`](super::recovery)) carry them too.
/// An `OPTIONS` request gets `204 No Content` and the rest of the chain is
/// skipped: preflights never reach route handlers.
pub fn cors(c: &mut Context, next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        c.set_header(ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW_ORIGIN);
        c.set_header(ACCESS_CONTROL_ALLOW_METHODS, ALLOW_METHODS);
        c.set_header(ACCESS_CONTROL_ALLOW_HEADERS, ALLOW_HEADERS);
        c.set_header(ACCESS_CONTROL_MAX_AGE, MAX_AGE);

        if c.method() == Method::OPTIONS {
            c.status(StatusCode::NO_CONTENT);
            return;
        }

        next.run(c).await;
    })
}
