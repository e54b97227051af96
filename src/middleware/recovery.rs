//! Panic recovery.

use http::StatusCode;
use tracing::error;

use crate::context::Context;
use crate::handler::{BoxFuture, Next};

const BODY: &str = "Internal Server Error";

/// Catches panics in every handler after this one.
///
/// The panic message and a traceback starting at the faulting frame go to
/// the log at `ERROR`; the client only ever sees `500 Internal Server Error`.
/// Headers set before the panic are kept. The connection and the server
/// carry on as normal.
///
/// Register it first (or right after [`cors`](super::cors)): panics in
/// handlers that run before it are not caught.
pub fn recovery(c: &mut Context, next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        if let Err(fault) = next.run_guarded(c).await {
            error!("{}\n\n", fault.trace());
            c.override_failure(StatusCode::INTERNAL_SERVER_ERROR, BODY);
        }
    })
}
