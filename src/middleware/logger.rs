//! Request logging.

use std::time::Instant;

use tracing::info;

use crate::context::Context;
use crate::handler::{BoxFuture, Next};

/// Logs one line per request once the rest of the chain has finished:
///
/// ```text
/// [200] /api/v1/ping?verbose=1 in 41.3µs
/// ```
///
/// The status is the final one, so a 500 written by
/// [`recovery`](super::recovery) further down is what gets logged.
pub fn logger(c: &mut Context, next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let started = Instant::now();
        next.run(c).await;
        let elapsed = started.elapsed();

        let status = c.status_code().as_u16();
        let uri = c.request().request_uri();
        info!("[{status}] {uri} in {elapsed:?}");
    })
}
