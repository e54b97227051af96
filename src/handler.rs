//! Handler contract and the continuation token.
//!
//! Every unit in a chain, built-in middleware and route logic alike, has the
//! same shape:
//!
//! ```text
//! fn name(c: &mut Context, next: Next) -> BoxFuture<'_, ()>
//! ```
//!
//! A handler decides what happens downstream by what it does with `next`:
//!
//! ```text
//! next.run(c).await      ← run the rest of the chain, then resume here
//! (next never run)       ← everything after this handler is skipped
//! ```
//!
//! Code before `next.run(c).await` is pre-processing, code after it is
//! post-processing and observes everything the inner handlers did.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::fault::FaultBoundary;

/// A heap-allocated, type-erased future borrowing the request [`Context`].
///
/// `Pin<Box<…>>` because the chain is recursive: each handler's future awaits
/// the next handler's future, and only boxing gives that a finite size.
/// `Send` lets tokio move an in-flight request between worker threads.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A handler stored in a chain, shared across concurrent requests.
///
/// `Arc` gives cheap, thread-safe shared ownership: resolving a chain for a
/// request clones pointers, never handlers.
pub(crate) type BoxedHandler =
    Arc<dyn for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static>;

// ── Next ──────────────────────────────────────────────────────────────────────

/// The continuation token passed to every handler.
///
/// `Next` is single-use and cannot be built outside this crate, so each
/// handler can resume the chain at most once. Not running it is the one and
/// only way to stop the chain early.
#[derive(Debug)]
pub struct Next {
    _private: (),
}

impl Next {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Runs the remaining handlers and resolves once they have all returned.
    pub fn run(self, ctx: &mut Context) -> BoxFuture<'_, ()> {
        ctx.advance()
    }

    /// Like [`run`](Next::run), but a panic anywhere downstream is caught and
    /// returned as [`Recovered`](crate::Recovered) instead of unwinding
    /// through the caller.
    pub fn run_guarded(self, ctx: &mut Context) -> FaultBoundary<'_> {
        FaultBoundary::new(ctx.advance())
    }
}

pub(crate) fn boxed<H>(handler: H) -> BoxedHandler
where
    H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
{
    Arc::new(handler)
}
