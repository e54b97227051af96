//! # strand
//!
//! A small HTTP framework where every request runs through one ordered chain
//! of handlers.
//!
//! ## The model
//!
//! A route handler and a piece of middleware are the same thing: a function
//! that takes the request [`Context`] and a [`Next`] token. Calling
//! `next.run(c).await` runs everything after it in the chain and then
//! returns control, so one function covers both "before" and "after" work.
//! Not calling it ends the chain right there.
//!
//! ```text
//! cors ─▶ logger ─▶ recovery ─▶ route
//!   ◀────────  ◀─────────  ◀──────
//! ```
//!
//! The chain for a request is global middleware, then the middleware of every
//! [`Group`] whose prefix covers the path (outer to inner), then the route
//! handler. It is fixed before the first handler runs.
//!
//! Built in: [`middleware::cors`], [`middleware::logger`],
//! [`middleware::recovery`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use strand::{BoxFuture, Context, Next, Router, Server, StatusCode};
//! use strand::middleware::cors;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = Router::with_defaults()
//!         .with(cors)
//!         .group("/api", |api| {
//!             api.get("/users/{name}", get_user)
//!                .post("/users", create_user)
//!         });
//!
//!     Server::bind("0.0.0.0:9999").serve(app).await.unwrap();
//! }
//!
//! fn get_user(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
//!     Box::pin(async move {
//!         let name = c.param("name").unwrap_or("unknown");
//!         let body = serde_json::to_vec(&serde_json::json!({ "hello": name }));
//!         c.json(StatusCode::OK, body.unwrap_or_default());
//!     })
//! }
//!
//! fn create_user(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
//!     Box::pin(async move {
//!         if c.body().is_empty() {
//!             c.fail(StatusCode::BAD_REQUEST, "missing body");
//!             return;
//!         }
//!         c.set_header("location", "/users/99");
//!         c.status(StatusCode::CREATED);
//!     })
//! }
//! ```

mod context;
mod error;
mod fault;
mod handler;
mod request;
mod response;
mod router;
mod server;

pub mod middleware;

pub use context::Context;
pub use error::Error;
pub use fault::{FaultBoundary, Recovered};
pub use handler::{BoxFuture, Next};
pub use http::{Method, StatusCode};
pub use request::Request;
pub use response::ContentType;
pub use router::{Group, Router};
pub use server::Server;
