//! Minimal strand example: default middleware, CORS, versioned API group and
//! a route that panics on purpose.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i http://localhost:9999/
//!   curl -i http://localhost:9999/panic
//!   curl -i http://localhost:9999/api/v1/ping
//!   curl -i http://localhost:9999/api/v1/users/alice
//!   curl -i -X OPTIONS http://localhost:9999/api/v1/ping

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::json;
use strand::middleware::cors;
use strand::{BoxFuture, Context, Next, Router, Server, StatusCode};

const DEFAULT_ADDR: &str = "0.0.0.0:9999";

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let addr = std::env::var("STRAND_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_owned());

    let app = Router::with_defaults()
        .with(cors)
        .get("/", index)
        .get("/panic", panic_route)
        .group("/api", |api| {
            api.group("/v1", |v1| {
                v1.get("/ping", ping)
                    .group("/users", |users| users.get("/{name}", hello))
            })
        });

    Server::bind(&addr)
        .serve(app)
        .await
        .expect("server error");
}

// GET /
fn index(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        c.html(
            StatusCode::OK,
            "<h1>strand</h1>\
             <ul>\
             <li>GET /panic: panics, answered with 500</li>\
             <li>GET /api/v1/ping</li>\
             <li>GET /api/v1/users/{name}</li>\
             </ul>",
        );
    })
}

// GET /panic: indexes past the end of a one-element list.
fn panic_route(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let names = vec!["geektutu"];
        let index = names.len() + 99;
        c.text(StatusCode::OK, names[index]);
    })
}

// GET /api/v1/ping
fn ping(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        reply_json(c, &json!({ "message": "pong", "time": now }));
    })
}

// GET /api/v1/users/{name}
fn hello(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let name = c.param("name").unwrap_or("unknown").to_owned();
        reply_json(c, &json!({ "hello": name }));
    })
}

fn reply_json(c: &mut Context, value: &serde_json::Value) {
    match serde_json::to_vec(value) {
        Ok(body) => c.json(StatusCode::OK, body),
        Err(e) => c.fail(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
    }
}
