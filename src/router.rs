//! Routes, groups and per-request chain resolution.
//!
//! Route lookup is one [`matchit`] radix tree per HTTP method. Middleware
//! lives on scopes: the root scope (global middleware) plus one scope per
//! path-prefix [`Group`]. For each request the chain is
//!
//! ```text
//! root middleware ++ covering groups' middleware (outer → inner) ++ route handler
//! ```
//!
//! and it is fixed before the first handler runs.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use http_body_util::Full;
use matchit::Router as MatchitRouter;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, Next, boxed};
use crate::middleware::{logger, recovery};
use crate::request::Request;

/// Middleware registered for one path prefix. The root scope has prefix `""`.
struct Scope {
    prefix: String,
    middleware: Vec<BoxedHandler>,
}

impl Scope {
    /// `/api` covers `/api` and `/api/…`, but not `/apiary`.
    fn covers(&self, path: &str) -> bool {
        if self.prefix.is_empty() {
            return true;
        }
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.ends_with('/'),
            None => false,
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router.
///
/// Build it once at startup, pass it to [`Server::serve`](crate::Server::serve).
/// Every method returns `self` so registrations chain:
///
/// ```rust,no_run
/// use strand::{BoxFuture, Context, Next, Router, StatusCode};
/// use strand::middleware::cors;
///
/// fn ping(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
///     Box::pin(async move { c.text(StatusCode::OK, "pong") })
/// }
///
/// let app = Router::with_defaults()
///     .with(cors)
///     .group("/api", |api| api.group("/v1", |v1| v1.get("/ping", ping)));
/// ```
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
    scopes: Vec<Scope>,
}

impl Router {
    pub fn new() -> Self {
        Self {
            routes: HashMap::new(),
            scopes: vec![Scope { prefix: String::new(), middleware: Vec::new() }],
        }
    }

    /// A router with [`logger`] and [`recovery`] already registered, in
    /// that order.
    pub fn with_defaults() -> Self {
        Self::new().with(logger).with(recovery)
    }

    /// Registers global middleware. It runs for every request, matched or not.
    pub fn with<H>(mut self, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.scopes[0].middleware.push(boxed(handler));
        self
    }

    /// Registers a route handler for a method + path pair.
    ///
    /// Path parameters use `{name}` syntax and are read with
    /// [`Context::param`].
    ///
    /// # Panics
    ///
    /// Panics if the path is not a valid pattern or conflicts with an
    /// existing route for the same method.
    pub fn on<H>(mut self, method: Method, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.insert(method, path, boxed(handler));
        self
    }

    pub fn get<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::GET, path, handler)
    }

    pub fn post<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::POST, path, handler)
    }

    pub fn put<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::DELETE, path, handler)
    }

    /// Registers a path-prefix group built by `build`.
    ///
    /// Middleware added to the group runs, after the global middleware, for
    /// every request whose path is under `prefix`, whether or not a route
    /// matched.
    pub fn group(mut self, prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        let group = build(Group::new(prefix.to_owned()));
        self.mount(group);
        self
    }

    fn mount(&mut self, group: Group) {
        let Group { prefix, middleware, routes, children } = group;
        for (method, path, handler) in routes {
            self.insert(method, &format!("{prefix}{path}"), handler);
        }
        self.scopes.push(Scope { prefix, middleware });
        for child in children {
            self.mount(child);
        }
    }

    fn insert(&mut self, method: Method, path: &str, handler: BoxedHandler) {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
    }

    fn lookup(&self, method: &Method, path: &str) -> Option<(BoxedHandler, HashMap<String, String>)> {
        let tree = self.routes.get(method)?;
        let matched = tree.at(path).ok()?;
        let handler = Arc::clone(matched.value);
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((handler, params))
    }

    /// The full, ordered chain for one request plus its path parameters.
    fn resolve(&self, method: &Method, path: &str) -> (Vec<BoxedHandler>, HashMap<String, String>) {
        let mut chain: Vec<BoxedHandler> = self.scopes.iter()
            .filter(|scope| scope.covers(path))
            .flat_map(|scope| scope.middleware.iter().cloned())
            .collect();

        match self.lookup(method, path) {
            Some((handler, params)) => {
                chain.push(handler);
                (chain, params)
            }
            None => {
                chain.push(boxed(not_found));
                (chain, HashMap::new())
            }
        }
    }

    /// Runs one request through its chain and returns the finished response.
    ///
    /// This is what the [`Server`](crate::Server) calls per request; it is
    /// public so applications and tests can drive a router without a socket.
    pub async fn handle(&self, req: http::Request<Bytes>) -> http::Response<Full<Bytes>> {
        let (parts, body) = req.into_parts();
        let (chain, params) = self.resolve(&parts.method, parts.uri.path());

        let mut ctx = Context::new(Request::new(parts, body, params), chain);
        ctx.run().await;
        ctx.into_response()
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

fn not_found(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let message = format!("404 NOT FOUND: {}", c.path());
        c.fail(StatusCode::NOT_FOUND, &message);
    })
}

// ── Group ─────────────────────────────────────────────────────────────────────

/// A path-prefix group, handed to the closure given to [`Router::group`].
///
/// Route paths and nested prefixes are relative to the group's prefix.
pub struct Group {
    prefix: String,
    middleware: Vec<BoxedHandler>,
    routes: Vec<(Method, String, BoxedHandler)>,
    children: Vec<Group>,
}

impl Group {
    fn new(prefix: String) -> Self {
        Self { prefix, middleware: Vec::new(), routes: Vec::new(), children: Vec::new() }
    }

    /// Registers middleware for this group and every group nested in it.
    pub fn with<H>(mut self, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.middleware.push(boxed(handler));
        self
    }

    pub fn on<H>(mut self, method: Method, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.routes.push((method, path.to_owned(), boxed(handler)));
        self
    }

    pub fn get<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::GET, path, handler)
    }

    pub fn post<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::POST, path, handler)
    }

    pub fn put<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::PUT, path, handler)
    }

    pub fn delete<H>(self, path: &str, handler: H) -> Self
    where
        H: for<'a> Fn(&'a mut Context, Next) -> BoxFuture<'a, ()> + Send + Sync + 'static,
    {
        self.on(Method::DELETE, path, handler)
    }

    /// Nests a group under this one. Its middleware runs after this group's.
    pub fn group(mut self, prefix: &str, build: impl FnOnce(Group) -> Group) -> Self {
        let child = build(Group::new(format!("{}{prefix}", self.prefix)));
        self.children.push(child);
        self
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use http_body_util::BodyExt;

    use super::*;

    type Trail = Arc<Mutex<Vec<&'static str>>>;

    fn request(method: Method, uri: &str) -> http::Request<Bytes> {
        http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
    }

    async fn body(res: http::Response<Full<Bytes>>) -> Bytes {
        res.into_body().collect().await.unwrap().to_bytes()
    }

    fn hello(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let name = c.param("name").unwrap_or("stranger").to_owned();
            c.text(StatusCode::OK, format!("hello {name}"));
        })
    }

    /// Builds a router whose every handler appends its tag to `trail`.
    fn traced_app(trail: &Trail) -> Router {
        let mark = |tag: &'static str| {
            let trail = Arc::clone(trail);
            boxed(move |c, next| {
                let trail = Arc::clone(&trail);
                Box::pin(async move {
                    trail.lock().unwrap().push(tag);
                    next.run(c).await;
                })
            })
        };
        let (root, api, v1, admin) = (mark("root"), mark("api"), mark("v1"), mark("admin"));
        let route = mark("route");

        Router::new()
            .with(move |c, next| root(c, next))
            .group("/api", |g| {
                g.with(move |c, next| api(c, next))
                    .group("/v1", |g| {
                        g.with(move |c, next| v1(c, next))
                            .get("/ping", move |c, next| route(c, next))
                    })
            })
            .group("/admin", |g| g.with(move |c, next| admin(c, next)))
    }

    #[tokio::test]
    async fn chain_is_global_then_groups_outer_to_inner_then_route() {
        let trail = Trail::default();
        let app = traced_app(&trail);

        let res = app.handle(request(Method::GET, "/api/v1/ping")).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(*trail.lock().unwrap(), ["root", "api", "v1", "route"]);
    }

    #[tokio::test]
    async fn unmatched_path_runs_covering_middleware_then_404() {
        let trail = Trail::default();
        let app = traced_app(&trail);

        let res = app.handle(request(Method::GET, "/api/v2/ping")).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(res).await, "404 NOT FOUND: /api/v2/ping");
        assert_eq!(*trail.lock().unwrap(), ["root", "api"]);
    }

    #[tokio::test]
    async fn wrong_method_is_not_found() {
        let trail = Trail::default();
        let app = traced_app(&trail);

        let res = app.handle(request(Method::POST, "/api/v1/ping")).await;

        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(*trail.lock().unwrap(), ["root", "api", "v1"]);
    }

    #[tokio::test]
    async fn path_params_reach_the_handler() {
        let app = Router::new()
            .group("/api", |g| g.group("/v1", |g| g.get("/users/{name}", hello)));

        let res = app.handle(request(Method::GET, "/api/v1/users/alice")).await;

        assert_eq!(body(res).await, "hello alice");
    }

    #[tokio::test]
    async fn default_router_recovers_panics() {
        fn explode(_c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
            Box::pin(async move {
                let empty: Vec<u8> = Vec::new();
                assert!(empty[empty.len()] > 0);
            })
        }

        let app = Router::with_defaults().get("/panic", explode);
        let res = app.handle(request(Method::GET, "/panic")).await;

        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn scope_prefix_matches_on_segment_boundary() {
        let scope = Scope { prefix: "/api".to_owned(), middleware: Vec::new() };
        assert!(scope.covers("/api"));
        assert!(scope.covers("/api/v1"));
        assert!(!scope.covers("/apiary"));
        assert!(!scope.covers("/"));

        let root = Scope { prefix: String::new(), middleware: Vec::new() };
        assert!(root.covers("/anything"));
    }

    #[test]
    #[should_panic(expected = "invalid route")]
    fn conflicting_routes_panic() {
        let _ = Router::new().get("/users/{id}", hello).get("/users/{name}", hello);
    }
}
