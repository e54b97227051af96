//! End-to-end chain behaviour through `Router::handle`, no sockets.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use strand::middleware::{cors, logger, recovery};
use strand::{BoxFuture, Context, Method, Next, Router, StatusCode};

const CORS_HEADERS: [(&str, &str); 4] = [
    ("access-control-allow-origin", "*"),
    ("access-control-allow-methods", "GET,POST,PUT,DELETE,OPTIONS"),
    ("access-control-allow-headers", "Content-Type,Authorization,X-Requested-With"),
    ("access-control-max-age", "86400"),
];

fn request(method: Method, uri: &str) -> http::Request<Bytes> {
    http::Request::builder().method(method).uri(uri).body(Bytes::new()).unwrap()
}

async fn body(res: http::Response<Full<Bytes>>) -> Bytes {
    res.into_body().collect().await.unwrap().to_bytes()
}

fn assert_cors<B>(res: &http::Response<B>) {
    for (name, value) in CORS_HEADERS {
        assert_eq!(res.headers()[name], value, "{name}");
    }
}

fn panic_on_index_100(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
    Box::pin(async move {
        let names = vec!["geektutu"];
        let index = names.len() + 99;
        c.text(StatusCode::OK, names[index]);
    })
}

#[derive(Clone, Default)]
struct Logs(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for Logs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Logs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
async fn cors_logger_recovery_around_panicking_route() {
    let logs = Logs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let app = Router::new()
        .with(cors)
        .with(logger)
        .with(recovery)
        .get("/panic", panic_on_index_100);

    let res = app.handle(request(Method::GET, "/panic")).await;

    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_cors(&res);
    assert_eq!(body(res).await, "Internal Server Error");

    let out = logs.text();
    assert_eq!(out.matches("[500] /panic in ").count(), 1, "{out}");
    assert_eq!(out.matches("Traceback:").count(), 1, "{out}");
    assert!(out.contains("index out of bounds: the len is 1 but the index is 100"), "{out}");
}

#[tokio::test]
async fn preflight_never_reaches_the_route() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&hits);

    let app = Router::new().with(cors).on(Method::OPTIONS, "/things", move |c, next| {
        counted.fetch_add(1, Ordering::SeqCst);
        next.run(c)
    });

    let res = app.handle(request(Method::OPTIONS, "/things")).await;

    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert_cors(&res);
    assert!(body(res).await.is_empty());
    assert_eq!(hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn server_keeps_answering_after_a_fault() {
    let app = Router::with_defaults()
        .get("/panic", panic_on_index_100)
        .get("/ok", |c, _next| Box::pin(async move { c.text(StatusCode::OK, "still here") }));

    for _ in 0..3 {
        let res = app.handle(request(Method::GET, "/panic")).await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let res = app.handle(request(Method::GET, "/ok")).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body(res).await, "still here");
    }
}

#[tokio::test]
async fn concurrent_requests_do_not_share_context() {
    let app = Arc::new(Router::new().get("/echo/{word}", |c, _next| {
        Box::pin(async move {
            let word = c.param("word").unwrap_or_default().to_owned();
            tokio::task::yield_now().await;
            c.text(StatusCode::OK, word);
        })
    }));

    let mut tasks = tokio::task::JoinSet::new();
    for i in 0..16 {
        let app = Arc::clone(&app);
        tasks.spawn(async move {
            let res = app.handle(request(Method::GET, &format!("/echo/w{i}"))).await;
            (i, body(res).await)
        });
    }
    while let Some(joined) = tasks.join_next().await {
        let (i, bytes) = joined.unwrap();
        assert_eq!(bytes, format!("w{i}"));
    }
}

#[tokio::test]
async fn failed_handler_output_is_final() {
    fn require_q(c: &mut Context, next: Next) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if c.header("x-q").is_none() {
                c.fail(StatusCode::BAD_REQUEST, "missing q");
                return;
            }
            next.run(c).await;
        })
    }

    fn overwrite_after(c: &mut Context, next: Next) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            next.run(c).await;
            c.text(StatusCode::OK, "overwritten");
        })
    }

    let app = Router::new()
        .with(overwrite_after)
        .with(require_q)
        .post("/chat", |c, _next| Box::pin(async move { c.text(StatusCode::OK, "answer") }));

    let res = app.handle(request(Method::POST, "/chat")).await;

    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body(res).await, "missing q");
}

#[tokio::test]
async fn json_reply_escapes_client_supplied_text() {
    fn greet(c: &mut Context, _next: Next) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let name = String::from_utf8_lossy(c.body()).into_owned();
            match serde_json::to_vec(&serde_json::json!({ "hello": name })) {
                Ok(body) => c.json(StatusCode::OK, body),
                Err(e) => c.fail(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()),
            }
        })
    }

    let app = Router::new().post("/greet", greet);
    let name = r#"al"ice\ "},"admin":true,"x":{""#;
    let req = http::Request::builder()
        .method(Method::POST)
        .uri("/greet")
        .body(Bytes::from(name))
        .unwrap();

    let res = app.handle(req).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/json");
    let value: serde_json::Value = serde_json::from_slice(&body(res).await).unwrap();
    assert_eq!(value, serde_json::json!({ "hello": name }));
    assert!(value.get("admin").is_none());
}
