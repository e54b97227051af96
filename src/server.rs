//! HTTP server and graceful shutdown.
//!
//! [`Server::serve_with_shutdown`] accepts connections until its signal
//! future resolves, then stops accepting, waits for every in-flight
//! connection task to finish and returns. [`Server::serve`] uses SIGTERM or
//! Ctrl-C as that signal.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::router::Router;

enum Listen {
    Addr(SocketAddr),
    Bound(TcpListener),
}

/// The HTTP server.
///
/// Each connection runs on its own tokio task; each request on it is
/// dispatched through the [`Router`] one handler at a time.
pub struct Server {
    listen: Listen,
}

impl Server {
    /// Configures the server to bind to `addr` when it starts serving.
    ///
    /// # Panics
    ///
    /// Panics if `addr` is not a valid `host:port` string.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use strand::Server;
    /// let server = Server::bind("0.0.0.0:9999");
    /// ```
    pub fn bind(addr: &str) -> Self {
        let addr: SocketAddr = addr.parse().expect("invalid socket address");
        Self { listen: Listen::Addr(addr) }
    }

    /// Serves on a listener that is already bound, e.g. to port 0.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { listen: Listen::Bound(listener) }
    }

    /// Starts accepting connections and dispatching them through `router`.
    ///
    /// Returns only after a full graceful shutdown (SIGTERM or Ctrl-C,
    /// followed by all in-flight requests completing).
    pub async fn serve(self, router: Router) -> Result<(), Error> {
        self.serve_with_shutdown(router, shutdown_signal()).await
    }

    /// Like [`serve`](Server::serve), but shuts down when `signal` resolves.
    pub async fn serve_with_shutdown<S>(self, router: Router, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = match self.listen {
            Listen::Bound(listener) => listener,
            Listen::Addr(addr) => TcpListener::bind(addr)
                .await
                .map_err(|source| Error::Bind { addr, source })?,
        };
        let addr = listener.local_addr()?;

        // Shared by every connection task; the routing table is never copied.
        let router = Arc::new(router);

        info!(%addr, "strand listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting at once,
                // even with connections still queued.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let router = Arc::clone(&router);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let router = Arc::clone(&router);
                            async move { dispatch(router, req, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whatever the client speaks.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connection tasks so the JoinSet does not grow
                // without bound on long-running servers.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("strand stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Collects the body and hands the request to the router.
///
/// Never fails: every outcome, including an unreadable body, is a response.
async fn dispatch(
    router: Arc<Router>,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            let mut res = http::Response::new(Full::new(Bytes::new()));
            *res.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(res);
        }
    };

    Ok(router.handle(http::Request::from_parts(parts, body)).await)
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or Ctrl-C. On Windows only Ctrl-C exists.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}
