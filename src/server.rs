//! HTTP server and graceful shutdown.
//!
//! The server is the host runtime for a chain: it accepts connections, turns
//! each hyper request into a [`Request`] and a streaming
//! [`ResponseWriter`](crate::ResponseWriter), and runs the effective handler.
//!
//! Handlers are synchronous, so each one runs on tokio's blocking pool. A
//! handler that sleeps, reads a file or waits on a lock only holds up its own
//! request.
//!
//! # Graceful shutdown and Kubernetes
//!
//! When Kubernetes terminates a pod it sends **SIGTERM** and waits
//! `terminationGracePeriodSeconds` before sending SIGKILL. On the signal the
//! server stops accepting, lets in-flight connections finish, then returns
//! from [`Server::serve`].

use std::convert::Infallible;
use std::future::Future;
use std::io;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler};
use crate::request::Request;
use crate::response::{http_error, set_error_headers, status_text};
use crate::sink::HyperResponseWriter;

type ResponseBody = UnsyncBoxBody<Bytes, io::Error>;

enum Bind {
    Addr(String),
    Listener(TcpListener),
}

/// The HTTP server.
pub struct Server {
    bind: Bind,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called. Resolution and bind errors surface from `serve`.
    ///
    /// ```rust,no_run
    /// use hitch::Server;
    /// let server = Server::bind("0.0.0.0:3000");
    /// ```
    pub fn bind(addr: impl Into<String>) -> Self {
        Self { bind: Bind::Addr(addr.into()) }
    }

    /// Serves on an already-bound listener, e.g. one bound to port 0 in tests.
    pub fn from_listener(listener: TcpListener) -> Self {
        Self { bind: Bind::Listener(listener) }
    }

    /// Serves `handler` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, handler: BoxedHandler) -> Result<(), Error> {
        self.serve_with_shutdown(handler, shutdown_signal()).await
    }

    /// Serves `handler` until `signal` resolves, then drains in-flight
    /// connections.
    pub async fn serve_with_shutdown<S>(self, handler: BoxedHandler, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = match self.bind {
            Bind::Addr(addr) => TcpListener::bind(addr).await?,
            Bind::Listener(listener) => listener,
        };
        let local_addr = listener.local_addr()?;

        info!(addr = %local_addr, "hitch listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Check shutdown first so a signal stops accepting right away,
                // even with connections queued.
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

                    let handler = BoxedHandler::clone(&handler);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        // Called once per request on the connection.
                        let svc = service_fn(move |req| {
                            let handler = BoxedHandler::clone(&handler);
                            async move { dispatch(handler, req, remote_addr).await }
                        });

                        // HTTP/1.1 or HTTP/2, whichever the client speaks.
                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            debug!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                // Reap finished connections so the set stays small.
                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("hitch stopped");
        Ok(())
    }
}

// ── Request dispatch ──────────────────────────────────────────────────────────

/// Runs the handler for one request and streams back what it writes.
///
/// Never fails towards hyper: handler errors and panics become a plain `500`
/// when nothing was written yet.
async fn dispatch(
    handler: BoxedHandler,
    req: hyper::Request<Incoming>,
    remote_addr: SocketAddr,
) -> Result<http::Response<ResponseBody>, Infallible> {
    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(peer = %remote_addr, "failed to read request body: {e}");
            return Ok(plain_error(http::StatusCode::BAD_REQUEST));
        }
    };

    let request = Request::from_parts(parts, body).with_remote_addr(remote_addr.to_string());
    let method = request.method().clone();
    let path = request.path().to_owned();

    let (mut sink, head_rx, frames) = HyperResponseWriter::channel();

    // Panics without a recovery middleware end the blocking task; the
    // dropped head sender is what tells us below.
    tokio::task::spawn_blocking(move || {
        if let Err(err) = handler.serve(&request, &mut sink) {
            error!(%method, %path, kind = ?err.kind(), "handler failed: {err}");

            if !sink.head_sent() {
                let status = http::StatusCode::INTERNAL_SERVER_ERROR;
                if let Err(e) = http_error(&mut sink, status_text(status), status) {
                    debug!("could not send error response: {e}");
                }
            }
        }

        if let Err(e) = sink.finish() {
            debug!("response body not fully sent: {e}");
        }
    });

    let Ok((status, headers)) = head_rx.await else {
        error!(peer = %remote_addr, "handler panicked before writing a response");
        return Ok(plain_error(http::StatusCode::INTERNAL_SERVER_ERROR));
    };

    let mut response = http::Response::new(StreamBody::new(frames).boxed_unsync());
    *response.status_mut() = status;
    *response.headers_mut() = headers;

    Ok(response)
}

/// A complete plain-text response for failures outside any handler.
fn plain_error(status: http::StatusCode) -> http::Response<ResponseBody> {
    let body = Full::new(Bytes::from(format!("{}\n", status_text(status))))
        .map_err(|never| match never {})
        .boxed_unsync();

    let mut response = http::Response::new(body);
    *response.status_mut() = status;
    set_error_headers(response.headers_mut());
    response
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C exists.
///
/// If a handler cannot be installed that source is disabled and logged,
/// rather than shutting the server down immediately.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
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
        () = ctrl_c  => {}
        () = sigterm => {}
    }
}
