//! # hitch
//!
//! Small building blocks for HTTP handlers: compose middleware into one
//! handler, contain panics at the edge, and watch what a handler wrote.
//! Nothing more. Nothing less.
//!
//! ## The contract
//!
//! A [`Handler`] gets a [`Request`] and a [`ResponseWriter`] and reports
//! success or an [`Error`]. Everything else is built from that:
//!
//! - [`Chain`]: ordered middleware, first registered is outermost
//! - [`TrackingWriter`]: a writer decorator that records status, length and
//!   whether the header went out, and passes flush / hijack / push through
//! - [`middleware::recovery`]: a panic becomes a `500`, not a dead process
//! - [`Server`]: a hyper-based host that runs the chain for every request
//!
//! What hitch intentionally leaves out: routing, TLS, rate limiting. Put a
//! router inside the chain, and a proxy in front of the server.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use hitch::{Chain, Server, TracingLogger, encode_json, middleware};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hitch::Error> {
//!     let app = Chain::new([
//!         middleware::recovery(Some(Arc::new(TracingLogger))),
//!         middleware::trace(),
//!     ])
//!     .then_func(|req, w| {
//!         let ip = req.client_ip().map(|ip| ip.to_string());
//!         encode_json(w, &ip)
//!     });
//!
//!     Server::bind("0.0.0.0:3000").serve(app).await
//! }
//! ```

mod chain;
mod error;
mod handler;
mod logger;
mod recorder;
mod request;
mod response;
mod server;
mod sink;
mod tracking;
mod writer;

pub mod middleware;

pub use chain::{Chain, compose, compose_func};
pub use error::{BoxError, Capability, Error, ErrorKind};
pub use handler::{BoxedHandler, Handler, HandlerFunc, Middleware, boxed, handler_fn, middleware_fn};
pub use logger::{Logger, TracingLogger};
pub use recorder::ResponseRecorder;
pub use request::{Request, parse_ip};
pub use response::{encode_json, http_error, status_text};
pub use server::Server;
pub use tracking::TrackingWriter;
pub use writer::{Connection, Flusher, Hijacked, Hijacker, PushOptions, Pusher, ResponseWriter};
