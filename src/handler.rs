//! The handler trait, the function adapter and the middleware shape.
//!
//! # How handlers are stored
//!
//! A chain has to hold handlers of *different* concrete types and hand them
//! to each other, so everything is erased to one shape:
//!
//! ```text
//! fn index(req, w) -> Result<(), Error> { … }   ← user writes this
//!        ↓ handler_fn(index)
//! Arc::new(HandlerFunc(index))                  ← heap-allocated adapter
//!        ↓  stored as BoxedHandler = Arc<dyn Handler>
//! handler.serve(&req, &mut w)  at request time  ← one vtable dispatch
//! ```
//!
//! Middleware is then just a function from one `BoxedHandler` to another.
//! The per-request cost is a virtual call per layer; building the chain
//! happens once at startup.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::request::Request;
use crate::writer::ResponseWriter;

// ── Handler ───────────────────────────────────────────────────────────────────

/// Processes one request by writing to its response sink.
///
/// Expected failures come back as `Err`; panics are a separate channel and
/// are caught by [`Recovery`](crate::middleware::Recovery) when installed.
///
/// Implement it on your own types, or lift a plain function with
/// [`handler_fn`]:
///
/// ```rust
/// use hitch::{Error, Handler, Request, ResponseWriter};
///
/// struct Hello;
///
/// impl Handler for Hello {
///     fn serve(&self, _req: &Request, w: &mut dyn ResponseWriter) -> Result<(), Error> {
///         w.write_all(b"hello")?;
///         Ok(())
///     }
/// }
/// ```
pub trait Handler: Send + Sync + 'static {
    fn serve(&self, req: &Request, w: &mut dyn ResponseWriter) -> Result<(), Error>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// A transform from one handler to another.
///
/// Middleware must not keep per-request state in itself: the handler it
/// returns is shared by every request that flows through the chain.
pub type Middleware = Arc<dyn Fn(BoxedHandler) -> BoxedHandler + Send + Sync>;

// ── HandlerFunc ───────────────────────────────────────────────────────────────

/// Adapter that lets an ordinary function or closure act as a [`Handler`].
pub struct HandlerFunc<F>(F);

impl<F> HandlerFunc<F>
where
    F: Fn(&Request, &mut dyn ResponseWriter) -> Result<(), Error> + Send + Sync + 'static,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Handler for HandlerFunc<F>
where
    F: Fn(&Request, &mut dyn ResponseWriter) -> Result<(), Error> + Send + Sync + 'static,
{
    fn serve(&self, req: &Request, w: &mut dyn ResponseWriter) -> Result<(), Error> {
        (self.0)(req, w)
    }
}

impl<F> fmt::Debug for HandlerFunc<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerFunc").finish_non_exhaustive()
    }
}

/// Lifts a function into a shared [`BoxedHandler`].
pub fn handler_fn<F>(f: F) -> BoxedHandler
where
    F: Fn(&Request, &mut dyn ResponseWriter) -> Result<(), Error> + Send + Sync + 'static,
{
    Arc::new(HandlerFunc::new(f))
}

/// Boxes any [`Handler`] for use in a chain.
pub fn boxed<H: Handler>(handler: H) -> BoxedHandler {
    Arc::new(handler)
}

/// Builds a [`Middleware`] from a closure.
///
/// ```rust
/// use hitch::{handler_fn, middleware_fn, Handler};
///
/// let server_header = middleware_fn(|next| {
///     handler_fn(move |req, w| {
///         w.headers_mut().insert("server", "hitch".parse().unwrap());
///         next.serve(req, w)
///     })
/// });
/// ```
pub fn middleware_fn<F>(f: F) -> Middleware
where
    F: Fn(BoxedHandler) -> BoxedHandler + Send + Sync + 'static,
{
    Arc::new(f)
}
