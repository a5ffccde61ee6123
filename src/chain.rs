//! Ordered middleware composition.
//!
//! A [`Chain`] is a list of [`Middleware`] built once at startup. Calling
//! [`Chain::then`] folds the list around a terminal handler, right to left,
//! so the first middleware registered is the outermost one:
//!
//! ```text
//! Chain::new([m0, m1, m2]).then(Some(h))  ==  m0(m1(m2(h)))
//!
//!   m0 ─▶ m1 ─▶ m2 ─▶ h
//!   m0 ◀─ m1 ◀─ m2 ◀─┘
//! ```
//!
//! `m0` runs first and finishes last. Put logging before auth if you want
//! rejected requests in the log; put it after if you don't.

use std::sync::Arc;

use crate::error::Error;
use crate::handler::{BoxedHandler, HandlerFunc, Middleware};
use crate::request::Request;
use crate::writer::ResponseWriter;

/// An immutable, ordered stack of middleware.
///
/// Cloning is cheap and [`append`](Chain::append) never touches the receiver,
/// so a base chain can be shared by several derived chains:
///
/// ```rust
/// use hitch::{middleware_fn, Chain};
///
/// # let (trace, auth, cache) = (middleware_fn(|h| h), middleware_fn(|h| h), middleware_fn(|h| h));
/// let base = Chain::new([trace]);
/// let private = base.append([auth]);
/// let public = base.append([cache]);
///
/// assert_eq!(base.len(), 1);
/// assert_eq!(private.len(), 2);
/// assert_eq!(public.len(), 2);
/// ```
#[derive(Clone, Default)]
pub struct Chain {
    middlewares: Arc<[Middleware]>,
}

impl Chain {
    /// Creates a chain from `middlewares`, in order.
    ///
    /// Items may be `Middleware` or `Option<Middleware>`; `None` entries are
    /// skipped.
    pub fn new<I>(middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<Middleware>>,
    {
        Self::default().append(middlewares)
    }

    /// Returns a new chain with `middlewares` appended after the receiver's.
    pub fn append<I>(&self, middlewares: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Option<Middleware>>,
    {
        let middlewares: Vec<Middleware> = self
            .middlewares
            .iter()
            .cloned()
            .chain(middlewares.into_iter().filter_map(Into::into))
            .collect();

        Self { middlewares: middlewares.into() }
    }

    /// Number of middleware in the chain.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Whether the chain has no middleware; `then` then returns the terminal as is.
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Wraps `terminal` in every middleware and returns the result.
    ///
    /// With no terminal the innermost handler fails every request with
    /// [`Error::NoHandlerProvided`]. With no middleware, `terminal` is
    /// returned as is.
    pub fn then(&self, terminal: Option<BoxedHandler>) -> BoxedHandler {
        let mut next = terminal.unwrap_or_else(no_handler);

        for middleware in self.middlewares.iter().rev() {
            next = middleware(next);
        }

        next
    }

    /// [`then`](Chain::then) for a plain function.
    pub fn then_func<F>(&self, f: F) -> BoxedHandler
    where
        F: Fn(&Request, &mut dyn ResponseWriter) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.then(Some(Arc::new(HandlerFunc::new(f))))
    }
}

impl std::fmt::Debug for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain").field("len", &self.len()).finish()
    }
}

/// Builds and applies a chain in one step.
///
/// `compose(terminal, [m0, m1])` is `Chain::new([m0, m1]).then(terminal)`.
pub fn compose<I>(terminal: Option<BoxedHandler>, middlewares: I) -> BoxedHandler
where
    I: IntoIterator,
    I::Item: Into<Option<Middleware>>,
{
    Chain::new(middlewares).then(terminal)
}

/// [`compose`] for a plain function.
pub fn compose_func<F, I>(f: F, middlewares: I) -> BoxedHandler
where
    F: Fn(&Request, &mut dyn ResponseWriter) -> Result<(), Error> + Send + Sync + 'static,
    I: IntoIterator,
    I::Item: Into<Option<Middleware>>,
{
    Chain::new(middlewares).then_func(f)
}

fn no_handler() -> BoxedHandler {
    Arc::new(HandlerFunc::new(|_req: &Request, _w: &mut dyn ResponseWriter| {
        Err(Error::NoHandlerProvided)
    }))
}
