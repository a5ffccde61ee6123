//! Built-in middleware.
//!
//! Middleware wraps a handler to add behaviour around every request: panic
//! containment, access logging, header injection, authentication. Each
//! constructor here returns a [`Middleware`](crate::Middleware) ready to go
//! into a [`Chain`](crate::Chain).
//!
//! - [`recovery`] turns a panicking handler into a `500 Internal Server Error`
//! - [`trace`] logs method, path, status, size and latency per request
//!
//! Order matters. Recovery usually goes first so that it also covers the
//! middleware after it:
//!
//! ```rust
//! use std::sync::Arc;
//! use hitch::{middleware, Chain, TracingLogger};
//!
//! let chain = Chain::new([
//!     middleware::recovery(Some(Arc::new(TracingLogger))),
//!     middleware::trace(),
//! ]);
//! ```

mod recovery;
mod trace;

pub use recovery::{Recovery, recovery, recovery_handler};
pub use trace::trace;
