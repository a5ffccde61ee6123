//! Panic containment at the chain boundary.
//!
//! A panic in one handler must not take the process down with it, nor leave
//! the client hanging. [`Recovery`] calls the next handler under
//! [`catch_unwind`](std::panic::catch_unwind); if it unwinds, the panic
//! message goes to the [`Logger`] and the client gets a generic
//! `500 Internal Server Error`. The details never reach the client.
//!
//! Only panics on the calling thread are caught. Work a handler hands off to
//! other threads or tasks needs its own boundary.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use http::StatusCode;

use crate::error::Error;
use crate::handler::{BoxedHandler, Handler, Middleware, middleware_fn};
use crate::logger::Logger;
use crate::request::Request;
use crate::response::{http_error, status_text};
use crate::writer::ResponseWriter;

/// A handler that turns panics in `next` into `500` responses.
#[derive(Clone)]
pub struct Recovery {
    next: BoxedHandler,
    logger: Option<Arc<dyn Logger>>,
}

impl Recovery {
    /// Wraps `next`. Without a logger, panics are contained silently.
    pub fn new(next: BoxedHandler, logger: Option<Arc<dyn Logger>>) -> Self {
        Self { next, logger }
    }

    fn log(&self, message: &str) {
        if let Some(logger) = &self.logger {
            logger.log(message);
        }
    }
}

impl Handler for Recovery {
    fn serve(&self, req: &Request, w: &mut dyn ResponseWriter) -> Result<(), Error> {
        // The writer is only touched again to send the error reply, and the
        // request is read-only, so observing them after an unwind is sound.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.next.serve(req, w)));

        match outcome {
            Ok(result) => result,
            Err(payload) => {
                self.log(&panic_message(payload.as_ref()));

                let status = StatusCode::INTERNAL_SERVER_ERROR;
                http_error(w, status_text(status), status)?;
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for Recovery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recovery")
            .field("logger", &self.logger.is_some())
            .finish_non_exhaustive()
    }
}

/// Wraps `next` in a [`Recovery`] and boxes it.
pub fn recovery_handler(next: BoxedHandler, logger: Option<Arc<dyn Logger>>) -> BoxedHandler {
    Arc::new(Recovery::new(next, logger))
}

/// [`Recovery`] as chain middleware.
pub fn recovery(logger: Option<Arc<dyn Logger>>) -> Middleware {
    middleware_fn(move |next| recovery_handler(next, logger.clone()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
