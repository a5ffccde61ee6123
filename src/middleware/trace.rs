//! Per-request access logging.

use std::time::Instant;

use tracing::{info, info_span, warn};

use crate::handler::{Handler, Middleware, handler_fn, middleware_fn};
use crate::tracking::TrackingWriter;

/// Logs one event per request with method, path, status, body size and
/// latency, inside a `request` span that inner handlers inherit.
///
/// A status of `0` means the handler never called `write_header`; the host
/// may still have sent an implicit `200`.
pub fn trace() -> Middleware {
    middleware_fn(|next| {
        handler_fn(move |req, w| {
            let span = info_span!("request", method = %req.method(), path = %req.path());
            let _guard = span.enter();

            let started = Instant::now();
            let mut tracked = TrackingWriter::new(w);
            let outcome = next.serve(req, &mut tracked);
            let latency_us = started.elapsed().as_micros() as u64;

            match &outcome {
                Ok(()) => info!(
                    status = tracked.status(),
                    bytes = tracked.length(),
                    written = tracked.written(),
                    latency_us,
                    "request completed"
                ),
                Err(err) => warn!(
                    status = tracked.status(),
                    bytes = tracked.length(),
                    latency_us,
                    error = %err,
                    "request failed"
                ),
            }

            outcome
        })
    })
}
