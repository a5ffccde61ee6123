//! A response writer decorator that remembers what was written.
//!
//! [`TrackingWriter`] sits between a handler and the host's sink. It forwards
//! everything, and on the way through it records the status code, the number
//! of body bytes and whether the header has gone out. Middleware that needs
//! to know "what did the inner handler send?" (access logs, metrics, error
//! pages that must not clobber a partial response) wraps the sink once and
//! reads the answers afterwards.
//!
//! # Status on implicit writes
//!
//! Only explicit [`write_header`](ResponseWriter::write_header) calls and
//! [`flush`](Flusher::flush) set the tracked status. A handler that writes
//! body bytes straight away typically makes the host send an implicit
//! `200 OK`, but [`TrackingWriter::status`] keeps reporting `0` and
//! [`TrackingWriter::written`] stays `false` in that case. The tracked values
//! describe what the handler *asked for*, not what the wire defaulted to.

use std::io;

use http::{HeaderMap, StatusCode};

use crate::error::{Capability, Error};
use crate::writer::{Flusher, Hijacked, Hijacker, PushOptions, Pusher, ResponseWriter};

/// Wraps a [`ResponseWriter`] and tracks status, length and header state.
///
/// Create one per request; it is not meant to outlive the request or to be
/// shared between requests.
///
/// ```rust
/// use hitch::{ResponseRecorder, ResponseWriter, TrackingWriter};
/// use http::StatusCode;
///
/// let mut w = TrackingWriter::new(ResponseRecorder::new());
/// assert_eq!(w.status(), 0);
///
/// w.write_header(StatusCode::NOT_FOUND);
/// w.write_header(StatusCode::OK); // ignored, first call wins
/// w.write_all(b"missing").unwrap();
///
/// assert_eq!(w.status(), 404);
/// assert_eq!(w.length(), 7);
/// assert!(w.written());
/// ```
#[derive(Debug)]
pub struct TrackingWriter<W> {
    inner: W,
    status: u16,
    length: usize,
    wrote_header: bool,
}

impl<W: ResponseWriter> TrackingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, status: 0, length: 0, wrote_header: false }
    }

    /// Status code of the response, or `0` if no header has been written.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Number of body bytes accepted by the underlying writer.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Whether the header has been written.
    pub fn written(&self) -> bool {
        self.wrote_header
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ResponseWriter> ResponseWriter for TrackingWriter<W> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.wrote_header {
            return;
        }

        self.status = status.as_u16();
        self.inner.write_header(status);
        self.wrote_header = true;
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.length += n;
        Ok(n)
    }

    // The probes answer for the inner writer so that a stack of decorators
    // reports the capabilities of the real sink at the bottom.

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        if self.inner.flusher().is_none() {
            return None;
        }
        Some(self)
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        if self.inner.hijacker().is_none() {
            return None;
        }
        Some(self)
    }

    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        if self.inner.pusher().is_none() {
            return None;
        }
        Some(self)
    }
}

impl<W: ResponseWriter> Flusher for TrackingWriter<W> {
    /// Writes a `200 OK` header if none was written yet, then flushes.
    /// A no-op when the inner writer cannot flush.
    fn flush(&mut self) -> io::Result<()> {
        if self.inner.flusher().is_none() {
            return Ok(());
        }

        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }

        match self.inner.flusher() {
            Some(flusher) => flusher.flush(),
            None => Ok(()),
        }
    }
}

impl<W: ResponseWriter> Hijacker for TrackingWriter<W> {
    fn hijack(&mut self) -> Result<Hijacked, Error> {
        match self.inner.hijacker() {
            Some(hijacker) => hijacker.hijack(),
            None => Err(Error::NotSupported(Capability::Hijack)),
        }
    }
}

impl<W: ResponseWriter> Pusher for TrackingWriter<W> {
    fn push(&mut self, target: &str, opts: Option<&PushOptions>) -> Result<(), Error> {
        match self.inner.pusher() {
            Some(pusher) => pusher.push(target, opts),
            None => Err(Error::NotSupported(Capability::Push)),
        }
    }
}
