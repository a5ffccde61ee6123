//! The response sink contract and its optional capabilities.
//!
//! A [`ResponseWriter`] is what a host runtime hands to a handler: a place to
//! put headers, a status line and body bytes. Some sinks can do more (flush
//! buffered output, give up the raw connection, push a resource over HTTP/2).
//! Those extras are separate traits, reached through probe methods that
//! return `Option`: a missing capability is a typed `None`, never a bad cast.

use std::io;

use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use crate::error::Error;

// ── ResponseWriter ────────────────────────────────────────────────────────────

/// The response sink a handler writes to.
///
/// Implementations must honour HTTP's rule that the header goes out once:
/// only the first `write_header` counts.
pub trait ResponseWriter {
    fn headers(&self) -> &HeaderMap;

    /// Header map to be sent with the status line. Changes after the header
    /// has been written have no effect on the wire.
    fn headers_mut(&mut self) -> &mut HeaderMap;

    fn write_header(&mut self, status: StatusCode);

    /// Writes body bytes, returning how many were accepted.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        None
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        None
    }

    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        None
    }

    /// Writes the whole buffer, retrying short writes.
    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "response writer accepted zero bytes",
                    ));
                }
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<W: ResponseWriter + ?Sized> ResponseWriter for &mut W {
    fn headers(&self) -> &HeaderMap {
        (**self).headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        (**self).headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        (**self).write_header(status)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        (**self).flusher()
    }

    fn hijacker(&mut self) -> Option<&mut dyn Hijacker> {
        (**self).hijacker()
    }

    fn pusher(&mut self) -> Option<&mut dyn Pusher> {
        (**self).pusher()
    }
}

// ── Capabilities ──────────────────────────────────────────────────────────────

/// Sends any buffered body bytes to the client now.
pub trait Flusher {
    fn flush(&mut self) -> io::Result<()>;
}

/// Hands the underlying connection over to the caller.
///
/// After a successful hijack the sink must not be written to again; the
/// caller owns the connection, including closing it.
pub trait Hijacker {
    fn hijack(&mut self) -> Result<Hijacked, Error>;
}

/// Initiates an HTTP/2 server push.
pub trait Pusher {
    fn push(&mut self, target: &str, opts: Option<&PushOptions>) -> Result<(), Error>;
}

/// A raw, bidirectional byte stream taken over from the server.
pub trait Connection: io::Read + io::Write + Send {}

impl<T: io::Read + io::Write + Send> Connection for T {}

/// The result of a successful hijack.
pub struct Hijacked {
    pub conn: Box<dyn Connection>,
    /// Bytes the server had already read from `conn` but not yet consumed.
    pub buffered: Bytes,
}

impl std::fmt::Debug for Hijacked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hijacked")
            .field("buffered", &self.buffered.len())
            .finish_non_exhaustive()
    }
}

/// Options for [`Pusher::push`].
#[derive(Clone, Debug, Default)]
pub struct PushOptions {
    /// Method of the promised request. `GET` when unset.
    pub method: Option<Method>,
    /// Extra request headers for the promised request.
    pub headers: HeaderMap,
}
