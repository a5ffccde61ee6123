//! An in-memory response sink.
//!
//! Useful in tests, and for running a handler without a server:
//!
//! ```rust
//! use hitch::{handler_fn, Handler, Request, ResponseRecorder, ResponseWriter};
//!
//! let hello = handler_fn(|_req, w| {
//!     w.write_all(b"hello")?;
//!     Ok(())
//! });
//!
//! let mut rec = ResponseRecorder::new();
//! let req = Request::new(http::Request::new(bytes::Bytes::new()));
//! hello.serve(&req, &mut rec).unwrap();
//!
//! assert_eq!(rec.status(), 200);
//! assert_eq!(rec.body(), b"hello");
//! ```

use std::io;

use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};

use crate::writer::{Flusher, ResponseWriter};

/// Records everything a handler writes.
///
/// Behaves like a typical host sink: the first header write wins, and a body
/// write or flush without a prior header implies `200 OK`.
#[derive(Debug)]
pub struct ResponseRecorder {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    wrote_header: bool,
    flushed: bool,
}

impl ResponseRecorder {
    pub fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: BytesMut::new(),
            wrote_header: false,
            flushed: false,
        }
    }

    /// The recorded status. `200 OK` until something else is written.
    pub fn status(&self) -> StatusCode { self.status }

    pub fn body(&self) -> &[u8] { &self.body }

    /// Body as UTF-8, lossily converted.
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn wrote_header(&self) -> bool { self.wrote_header }
    pub fn flushed(&self) -> bool { self.flushed }

    /// Hands over the recorded parts, e.g. to build an `http::Response`.
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self { Self::new() }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap { &self.headers }
    fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }

    fn write_header(&mut self, status: StatusCode) {
        if self.wrote_header {
            return;
        }
        self.status = status;
        self.wrote_header = true;
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }
        self.body.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flusher(&mut self) -> Option<&mut dyn Flusher> {
        Some(self)
    }
}

impl Flusher for ResponseRecorder {
    fn flush(&mut self) -> io::Result<()> {
        if !self.wrote_header {
            self.write_header(StatusCode::OK);
        }
        self.flushed = true;
        Ok(())
    }
}
