//! Incoming HTTP request type and the helpers that read it.

use std::net::{IpAddr, SocketAddr};

use bytes::Bytes;
use http::{HeaderMap, Method, Uri};
use serde::de::DeserializeOwned;

use crate::error::Error;

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REQUESTED_WITH: &str = "x-requested-with";

/// An incoming HTTP request with its body fully read.
///
/// Besides the parsed request this carries two facts only the transport
/// knows: the peer address and whether the connection is encrypted.
#[derive(Debug)]
pub struct Request {
    inner: http::Request<Bytes>,
    remote_addr: String,
    secure: bool,
}

impl Request {
    pub fn new(inner: http::Request<Bytes>) -> Self {
        Self { inner, remote_addr: String::new(), secure: false }
    }

    pub(crate) fn from_parts(parts: http::request::Parts, body: Bytes) -> Self {
        Self::new(http::Request::from_parts(parts, body))
    }

    /// Sets the peer address as the transport reports it, e.g. `"203.0.113.5:443"`.
    pub fn with_remote_addr(mut self, addr: impl Into<String>) -> Self {
        self.remote_addr = addr.into();
        self
    }

    /// Marks the request as received over TLS.
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn method(&self) -> &Method { self.inner.method() }
    pub fn uri(&self) -> &Uri { self.inner.uri() }
    pub fn path(&self) -> &str { self.inner.uri().path() }
    pub fn headers(&self) -> &HeaderMap { self.inner.headers() }
    pub fn body(&self) -> &[u8] { self.inner.body() }
    pub fn remote_addr(&self) -> &str { &self.remote_addr }

    /// Case-insensitive header lookup. Returns the first value, if it is
    /// visible ASCII.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name)?.to_str().ok()
    }

    /// Whether the request arrived over TLS.
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Whether the request was sent by a browser's `XMLHttpRequest`.
    pub fn is_xml_http_request(&self) -> bool {
        self.header(X_REQUESTED_WITH) == Some("XMLHttpRequest")
    }

    /// Best guess at the client's address.
    ///
    /// Checks, in order:
    /// 1. `X-Real-IP`
    /// 2. `X-Forwarded-For`, left to right, skipping blank or garbled entries
    /// 3. the transport's peer address, without its port
    ///
    /// Forwarding headers are trivially spoofable. Only trust them when the
    /// service sits behind a proxy that overwrites them.
    pub fn client_ip(&self) -> Option<IpAddr> {
        self.header(X_REAL_IP)
            .and_then(parse_ip)
            .or_else(|| {
                self.header(X_FORWARDED_FOR)
                    .and_then(|list| list.split(',').find_map(parse_ip))
            })
            .or_else(|| parse_ip(&self.remote_addr))
    }

    /// Decodes the body as a single JSON document.
    pub fn decode_json<T: DeserializeOwned>(&self) -> Result<T, Error> {
        Ok(serde_json::from_slice(self.inner.body())?)
    }

    pub fn into_inner(self) -> http::Request<Bytes> {
        self.inner
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(inner: http::Request<Bytes>) -> Self {
        Self::new(inner)
    }
}

/// Parses an IP address, with or without a port.
///
/// Accepts `192.0.2.1`, `2001:db8::1`, `192.0.2.1:8080` and
/// `[2001:db8::1]:8080`. Surrounding whitespace is ignored; anything else,
/// including host names, yields `None`.
pub fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    s.parse::<IpAddr>()
        .ok()
        .or_else(|| s.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}
