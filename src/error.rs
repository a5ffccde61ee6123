//! Unified error type.

use std::fmt;
use std::io;

use thiserror::Error;

/// A boxed application error, returned by handlers that fail for their own
/// reasons.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by handlers and by the optional writer
/// capabilities.
///
/// Panics are *not* errors: they are contained by
/// [`Recovery`](crate::middleware::Recovery) and turned into a 500 response.
/// Everything here is an ordinary outcome the caller decides how to surface.
#[derive(Debug, Error)]
pub enum Error {
    /// The chain was terminated without a real handler.
    #[error("no handler was provided")]
    NoHandlerProvided,

    /// An optional capability was invoked on a sink that does not offer it.
    #[error("{0} is not supported by the response writer")]
    NotSupported(Capability),

    #[error("io: {0}")]
    Io(#[from] io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Application failure reported by a handler.
    #[error(transparent)]
    Handler(#[from] BoxError),
}

impl Error {
    /// Wraps an application error.
    pub fn handler(err: impl Into<BoxError>) -> Self {
        Self::Handler(err.into())
    }

    /// The stable identity of this error. Compare kinds, not messages.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NoHandlerProvided => ErrorKind::NoHandlerProvided,
            Self::NotSupported(_)   => ErrorKind::NotSupported,
            Self::Io(_)             => ErrorKind::Io,
            Self::Json(_)           => ErrorKind::Json,
            Self::Handler(_)        => ErrorKind::Handler,
        }
    }
}

/// Comparable identity of an [`Error`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ErrorKind {
    NoHandlerProvided,
    NotSupported,
    Io,
    Json,
    Handler,
}

/// Optional transport capabilities a response writer may offer.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Capability {
    Flush,
    Hijack,
    Push,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Flush  => "flush",
            Self::Hijack => "hijack",
            Self::Push   => "push",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_are_stable_across_messages() {
        assert_eq!(Error::NoHandlerProvided.kind(), ErrorKind::NoHandlerProvided);
        assert_eq!(Error::NotSupported(Capability::Push).kind(), ErrorKind::NotSupported);
        assert_eq!(Error::handler("boom").kind(), ErrorKind::Handler);
        assert_eq!(
            Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone")).kind(),
            ErrorKind::Io,
        );
    }

    #[test]
    fn messages() {
        assert_eq!(Error::NoHandlerProvided.to_string(), "no handler was provided");
        assert_eq!(
            Error::NotSupported(Capability::Hijack).to_string(),
            "hijack is not supported by the response writer",
        );
        assert_eq!(Error::handler("user not found").to_string(), "user not found");
    }
}
