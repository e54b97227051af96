//! Unified error type.

use std::fmt;
use std::net::SocketAddr;

/// The error type returned by strand's fallible operations.
///
/// Request-level failures never show up here: a handler reports them by
/// writing a status through [`Context`](crate::Context), and a panicking
/// handler is turned into a 500 by [`recovery`](crate::middleware::recovery).
/// This type is for the server itself failing.
#[derive(Debug)]
pub enum Error {
    /// The listen address could not be bound.
    Bind { addr: SocketAddr, source: std::io::Error },
    /// Any other socket failure.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { addr, source } => write!(f, "failed to bind {addr}: {source}"),
            Self::Io(e) => write!(f, "io: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Bind { source, .. } => Some(source),
            Self::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
