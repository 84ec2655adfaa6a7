use std::io;
use std::net::SocketAddr;

/// Crate-wide error type.
///
/// The three variants map onto how call sites react:
/// - `Transport`: connect/send/receive failures and timeouts. Never fatal;
///   call sites log it and mark a peer offline or report a boolean failure.
/// - `Protocol`: oversized frames, malformed payloads, missing required
///   fields. The offending connection is dropped.
/// - `Bind`: the listening socket could not be bound. The one fatal
///   condition; a node has no identity without a listening port.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("transport error: {0}")]
    Transport(#[from] io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// A receive or connect deadline expired. Timeouts are transport
    /// failures, not protocol violations.
    pub fn timed_out() -> Self {
        Error::Transport(io::ErrorKind::TimedOut.into())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Protocol(e.to_string())
    }
}
