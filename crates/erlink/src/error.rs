//! Error types for the node runtime.

use erlink_term::TermError;
use thiserror::Error;

/// Errors that can occur while running a node.
#[derive(Debug, Error)]
pub enum NodeError {
    /// A peer presented a cookie that does not match ours.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// A connection-level protocol failure.
    #[error("connection error: {0}")]
    Connection(String),

    /// An I/O failure on a socket.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A node id named a transport protocol nobody registered.
    #[error("unknown transport protocol '{0}'")]
    UnknownProtocol(String),

    /// An operation did not complete in time.
    #[error("operation timed out")]
    Timeout,

    /// A term failed to encode or decode.
    #[error(transparent)]
    Term(#[from] TermError),
}
