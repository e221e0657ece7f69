use std::io;
use std::net::SocketAddr;

/// Errors that can occur in transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The remote actively refused the connection.
    #[error("connection refused by {addr}: {source}")]
    Refused { addr: SocketAddr, source: io::Error },

    /// The peer ended the stream (zero-length read, or a write to a shut
    /// side).
    #[error("connection closed by peer")]
    Closed,

    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(io::Error),

    /// Any other I/O failure on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// True when the failure is the peer ending the stream.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// True when the failure is an active connect-time refusal.
    pub fn is_refused(&self) -> bool {
        matches!(self, Self::Refused { .. })
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
