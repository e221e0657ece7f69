/// Errors that can occur in multiplexer operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// Frame-level error (encoding a queued frame).
    #[error("frame error: {0}")]
    Frame(#[from] jhtp_frame::FrameError),

    /// Peer-level error.
    #[error("peer error: {0}")]
    Peer(#[from] jhtp_peer::PeerError),

    /// The peer is not registered with this multiplexer.
    #[error("peer not registered")]
    NotRegistered,

    /// The peer's outbound queue is at capacity (reject-send policy).
    #[error("outbound queue full ({capacity} frames)")]
    QueueFull { capacity: usize },

    /// The readiness poll itself failed.
    #[error("poll failed: {0}")]
    Poll(std::io::Error),
}

pub type Result<T> = std::result::Result<T, MuxError>;
