/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] jhtp_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] jhtp_frame::FrameError),
}

impl PeerError {
    /// True when the peer ended the stream.
    pub fn is_closed(&self) -> bool {
        match self {
            PeerError::Transport(err) => err.is_closed(),
            PeerError::Frame(err) => err.is_closed(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PeerError>;
