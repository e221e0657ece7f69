use jhtp_transport::TransportError;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The envelope was not valid JSON or lacked required length fields.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// The application header was not a valid JSON mapping.
    #[error("malformed application header: {0}")]
    MalformedHeader(#[source] serde_json::Error),

    /// The serialized application header exceeds the u16 length range.
    #[error("application header too large ({size} bytes, max {max})")]
    HeadTooLarge { size: usize, max: usize },

    /// The body exceeds the u32 length range.
    #[error("body too large ({size} bytes, max {max})")]
    BodyTooLarge { size: usize, max: usize },

    /// The connection was closed before a complete frame was transferred.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,

    /// Underlying transport failure.
    #[error("transport error: {0}")]
    Transport(TransportError),
}

impl From<TransportError> for FrameError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => FrameError::ConnectionClosed,
            other => FrameError::Transport(other),
        }
    }
}

impl FrameError {
    /// True when the peer ended the stream mid-frame.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed)
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
