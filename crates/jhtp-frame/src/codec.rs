use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use jhtp_transport::ByteStream;

use crate::envelope::{Envelope, Header};
use crate::error::{FrameError, Result};

/// Byte width of the envelope-length prefix.
pub const ENVELOPE_LEN_SIZE: usize = 2;

/// Maximum serialized application-header size (u16 length range).
pub const MAX_HEAD_LENGTH: usize = u16::MAX as usize;

/// Maximum body size (u32 length range).
pub const MAX_BODY_LENGTH: usize = u32::MAX as usize;

/// Serialize the envelope and application-header sections for a frame.
///
/// Size limits are enforced here, before anything touches the wire.
fn build_sections(head: Option<&Header>, body_len: usize) -> Result<(Vec<u8>, Vec<u8>)> {
    let head_bytes = match head {
        Some(map) => serde_json::to_vec(map).map_err(FrameError::MalformedHeader)?,
        None => Vec::new(),
    };
    if head_bytes.len() > MAX_HEAD_LENGTH {
        return Err(FrameError::HeadTooLarge {
            size: head_bytes.len(),
            max: MAX_HEAD_LENGTH,
        });
    }
    if body_len > MAX_BODY_LENGTH {
        return Err(FrameError::BodyTooLarge {
            size: body_len,
            max: MAX_BODY_LENGTH,
        });
    }
    let envelope = Envelope::new(head_bytes.len() as u16, body_len as u32);
    let env_bytes = serde_json::to_vec(&envelope).map_err(FrameError::MalformedEnvelope)?;
    Ok((env_bytes, head_bytes))
}

/// Write one frame as four ordered writes: length prefix, envelope,
/// application header, body.
///
/// The header section is zero bytes when `head` is `None`.
pub fn write_frame<T: ByteStream + ?Sized>(
    stream: &mut T,
    head: Option<&Header>,
    body: &[u8],
) -> Result<()> {
    let (env_bytes, head_bytes) = build_sections(head, body.len())?;
    let prefix = (env_bytes.len() as u16).to_le_bytes();
    trace!(
        envelope_len = env_bytes.len(),
        head_len = head_bytes.len(),
        body_len = body.len(),
        "writing frame"
    );
    stream.send_all(&prefix)?;
    stream.send_all(&env_bytes)?;
    stream.send_all(&head_bytes)?;
    stream.send_all(body)?;
    Ok(())
}

/// Encode one frame into a single contiguous buffer.
///
/// Produces exactly the bytes [`write_frame`] puts on the wire; used where
/// a frame must be staged before transmission, such as outbound queues.
pub fn encode_frame(head: Option<&Header>, body: &[u8]) -> Result<Bytes> {
    let (env_bytes, head_bytes) = build_sections(head, body.len())?;
    let mut buf = BytesMut::with_capacity(
        ENVELOPE_LEN_SIZE + env_bytes.len() + head_bytes.len() + body.len(),
    );
    buf.put_u16_le(env_bytes.len() as u16);
    buf.put_slice(&env_bytes);
    buf.put_slice(&head_bytes);
    buf.put_slice(body);
    Ok(buf.freeze())
}

/// Read one complete frame, blocking until it has fully arrived.
///
/// An absent application header (`head_length == 0`) decodes to `None` and
/// the header read is skipped entirely, not just the parse. A connection
/// closed at any stage, including mid-envelope, surfaces as
/// [`FrameError::ConnectionClosed`].
pub fn read_frame<T: ByteStream + ?Sized>(stream: &mut T) -> Result<(Option<Header>, Bytes)> {
    let prefix = stream.recv_exact(ENVELOPE_LEN_SIZE)?;
    let envelope_len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
    let env_bytes = stream.recv_exact(envelope_len)?;
    let envelope: Envelope =
        serde_json::from_slice(&env_bytes).map_err(FrameError::MalformedEnvelope)?;
    trace!(
        version = %envelope.version,
        head_len = envelope.head_length,
        body_len = envelope.body_length,
        "read envelope"
    );

    let head = if envelope.head_length == 0 {
        None
    } else {
        let head_bytes = stream.recv_exact(envelope.head_length as usize)?;
        Some(serde_json::from_slice(&head_bytes).map_err(FrameError::MalformedHeader)?)
    };

    let body = stream.recv_exact(envelope.body_length as usize)?;
    Ok((head, body))
}
