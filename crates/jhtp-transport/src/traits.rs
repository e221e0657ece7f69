use std::io::ErrorKind;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::{Result, TransportError};

/// Stable identifier a polling mechanism uses to report read/write
/// readiness for a transport handle.
///
/// On Unix this is the raw file descriptor.
#[cfg(unix)]
pub type ReadinessKey = std::os::fd::RawFd;

/// A connected, reliable, ordered byte stream.
///
/// This capability is the sole boundary to the operating system. Peers,
/// the framing codec, and the multiplexer depend only on this trait, never
/// on a concrete transport kind.
pub trait ByteStream: Send {
    /// Write from `buf`, returning the number of bytes the transport
    /// accepted.
    ///
    /// A stream detected broken (writing to a shut side) surfaces as
    /// [`TransportError::Closed`].
    fn send(&mut self, buf: &[u8]) -> Result<usize>;

    /// Non-blocking write attempt.
    ///
    /// `Ok(None)` means the transport cannot accept more bytes right now;
    /// nothing was written.
    fn try_send(&mut self, buf: &[u8]) -> Result<Option<usize>>;

    /// Read exactly `n` bytes, blocking until they have all arrived.
    ///
    /// A zero-length read before `n` bytes are accumulated signals
    /// [`TransportError::Closed`]; a short buffer is never returned.
    fn recv_exact(&mut self, n: usize) -> Result<Bytes>;

    /// Shut the stream down. Idempotent.
    fn close(&mut self) -> Result<()>;

    /// Key for registering this stream with a polling mechanism.
    fn readiness_key(&self) -> ReadinessKey;

    fn local_addr(&self) -> Option<SocketAddr>;

    fn peer_addr(&self) -> Option<SocketAddr>;

    /// Clone the handle. The clone shares the underlying stream.
    fn try_clone(&self) -> Result<Box<dyn ByteStream>>;

    /// Write all of `buf`, retrying interrupted writes.
    fn send_all(&mut self, buf: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < buf.len() {
            match self.send(&buf[offset..]) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => offset += n,
                Err(TransportError::Io(err)) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }
}
