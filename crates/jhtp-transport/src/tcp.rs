use std::fmt;
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream as StdTcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{ByteStream, ReadinessKey};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// TCP byte-stream transport.
///
/// One instance wraps one connected socket; ownership of the handle
/// belongs to a single peer.
pub struct TcpTransport {
    stream: StdTcpStream,
}

impl TcpTransport {
    /// Connect to a listening peer (blocking, single attempt).
    ///
    /// An active rejection by the remote surfaces as
    /// [`TransportError::Refused`]; `Closed` is never raised from here.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        match StdTcpStream::connect(addr) {
            Ok(stream) => {
                debug!(%addr, "connected");
                Ok(Self { stream })
            }
            Err(err) if err.kind() == ErrorKind::ConnectionRefused => {
                Err(TransportError::Refused { addr, source: err })
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Repeatedly attempt [`TcpTransport::connect`] against `addr`,
    /// sleeping `backoff` between attempts for as long as the remote
    /// actively refuses.
    ///
    /// Any failure other than a refusal propagates immediately. The
    /// attempt count is unbounded; the loop runs until success or process
    /// cancellation.
    pub fn reconnect(addr: SocketAddr, backoff: Duration) -> Result<Self> {
        loop {
            match Self::connect(addr) {
                Ok(transport) => return Ok(transport),
                Err(TransportError::Refused { .. }) => {
                    trace!(%addr, ?backoff, "connection refused, retrying");
                    std::thread::sleep(backoff);
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub(crate) fn from_std(stream: StdTcpStream) -> Self {
        Self { stream }
    }
}

impl ByteStream for TcpTransport {
    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        match self.stream.write(buf) {
            Ok(n) => Ok(n),
            Err(err)
                if matches!(
                    err.kind(),
                    ErrorKind::BrokenPipe
                        | ErrorKind::ConnectionReset
                        | ErrorKind::ConnectionAborted
                ) =>
            {
                Err(TransportError::Closed)
            }
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn try_send(&mut self, buf: &[u8]) -> Result<Option<usize>> {
        if buf.is_empty() {
            return Ok(Some(0));
        }
        let fd = self.stream.as_raw_fd();
        // SAFETY: `fd` is an open socket owned by this stream, and `buf`
        // is a valid readable region of `buf.len()` bytes.
        let rc = unsafe {
            libc::send(
                fd,
                buf.as_ptr().cast::<libc::c_void>(),
                buf.len(),
                libc::MSG_DONTWAIT | libc::MSG_NOSIGNAL,
            )
        };
        if rc >= 0 {
            return Ok(Some(rc as usize));
        }
        let err = std::io::Error::last_os_error();
        match err.kind() {
            ErrorKind::WouldBlock | ErrorKind::Interrupted => Ok(None),
            ErrorKind::BrokenPipe | ErrorKind::ConnectionReset => Err(TransportError::Closed),
            _ => Err(TransportError::Io(err)),
        }
    }

    fn recv_exact(&mut self, n: usize) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(n);
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        while buf.len() < n {
            let want = (n - buf.len()).min(READ_CHUNK_SIZE);
            let read = match self.stream.read(&mut chunk[..want]) {
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            };
            if read == 0 {
                return Err(TransportError::Closed);
            }
            buf.extend_from_slice(&chunk[..read]);
        }
        Ok(buf.freeze())
    }

    fn close(&mut self) -> Result<()> {
        match self.stream.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    fn readiness_key(&self) -> ReadinessKey {
        self.stream.as_raw_fd()
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.stream.local_addr().ok()
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }

    fn try_clone(&self) -> Result<Box<dyn ByteStream>> {
        let cloned = self.stream.try_clone()?;
        Ok(Box::new(Self { stream: cloned }))
    }
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local", &self.stream.local_addr().ok())
            .field("peer", &self.stream.peer_addr().ok())
            .finish()
    }
}

/// Bound, listening TCP socket producing connected [`TcpTransport`]
/// handles.
pub struct TcpAcceptor {
    listener: TcpListener,
    local: SocketAddr,
}

impl TcpAcceptor {
    /// Bind and listen on `addr`. Port 0 selects an ephemeral port; the
    /// assigned address is available via [`TcpAcceptor::local_addr`].
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).map_err(|err| TransportError::Bind { addr, source: err })?;
        let local = listener.local_addr()?;
        info!(%local, "listening");
        Ok(Self { listener, local })
    }

    /// Accept an incoming connection (blocking).
    pub fn accept(&self) -> Result<(TcpTransport, SocketAddr)> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Ok((TcpTransport::from_std(stream), addr))
    }

    /// The locally bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};
    use std::thread;
    use std::time::Instant;

    use super::*;

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[test]
    fn bind_accept_connect_roundtrip() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        assert_ne!(addr.port(), 0);

        let client = thread::spawn(move || {
            let mut transport = TcpTransport::connect(addr).unwrap();
            transport.send_all(b"hello").unwrap();
            let reply = transport.recv_exact(2).unwrap();
            assert_eq!(reply.as_ref(), b"ok");
        });

        let (mut server, remote) = acceptor.accept().unwrap();
        assert_eq!(remote.ip(), addr.ip());
        let greeting = server.recv_exact(5).unwrap();
        assert_eq!(greeting.as_ref(), b"hello");
        server.send_all(b"ok").unwrap();

        client.join().unwrap();
    }

    #[test]
    fn connect_refused_is_distinguished() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        drop(acceptor);

        let err = TcpTransport::connect(addr).unwrap_err();
        assert!(err.is_refused());
        assert!(!err.is_closed());
    }

    #[test]
    fn recv_exact_accumulates_partial_writes() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();

        let writer = thread::spawn(move || {
            let mut transport = TcpTransport::connect(addr).unwrap();
            for byte in b"0123456789" {
                transport.send_all(&[*byte]).unwrap();
                thread::sleep(Duration::from_millis(2));
            }
        });

        let (mut server, _) = acceptor.accept().unwrap();
        let data = server.recv_exact(10).unwrap();
        assert_eq!(data.as_ref(), b"0123456789");

        writer.join().unwrap();
    }

    #[test]
    fn recv_exact_zero_returns_empty() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let (mut server, _) = acceptor.accept().unwrap();
        let _client = client.join().unwrap();

        let data = server.recv_exact(0).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn closed_mid_read_signals_closed() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();

        let writer = thread::spawn(move || {
            let mut transport = TcpTransport::connect(addr).unwrap();
            transport.send_all(b"par").unwrap();
            transport.close().unwrap();
        });

        let (mut server, _) = acceptor.accept().unwrap();
        let err = server.recv_exact(10).unwrap_err();
        assert!(err.is_closed());

        writer.join().unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let (mut server, _) = acceptor.accept().unwrap();
        let _client = client.join().unwrap();

        server.close().unwrap();
        server.close().unwrap();
    }

    #[test]
    fn try_clone_shares_the_stream() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let (mut server, _) = acceptor.accept().unwrap();
        let mut client = client.join().unwrap();

        let mut clone = client.try_clone().unwrap();
        clone.send_all(b"via-clone").unwrap();

        let data = server.recv_exact(9).unwrap();
        assert_eq!(data.as_ref(), b"via-clone");
    }

    #[test]
    fn readiness_key_is_a_valid_fd() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        let (server, _) = acceptor.accept().unwrap();
        let _client = client.join().unwrap();

        assert!(server.readiness_key() >= 0);
    }

    #[test]
    fn try_send_reports_would_block_on_full_buffer() {
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        let client = thread::spawn(move || TcpTransport::connect(addr).unwrap());
        // Keep the server side alive but never read from it.
        let (_server, _) = acceptor.accept().unwrap();
        let mut transport = client.join().unwrap();

        let chunk = vec![0u8; 64 * 1024];
        let mut saw_would_block = false;
        for _ in 0..2048 {
            match transport.try_send(&chunk).unwrap() {
                Some(_) => continue,
                None => {
                    saw_would_block = true;
                    break;
                }
            }
        }
        assert!(saw_would_block, "kernel buffers should fill eventually");
    }

    #[test]
    fn reconnect_retries_until_listener_appears() {
        // Reserve a port, then free it so the first attempts are refused.
        let acceptor = TcpAcceptor::bind(loopback()).unwrap();
        let addr = acceptor.local_addr();
        drop(acceptor);

        let listener = thread::spawn(move || {
            thread::sleep(Duration::from_millis(80));
            let acceptor = TcpAcceptor::bind(addr).unwrap();
            let (mut server, _) = acceptor.accept().unwrap();
            let data = server.recv_exact(5).unwrap();
            assert_eq!(data.as_ref(), b"after");
        });

        let start = Instant::now();
        let mut transport = TcpTransport::reconnect(addr, Duration::from_millis(10)).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(10));
        transport.send_all(b"after").unwrap();

        listener.join().unwrap();
    }
}
