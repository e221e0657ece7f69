use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use bytes::Bytes;
use tracing::debug;

use jhtp_frame::{read_frame, write_frame, Header};
use jhtp_transport::{ByteStream, ReadinessKey};

use crate::error::Result;

/// One established connection endpoint.
///
/// A peer owns its transport exclusively, split into reader and writer
/// halves so a receive blocked on the wire never holds up senders. Peers
/// never initiate reads on their own; receipt is always caller- or
/// reactor-driven.
pub struct Peer {
    reader: Mutex<Box<dyn ByteStream>>,
    writer: Mutex<Box<dyn ByteStream>>,
    addrs: Mutex<Addrs>,
    key: AtomicI32,
}

#[derive(Clone, Copy, Default)]
struct Addrs {
    local: Option<SocketAddr>,
    remote: Option<SocketAddr>,
}

impl Peer {
    /// Wrap a connected transport, splitting it into read and write
    /// halves.
    pub fn from_transport(transport: Box<dyn ByteStream>) -> Result<Self> {
        let writer = transport.try_clone()?;
        let addrs = Addrs {
            local: transport.local_addr(),
            remote: transport.peer_addr(),
        };
        let key = transport.readiness_key();
        Ok(Self {
            reader: Mutex::new(transport),
            writer: Mutex::new(writer),
            addrs: Mutex::new(addrs),
            key: AtomicI32::new(key),
        })
    }

    /// Send one frame.
    ///
    /// The send lock is held for the duration of the four-section write,
    /// so concurrent callers serialize and every frame appears on the wire
    /// whole. Transport failures propagate without retry; the lock is
    /// released on all paths.
    pub fn send(&self, head: Option<&Header>, body: &[u8]) -> Result<()> {
        let mut writer = lock_unpoisoned(&self.writer);
        write_frame(&mut **writer, head, body)?;
        Ok(())
    }

    /// Receive one frame, blocking until it is complete.
    ///
    /// Returns the application header (or `None` when the frame carried
    /// none) and the body. Fails with a closed-connection error if the
    /// peer disconnects at any point during the read, including
    /// mid-envelope.
    pub fn recv(&self) -> Result<(Option<Header>, Bytes)> {
        let mut reader = lock_unpoisoned(&self.reader);
        let frame = read_frame(&mut **reader)?;
        Ok(frame)
    }

    /// Attempt a non-blocking send of a pre-encoded frame.
    ///
    /// Returns `Ok(false)` without writing anything when the send lock is
    /// contended or the transport cannot accept bytes right now. Once the
    /// first bytes are out, the remainder is completed with blocking
    /// writes so the frame is never split on the wire.
    pub fn try_send_encoded(&self, frame: &[u8]) -> Result<bool> {
        let mut writer = match self.writer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Ok(false),
            Err(TryLockError::Poisoned(err)) => err.into_inner(),
        };
        match writer.try_send(frame)? {
            None => Ok(false),
            Some(written) => {
                writer.send_all(&frame[written..])?;
                Ok(true)
            }
        }
    }

    /// Readiness key for poll registration.
    ///
    /// Never blocks, and stays current across a transport replacement.
    pub fn readiness_key(&self) -> ReadinessKey {
        self.key.load(Ordering::Acquire)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        lock_unpoisoned(&self.addrs).local
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        lock_unpoisoned(&self.addrs).remote
    }

    /// Swap in a fresh transport, preserving the send lock and every
    /// outstanding reference to this peer. Used by client reconnection.
    pub(crate) fn replace_transport(&self, transport: Box<dyn ByteStream>) -> Result<()> {
        let mut writer = lock_unpoisoned(&self.writer);
        let mut reader = lock_unpoisoned(&self.reader);
        let new_writer = transport.try_clone()?;
        {
            let mut addrs = lock_unpoisoned(&self.addrs);
            addrs.local = transport.local_addr();
            addrs.remote = transport.peer_addr();
        }
        self.key.store(transport.readiness_key(), Ordering::Release);
        let _ = reader.close();
        *reader = transport;
        *writer = new_writer;
        debug!(remote = ?self.remote_addr(), "transport replaced");
        Ok(())
    }

    /// Shut the connection down.
    pub fn close(&self) -> Result<()> {
        let mut writer = lock_unpoisoned(&self.writer);
        writer.close()?;
        Ok(())
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addrs = lock_unpoisoned(&self.addrs);
        f.debug_struct("Peer")
            .field("local", &addrs.local)
            .field("remote", &addrs.remote)
            .field("key", &self.key.load(Ordering::Relaxed))
            .finish()
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use std::thread;

    use serde_json::json;

    use jhtp_transport::TcpAcceptor;

    use super::*;

    /// Connected peer pair over loopback TCP.
    fn peer_pair() -> (Peer, Peer) {
        let acceptor =
            TcpAcceptor::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)).unwrap();
        let addr = acceptor.local_addr();

        let client = thread::spawn(move || {
            let transport = jhtp_transport::TcpTransport::connect(addr).unwrap();
            Peer::from_transport(Box::new(transport)).unwrap()
        });

        let (transport, _) = acceptor.accept().unwrap();
        let server = Peer::from_transport(Box::new(transport)).unwrap();
        (client.join().unwrap(), server)
    }

    fn header(entries: &[(&str, serde_json::Value)]) -> Header {
        let mut head = Header::new();
        for (key, value) in entries {
            head.insert((*key).to_string(), value.clone());
        }
        head
    }

    #[test]
    fn send_recv_roundtrip_with_header() {
        let (client, server) = peer_pair();
        let head = header(&[("op", json!("ping"))]);

        client.send(Some(&head), b"payload").unwrap();
        let (received_head, received_body) = server.recv().unwrap();

        assert_eq!(received_head, Some(head));
        assert_eq!(received_body.as_ref(), b"payload");
    }

    #[test]
    fn absent_header_stays_absent() {
        let (client, server) = peer_pair();

        client.send(None, b"pong").unwrap();
        let (received_head, received_body) = server.recv().unwrap();

        assert!(received_head.is_none());
        assert_eq!(received_body.as_ref(), b"pong");
    }

    #[test]
    fn empty_body_roundtrip() {
        let (client, server) = peer_pair();

        client.send(Some(&header(&[("op", json!("hello"))])), b"").unwrap();
        let (_, received_body) = server.recv().unwrap();
        assert!(received_body.is_empty());
    }

    #[test]
    fn addresses_are_exposed() {
        let (client, server) = peer_pair();
        assert_eq!(client.remote_addr(), server.local_addr());
        assert_eq!(server.remote_addr(), client.local_addr());
    }

    #[test]
    fn concurrent_senders_never_interleave_frames() {
        let (client, server) = peer_pair();
        let client = Arc::new(client);

        const SENDERS: usize = 8;
        const FRAMES_PER_SENDER: usize = 16;

        let handles: Vec<_> = (0..SENDERS)
            .map(|sender| {
                let client = Arc::clone(&client);
                thread::spawn(move || {
                    for seq in 0..FRAMES_PER_SENDER {
                        let head =
                            header(&[("sender", json!(sender)), ("seq", json!(seq))]);
                        let body = format!("frame-{sender}-{seq}");
                        client.send(Some(&head), body.as_bytes()).unwrap();
                    }
                })
            })
            .collect();

        let mut seen = std::collections::HashSet::new();
        for _ in 0..SENDERS * FRAMES_PER_SENDER {
            let (head, body) = server.recv().unwrap();
            let head = head.expect("every frame carries a header");
            let sender = head["sender"].as_u64().unwrap();
            let seq = head["seq"].as_u64().unwrap();
            assert_eq!(
                body.as_ref(),
                format!("frame-{sender}-{seq}").as_bytes(),
                "frame bytes must match the header they were sent with"
            );
            assert!(seen.insert((sender, seq)), "frame delivered twice");
        }
        assert_eq!(seen.len(), SENDERS * FRAMES_PER_SENDER);

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn recv_reports_closed_when_peer_disconnects() {
        let (client, server) = peer_pair();
        client.close().unwrap();
        drop(client);

        let err = server.recv().unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn try_send_encoded_writes_whole_frame() {
        let (client, server) = peer_pair();
        let frame = jhtp_frame::encode_frame(None, b"queued").unwrap();

        assert!(client.try_send_encoded(&frame).unwrap());
        let (head, body) = server.recv().unwrap();
        assert!(head.is_none());
        assert_eq!(body.as_ref(), b"queued");
    }

    #[test]
    fn try_send_encoded_backs_off_while_send_lock_held() {
        let (client, _server) = peer_pair();
        let client = Arc::new(client);

        let guard_peer = Arc::clone(&client);
        let locked = lock_unpoisoned(&guard_peer.writer);

        let frame = jhtp_frame::encode_frame(None, b"later").unwrap();
        assert!(!client.try_send_encoded(&frame).unwrap());
        drop(locked);
        assert!(client.try_send_encoded(&frame).unwrap());
    }
}
