use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};

use jhtp_transport::TcpAcceptor;

use crate::error::Result;
use crate::peer::Peer;

/// Cooperative stop signal, checked once per loop iteration.
///
/// There is no hard interrupt of an in-flight blocking call; a stop
/// request takes effect when the current call returns.
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the associated loop to stop at its next check.
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Accept loop producing connected [`Peer`]s.
pub struct Server {
    acceptor: TcpAcceptor,
    stop: StopHandle,
}

impl Server {
    /// Bind and listen on `addr`. Port 0 selects an ephemeral port.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        let acceptor = TcpAcceptor::bind(addr)?;
        Ok(Self {
            acceptor,
            stop: StopHandle::new(),
        })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> SocketAddr {
        self.acceptor.local_addr()
    }

    /// Handle used to stop the accept loop from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Accept connections until stopped, invoking `on_accept` for each.
    ///
    /// Accepted peers carry the bound local address and the accepted
    /// remote address. Accept failures are not caught here: a fatal
    /// transport error stops the loop and propagates to the caller.
    pub fn run(&self, mut on_accept: impl FnMut(Peer)) -> Result<()> {
        info!(addr = %self.local_addr(), "server accepting connections");
        while !self.stop.is_stopped() {
            let (transport, remote) = self.acceptor.accept()?;
            let peer = Peer::from_transport(Box::new(transport))?;
            debug!(%remote, "peer accepted");
            on_accept(peer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr, TcpStream};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use super::*;
    use crate::client::Client;

    fn loopback() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0)
    }

    #[test]
    fn accepted_peers_are_handed_to_callback() {
        let server = Server::bind(loopback()).unwrap();
        let addr = server.local_addr();
        let stop = server.stop_handle();

        let (tx, rx) = mpsc::channel();
        let accept_loop = thread::spawn(move || {
            server.run(move |peer| {
                let _ = tx.send(peer);
            })
        });

        let client = Client::connect(addr).unwrap();
        let accepted = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(accepted.local_addr(), Some(addr));
        assert_eq!(accepted.remote_addr(), client.peer().local_addr());

        // A message flows across the accepted pair.
        client.peer().send(None, b"hi").unwrap();
        let (head, body) = accepted.recv().unwrap();
        assert!(head.is_none());
        assert_eq!(body.as_ref(), b"hi");

        stop.stop();
        // Unblock the accept call so the loop observes the stop flag.
        let _ = TcpStream::connect(addr);
        accept_loop.join().unwrap().unwrap();
    }

    #[test]
    fn stop_handle_terminates_the_loop() {
        let server = Server::bind(loopback()).unwrap();
        let addr = server.local_addr();
        let stop = server.stop_handle();

        let accept_loop = thread::spawn(move || server.run(|_peer| {}));

        stop.stop();
        let _ = TcpStream::connect(addr);
        accept_loop.join().unwrap().unwrap();
    }
}
