use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use jhtp_transport::TcpTransport;

use crate::error::Result;
use crate::peer::Peer;

/// Client side of a connection: one connect attempt, with optional
/// refusal-triggered reconnection.
#[derive(Debug)]
pub struct Client {
    peer: Arc<Peer>,
    remote: SocketAddr,
}

impl Client {
    /// Connect to `addr` (blocking, single attempt).
    ///
    /// An active refusal propagates to the caller; there is no implicit
    /// retry.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        let transport = TcpTransport::connect(addr)?;
        let peer = Arc::new(Peer::from_transport(Box::new(transport))?);
        info!(%addr, "client connected");
        Ok(Self { peer, remote: addr })
    }

    /// Re-establish the connection, retrying while the remote refuses and
    /// sleeping `backoff` between attempts (unbounded attempt count).
    ///
    /// Connects against the last-used address unless `addr` supplies a new
    /// one. On success the peer's transport handle is replaced in place:
    /// the send lock and every outstanding reference to the peer stay
    /// valid.
    pub fn reconnect(&mut self, addr: Option<SocketAddr>, backoff: Duration) -> Result<()> {
        let addr = addr.unwrap_or(self.remote);
        debug!(%addr, ?backoff, "reconnecting");
        let transport = TcpTransport::reconnect(addr, backoff)?;
        self.peer.replace_transport(Box::new(transport))?;
        self.remote = addr;
        Ok(())
    }

    /// The shared peer for this connection.
    pub fn peer(&self) -> Arc<Peer> {
        Arc::clone(&self.peer)
    }

    /// The last connect target.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote
    }
}
