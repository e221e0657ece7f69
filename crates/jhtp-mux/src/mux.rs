use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, warn};

use jhtp_frame::{encode_frame, Header};
use jhtp_peer::Peer;
use jhtp_transport::ReadinessKey;

use crate::error::{MuxError, Result};
use crate::pool::WorkerPool;
use crate::queue::{OutboundQueue, OverflowPolicy};

/// Event delivered to the multiplexer's handler.
#[derive(Debug, Clone)]
pub enum MuxEvent {
    /// A complete inbound frame from the peer.
    Message { head: Option<Header>, body: Bytes },
    /// The peer's connection ended and it was removed from the reactor.
    Closed,
}

type Handler = Arc<dyn Fn(Arc<Peer>, MuxEvent) + Send + Sync + 'static>;

/// Multiplexer tuning knobs.
#[derive(Debug, Clone)]
pub struct MuxConfig {
    /// Upper bound on one readiness wait, so stop requests are observed
    /// promptly.
    pub poll_timeout: Duration,
    /// Worker threads used for concurrent dispatch.
    pub workers: usize,
    /// Per-peer outbound queue bound, in frames.
    pub queue_capacity: usize,
    /// Policy applied when an outbound queue is at capacity.
    pub overflow: OverflowPolicy,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_millis(50),
            workers: 4,
            queue_capacity: 64,
            overflow: OverflowPolicy::default(),
        }
    }
}

struct MuxEntry {
    peer: Arc<Peer>,
    outbound: Arc<OutboundQueue>,
}

struct HandlerSlot {
    handler: Handler,
    concurrent: bool,
}

struct Shared {
    registry: Mutex<HashMap<ReadinessKey, MuxEntry>>,
    handler: Mutex<HandlerSlot>,
    pool: WorkerPool,
    stop: AtomicBool,
    config: MuxConfig,
}

/// Single-reactor multiplexer over many peers.
///
/// [`Multiplexer::run`] polls every registered peer's readiness key from
/// one thread, which is the sole reader of every registered peer; per-peer
/// message order is therefore preserved even under concurrent dispatch.
/// Cheap to clone: clones share the registry, handler, and stop flag, so
/// the reactor thread and the application can hold the same multiplexer.
#[derive(Clone)]
pub struct Multiplexer {
    shared: Arc<Shared>,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::with_config(MuxConfig::default())
    }

    pub fn with_config(config: MuxConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                registry: Mutex::new(HashMap::new()),
                handler: Mutex::new(HandlerSlot {
                    handler: Arc::new(|_, _| {}),
                    concurrent: false,
                }),
                pool: WorkerPool::new(config.workers),
                stop: AtomicBool::new(false),
                config,
            }),
        }
    }

    /// Register a peer for read-readiness and create its outbound queue.
    ///
    /// A peer whose transport handle is later replaced (client
    /// reconnection) must be removed and re-added, since its readiness key
    /// changes with the handle.
    pub fn add(&self, peer: Arc<Peer>) {
        let key = peer.readiness_key();
        let outbound = Arc::new(OutboundQueue::new(
            self.shared.config.queue_capacity,
            self.shared.config.overflow,
        ));
        debug!(key, "peer registered");
        lock(&self.shared.registry).insert(key, MuxEntry { peer, outbound });
    }

    /// Unregister a peer and discard its pending outbound frames.
    pub fn remove(&self, peer: &Peer) {
        let key = peer.readiness_key();
        if lock(&self.shared.registry).remove(&key).is_some() {
            debug!(key, "peer removed");
        }
    }

    /// Number of registered peers.
    pub fn len(&self) -> usize {
        lock(&self.shared.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.shared.registry).is_empty()
    }

    /// Install the handler invoked for every inbound event.
    ///
    /// With `concurrent` set, each invocation is dispatched onto the
    /// worker pool and the reactor keeps polling; invocations may then
    /// interleave across peers, but stay ordered per peer. Otherwise the
    /// handler runs inline on the reactor thread, and a slow handler
    /// delays all peers.
    pub fn set_handler(
        &self,
        handler: impl Fn(Arc<Peer>, MuxEvent) + Send + Sync + 'static,
        concurrent: bool,
    ) {
        *lock(&self.shared.handler) = HandlerSlot {
            handler: Arc::new(handler),
            concurrent,
        };
    }

    /// Queue a frame for transmission when `peer` next reports
    /// write-readiness.
    ///
    /// Callable from any thread. The frame is encoded here so encoding
    /// failures surface at the call site; overflow behavior follows the
    /// configured [`OverflowPolicy`].
    pub fn queue_send(&self, peer: &Peer, head: Option<&Header>, body: &[u8]) -> Result<()> {
        let frame = encode_frame(head, body)?;
        let key = peer.readiness_key();
        let registry = lock(&self.shared.registry);
        let entry = registry.get(&key).ok_or(MuxError::NotRegistered)?;
        if !entry.outbound.push(frame) {
            return Err(MuxError::QueueFull {
                capacity: entry.outbound.capacity(),
            });
        }
        Ok(())
    }

    /// Request the reactor loop to stop at its next timeout check.
    pub fn stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Drive the reactor until stopped.
    ///
    /// Each readable peer gets one `recv` and one handler dispatch per
    /// readiness report; writable peers with queued frames are drained up
    /// to the point the transport stops accepting. A peer whose receive
    /// fails with a closed connection is removed and reported as
    /// [`MuxEvent::Closed`]; it never terminates the reactor.
    pub fn run(&self) -> Result<()> {
        let timeout_ms = self
            .shared
            .config
            .poll_timeout
            .as_millis()
            .min(i32::MAX as u128) as i32;

        while !self.is_stopped() {
            let mut fds: Vec<libc::pollfd> = {
                let registry = lock(&self.shared.registry);
                registry
                    .iter()
                    .map(|(key, entry)| {
                        let mut events = libc::POLLIN;
                        if !entry.outbound.is_empty() {
                            events |= libc::POLLOUT;
                        }
                        libc::pollfd {
                            fd: *key,
                            events,
                            revents: 0,
                        }
                    })
                    .collect()
            };

            if fds.is_empty() {
                std::thread::sleep(self.shared.config.poll_timeout);
                continue;
            }

            // SAFETY: `fds` is an exclusively owned, properly initialized
            // pollfd array of `fds.len()` entries for the whole call.
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.kind() == std::io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(MuxError::Poll(err));
            }
            if rc == 0 {
                continue;
            }

            for fd in &fds {
                if fd.revents == 0 {
                    continue;
                }
                // Entries are re-looked-up per branch: they may have been
                // removed while we were polling, or by the read path just
                // below.
                if fd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
                    // Hangups and socket errors are discovered by the read
                    // path, so they fold into the readable case.
                    if let Some((peer, _)) = self.entry_for(fd.fd) {
                        self.service_readable(fd.fd, &peer);
                    }
                }
                if fd.revents & libc::POLLOUT != 0 {
                    if let Some((peer, outbound)) = self.entry_for(fd.fd) {
                        self.drain_outbound(fd.fd, &peer, &outbound);
                    }
                }
            }
        }
        Ok(())
    }

    fn entry_for(&self, key: ReadinessKey) -> Option<(Arc<Peer>, Arc<OutboundQueue>)> {
        let registry = lock(&self.shared.registry);
        registry
            .get(&key)
            .map(|entry| (Arc::clone(&entry.peer), Arc::clone(&entry.outbound)))
    }

    fn service_readable(&self, key: ReadinessKey, peer: &Arc<Peer>) {
        match peer.recv() {
            Ok((head, body)) => self.dispatch(peer, MuxEvent::Message { head, body }),
            Err(err) if err.is_closed() => {
                debug!(key, "peer closed, removing");
                if self.remove_key(key) {
                    self.dispatch(peer, MuxEvent::Closed);
                }
            }
            Err(err) => {
                // Framing sync cannot be recovered on a byte stream.
                warn!(key, %err, "receive failed, removing peer");
                let _ = peer.close();
                if self.remove_key(key) {
                    self.dispatch(peer, MuxEvent::Closed);
                }
            }
        }
    }

    fn drain_outbound(&self, key: ReadinessKey, peer: &Arc<Peer>, outbound: &OutboundQueue) {
        while let Some(frame) = outbound.pop() {
            match peer.try_send_encoded(&frame) {
                Ok(true) => continue,
                Ok(false) => {
                    // Transport (or the send lock) is not ready; keep the
                    // frame for the next write-readiness report.
                    outbound.requeue_front(frame);
                    break;
                }
                Err(err) if err.is_closed() => {
                    debug!(key, "peer closed during queued send, removing");
                    if self.remove_key(key) {
                        self.dispatch(peer, MuxEvent::Closed);
                    }
                    break;
                }
                Err(err) => {
                    warn!(key, %err, "queued send failed, removing peer");
                    let _ = peer.close();
                    if self.remove_key(key) {
                        self.dispatch(peer, MuxEvent::Closed);
                    }
                    break;
                }
            }
        }
    }

    fn remove_key(&self, key: ReadinessKey) -> bool {
        lock(&self.shared.registry).remove(&key).is_some()
    }

    fn dispatch(&self, peer: &Arc<Peer>, event: MuxEvent) {
        let (handler, concurrent) = {
            let slot = lock(&self.shared.handler);
            (Arc::clone(&slot.handler), slot.concurrent)
        };
        if concurrent {
            let peer = Arc::clone(peer);
            self.shared.pool.execute(move || handler(peer, event));
        } else {
            handler(Arc::clone(peer), event);
        }
    }
}

impl Default for Multiplexer {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
