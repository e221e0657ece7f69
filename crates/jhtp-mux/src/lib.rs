//! Readiness-based multiplexer for JHTP peers.
//!
//! One reactor thread polls many peers' readiness keys and dispatches each
//! fully received inbound message to a registered handler, either inline
//! or on a bounded worker pool. The reactor is the sole reader of every
//! registered peer, so per-peer message order is preserved; senders stay
//! on their own threads, and outbound frames can also be queued for
//! delivery on write-readiness.

pub mod error;
pub mod mux;
pub mod pool;
pub mod queue;

pub use error::{MuxError, Result};
pub use mux::{Multiplexer, MuxConfig, MuxEvent};
pub use pool::WorkerPool;
pub use queue::{OutboundQueue, OverflowPolicy};
