//! Connection-oriented byte-stream transport abstraction for JHTP.
//!
//! Provides a unified capability interface over reliable, ordered byte
//! streams. This is the lowest layer of jhtp and the only one that touches
//! the operating system. Everything else builds on top of the
//! [`ByteStream`] trait defined here.

pub mod error;
pub mod traits;

#[cfg(unix)]
pub mod tcp;

pub use error::{Result, TransportError};
pub use traits::{ByteStream, ReadinessKey};

#[cfg(unix)]
pub use tcp::{TcpAcceptor, TcpTransport};
