//! Peer connection management for JHTP.
//!
//! A [`Peer`] turns one byte-stream transport into a typed message channel
//! with thread-safe send and blocking-exact receive. [`Server`] and
//! [`Client`] cover the two ways peers come to exist: the accept loop and
//! the outbound connect (with optional refusal-triggered reconnection).

pub mod client;
pub mod error;
pub mod peer;
pub mod server;

pub use client::Client;
pub use error::{PeerError, Result};
pub use peer::Peer;
pub use server::{Server, StopHandle};
