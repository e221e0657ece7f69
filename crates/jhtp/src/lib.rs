//! Length-prefixed two-level-header messaging over byte streams.
//!
//! jhtp frames every message as a fixed-shape JSON envelope plus an
//! optional application-defined JSON header followed by an opaque body, so
//! structured metadata and binary payloads travel together on one
//! connection. A single-reactor multiplexer serves many connections
//! concurrently.
//!
//! # Crate Structure
//!
//! - [`transport`] — Byte-stream transport abstraction (TCP)
//! - [`frame`] — Two-level header framing codec
//! - [`peer`] — Peer connection and server/client lifecycle
//! - [`mux`] — Single-reactor readiness multiplexer

/// Re-export transport types.
pub mod transport {
    pub use jhtp_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use jhtp_frame::*;
}

/// Re-export peer types.
pub mod peer {
    pub use jhtp_peer::*;
}

/// Re-export multiplexer types.
pub mod mux {
    pub use jhtp_mux::*;
}
