//! Two-level header framing for JHTP.
//!
//! Every frame is, in order, all integers little-endian and all text UTF-8:
//!
//! - a 2-byte envelope-length prefix
//! - a JSON envelope (`version`, `head_length`, `body_length`)
//! - `head_length` bytes of JSON application header (zero bytes when absent)
//! - `body_length` bytes of opaque body
//!
//! The fixed-shape envelope is parsed before the caller-defined header, so
//! a malformed application header can never corrupt framing recovery, and
//! variable-size application metadata never has to be length-guessed.

pub mod codec;
pub mod envelope;
pub mod error;

pub use codec::{
    encode_frame, read_frame, write_frame, ENVELOPE_LEN_SIZE, MAX_BODY_LENGTH, MAX_HEAD_LENGTH,
};
pub use envelope::{Envelope, Header, PROTOCOL_VERSION};
pub use error::{FrameError, Result};
