use serde::{Deserialize, Serialize};

/// Wire protocol version carried in every envelope.
///
/// Two implementations exchanging frames must agree on this string and on
/// the little-endian 2-byte envelope-length prefix. There is no handshake
/// beyond the first frame exchanged.
pub const PROTOCOL_VERSION: &str = "0.1";

/// Application header: caller-defined structured metadata with string keys
/// and JSON-compatible values, serialized as UTF-8 JSON text.
///
/// Absence is a distinct state from an empty mapping; an absent header is
/// transmitted as zero bytes and decodes to `None`.
pub type Header = serde_json::Map<String, serde_json::Value>;

/// Fixed-shape frame metadata, always present, JSON-encoded on the wire.
///
/// `head_length` and `body_length` are the exact byte lengths of the two
/// variable-length sections that follow the envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: String,
    pub head_length: u16,
    pub body_length: u32,
}

impl Envelope {
    /// Build an envelope for measured section lengths.
    pub fn new(head_length: u16, body_length: u32) -> Self {
        Self {
            version: PROTOCOL_VERSION.to_string(),
            head_length,
            body_length,
        }
    }
}
