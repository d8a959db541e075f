//! Starward wire protocol -- framing, codec tables, and reliable datagrams.
//!
//! Every packet is `[type:1][flags:1][len:4 BE]`, optionally followed by the
//! reliability header `[seq:2][ack:2][ack_bits:4]` on the UDP channels, then
//! the payload. The [`codec`] module maps each 1-byte message type to a
//! (serialize, deserialize) pair; [`reliable`] keeps the per-peer sequence
//! state, selective-ack bitmask, duplicate window and retransmission
//! schedule. The TCP control channel reuses the framing without the
//! reliability header; [`stream`] reassembles frames from the byte stream.

#![deny(unsafe_code)]

pub mod codec;
pub mod frame;
pub mod message;
pub mod reliable;
pub mod ring;
pub mod stream;
pub mod wire;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Protocol-level failures. On UDP the packet is dropped; on TCP the
/// connection is closed after logging.
#[derive(Debug, thiserror::Error)]
pub enum NetError {
    /// Fewer bytes than a complete header.
    #[error("truncated packet: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },

    /// The length field exceeds the allowed payload size.
    #[error("impossible payload length {len}")]
    ImpossibleLength { len: u32 },

    /// The type byte is not in the message table.
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),

    /// The flags byte names no known channel.
    #[error("unknown channel flags 0x{0:02x}")]
    UnknownFlags(u8),

    /// A payload ended before its declared fields.
    #[error("malformed payload for type 0x{msg_type:02x}: {detail}")]
    Malformed { msg_type: u8, detail: &'static str },
}

/// Convenience re-exports.
pub mod prelude {
    pub use crate::codec::{Decoder, Encoder};
    pub use crate::frame::{Channel, Header, FLAG_TCP, FLAG_UDP, FLAG_UDP_RELIABLE};
    pub use crate::message::{mask, Message, MsgType};
    pub use crate::reliable::{Delivery, ReliableEndpoint};
    pub use crate::ring::RingBuffer;
    pub use crate::stream::FrameAssembler;
    pub use crate::NetError;
}
