//! Packet framing: the fixed header and channel flags.
//!
//! `[type:1][flags:1][payload_len:4 BE]` always; the UDP channels
//! (flags 0x02 and 0x08) append `[seq:2][ack:2][ack_bits:4]`, for a total
//! header of 6 or 14 bytes.

use byteorder::{BigEndian, ByteOrder};

use crate::NetError;

/// TCP control message; ordering comes from the OS, no reliability header.
pub const FLAG_TCP: u8 = 0x01;
/// UDP unreliable; reliability header present, retransmission off.
pub const FLAG_UDP: u8 = 0x02;
/// UDP reliable; reliability header present, retransmission on.
pub const FLAG_UDP_RELIABLE: u8 = 0x08;

/// Header size without the reliability fields.
pub const HEADER_LEN: usize = 6;
/// Header size with `[seq][ack][ack_bits]`.
pub const HEADER_LEN_RELIABLE: usize = 14;

/// Largest payload the framing will accept. Anything above this is a
/// `ProtocolError` (impossible length), not a bigger allocation.
pub const MAX_PAYLOAD: u32 = 64 * 1024;

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Which channel a packet travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Tcp,
    Udp,
    UdpReliable,
}

impl Channel {
    pub fn flags(self) -> u8 {
        match self {
            Channel::Tcp => FLAG_TCP,
            Channel::Udp => FLAG_UDP,
            Channel::UdpReliable => FLAG_UDP_RELIABLE,
        }
    }

    pub fn from_flags(flags: u8) -> Result<Self, NetError> {
        match flags {
            FLAG_TCP => Ok(Channel::Tcp),
            FLAG_UDP => Ok(Channel::Udp),
            FLAG_UDP_RELIABLE => Ok(Channel::UdpReliable),
            other => Err(NetError::UnknownFlags(other)),
        }
    }

    /// Whether the `[seq][ack][ack_bits]` fields follow the base header.
    pub fn has_reliability_header(self) -> bool {
        matches!(self, Channel::Udp | Channel::UdpReliable)
    }

    pub fn header_len(self) -> usize {
        if self.has_reliability_header() {
            HEADER_LEN_RELIABLE
        } else {
            HEADER_LEN
        }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// A parsed packet header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: u8,
    pub channel: Channel,
    pub payload_len: u32,
    /// Sender's sequence number (UDP channels only, 0 on TCP).
    pub seq: u16,
    /// Highest remote sequence the sender has seen.
    pub ack: u16,
    /// Selective ack for the 32 sequences preceding `ack`.
    pub ack_bits: u32,
}

impl Header {
    pub fn control(msg_type: u8, payload_len: u32) -> Self {
        Self {
            msg_type,
            channel: Channel::Tcp,
            payload_len,
            seq: 0,
            ack: 0,
            ack_bits: 0,
        }
    }

    /// Serialize the header in front of `payload` into a fresh packet.
    pub fn frame(&self, payload: &[u8]) -> Vec<u8> {
        let mut packet = Vec::with_capacity(self.channel.header_len() + payload.len());
        packet.push(self.msg_type);
        packet.push(self.channel.flags());
        let mut len = [0u8; 4];
        BigEndian::write_u32(&mut len, payload.len() as u32);
        packet.extend_from_slice(&len);
        if self.channel.has_reliability_header() {
            let mut rel = [0u8; 8];
            BigEndian::write_u16(&mut rel[0..2], self.seq);
            BigEndian::write_u16(&mut rel[2..4], self.ack);
            BigEndian::write_u32(&mut rel[4..8], self.ack_bits);
            packet.extend_from_slice(&rel);
        }
        packet.extend_from_slice(payload);
        packet
    }

    /// Parse a header off the front of `bytes`, returning it with the
    /// payload offset.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize), NetError> {
        if bytes.len() < HEADER_LEN {
            return Err(NetError::Truncated {
                needed: HEADER_LEN,
                have: bytes.len(),
            });
        }
        let msg_type = bytes[0];
        let channel = Channel::from_flags(bytes[1])?;
        let payload_len = BigEndian::read_u32(&bytes[2..6]);
        if payload_len > MAX_PAYLOAD {
            return Err(NetError::ImpossibleLength { len: payload_len });
        }

        let mut header = Header {
            msg_type,
            channel,
            payload_len,
            seq: 0,
            ack: 0,
            ack_bits: 0,
        };
        let offset = channel.header_len();
        if channel.has_reliability_header() {
            if bytes.len() < HEADER_LEN_RELIABLE {
                return Err(NetError::Truncated {
                    needed: HEADER_LEN_RELIABLE,
                    have: bytes.len(),
                });
            }
            header.seq = BigEndian::read_u16(&bytes[6..8]);
            header.ack = BigEndian::read_u16(&bytes[8..10]);
            header.ack_bits = BigEndian::read_u32(&bytes[10..14]);
        }
        if bytes.len() < offset + payload_len as usize {
            return Err(NetError::Truncated {
                needed: offset + payload_len as usize,
                have: bytes.len(),
            });
        }
        Ok((header, offset))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tcp_frame_is_six_byte_header() {
        let header = Header::control(0x01, 3);
        let packet = header.frame(&[1, 2, 3]);
        assert_eq!(packet.len(), 9);
        assert_eq!(&packet[..6], &[0x01, FLAG_TCP, 0, 0, 0, 3]);
    }

    #[test]
    fn reliable_frame_carries_seq_ack_bits() {
        let header = Header {
            msg_type: 0x23,
            channel: Channel::UdpReliable,
            payload_len: 0,
            seq: 7,
            ack: 5,
            ack_bits: 0x0000_0001,
        };
        let packet = header.frame(&[]);
        assert_eq!(packet.len(), HEADER_LEN_RELIABLE);

        let (parsed, offset) = Header::parse(&packet).unwrap();
        assert_eq!(offset, HEADER_LEN_RELIABLE);
        assert_eq!(parsed.seq, 7);
        assert_eq!(parsed.ack, 5);
        assert_eq!(parsed.ack_bits, 1);
        assert_eq!(parsed.channel, Channel::UdpReliable);
    }

    #[test]
    fn round_trip_udp_unreliable() {
        let header = Header {
            msg_type: 0x21,
            channel: Channel::Udp,
            payload_len: 2,
            seq: 42,
            ack: 41,
            ack_bits: 0xFFFF_FFFF,
        };
        let packet = header.frame(&[9, 9]);
        let (parsed, offset) = Header::parse(&packet).unwrap();
        assert_eq!(parsed, Header { payload_len: 2, ..header });
        assert_eq!(&packet[offset..], &[9, 9]);
    }

    #[test]
    fn truncated_header_rejected() {
        assert!(matches!(
            Header::parse(&[0x01, 0x01, 0x00]),
            Err(NetError::Truncated { .. })
        ));
    }

    #[test]
    fn impossible_length_rejected() {
        let mut packet = vec![0x01, FLAG_TCP];
        packet.extend_from_slice(&(MAX_PAYLOAD + 1).to_be_bytes());
        assert!(matches!(
            Header::parse(&packet),
            Err(NetError::ImpossibleLength { .. })
        ));
    }

    #[test]
    fn unknown_flags_rejected() {
        let packet = [0x01, 0x40, 0, 0, 0, 0];
        assert!(matches!(
            Header::parse(&packet),
            Err(NetError::UnknownFlags(0x40))
        ));
    }

    #[test]
    fn truncated_payload_rejected() {
        let header = Header::control(0x0C, 10);
        let mut packet = header.frame(&[0u8; 10]);
        packet.truncate(12);
        assert!(matches!(
            Header::parse(&packet),
            Err(NetError::Truncated { .. })
        ));
    }
}
