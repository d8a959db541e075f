//! Frame reassembly for the TCP control channel.
//!
//! TCP delivers a byte stream; the assembler buffers incoming chunks and
//! yields complete `[header][payload]` frames as they become available.
//! A malformed header is unrecoverable on a stream, so it surfaces as an
//! error and the caller closes the connection.

use byteorder::{BigEndian, ByteOrder};

use crate::frame::{HEADER_LEN, MAX_PAYLOAD};
use crate::NetError;

#[derive(Debug, Default)]
pub struct FrameAssembler {
    buffer: Vec<u8>,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes read off the socket.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` while the frame is still partial. On a framing
    /// error the internal buffer is poisoned and the connection must be
    /// dropped.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, NetError> {
        if self.buffer.len() < HEADER_LEN {
            return Ok(None);
        }
        let payload_len = BigEndian::read_u32(&self.buffer[2..6]);
        if payload_len > MAX_PAYLOAD {
            return Err(NetError::ImpossibleLength { len: payload_len });
        }
        let total = HEADER_LEN + payload_len as usize;
        if self.buffer.len() < total {
            return Ok(None);
        }
        let frame = self.buffer[..total].to_vec();
        self.buffer.drain(..total);
        Ok(Some(frame))
    }

    /// Bytes currently buffered (diagnostics).
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Header;

    fn frame_of(msg_type: u8, payload: &[u8]) -> Vec<u8> {
        Header::control(msg_type, payload.len() as u32).frame(payload)
    }

    #[test]
    fn whole_frame_in_one_chunk() {
        let mut asm = FrameAssembler::new();
        asm.push_bytes(&frame_of(0x0C, b"hi"));
        let frame = asm.next_frame().unwrap().unwrap();
        assert_eq!(frame[0], 0x0C);
        assert_eq!(&frame[HEADER_LEN..], b"hi");
        assert!(asm.next_frame().unwrap().is_none());
    }

    #[test]
    fn frame_split_across_chunks() {
        let packet = frame_of(0x01, b"alicepw");
        let mut asm = FrameAssembler::new();
        asm.push_bytes(&packet[..4]);
        assert!(asm.next_frame().unwrap().is_none());
        asm.push_bytes(&packet[4..8]);
        assert!(asm.next_frame().unwrap().is_none());
        asm.push_bytes(&packet[8..]);
        assert_eq!(asm.next_frame().unwrap().unwrap(), packet);
    }

    #[test]
    fn two_frames_back_to_back() {
        let a = frame_of(0x08, &[1]);
        let b = frame_of(0x0A, &[0, 2]);
        let mut asm = FrameAssembler::new();
        let mut joined = a.clone();
        joined.extend_from_slice(&b);
        asm.push_bytes(&joined);

        assert_eq!(asm.next_frame().unwrap().unwrap(), a);
        assert_eq!(asm.next_frame().unwrap().unwrap(), b);
        assert_eq!(asm.buffered(), 0);
    }

    #[test]
    fn impossible_length_poisons_stream() {
        let mut bytes = vec![0x01, 0x01];
        bytes.extend_from_slice(&(MAX_PAYLOAD + 5).to_be_bytes());
        let mut asm = FrameAssembler::new();
        asm.push_bytes(&bytes);
        assert!(matches!(
            asm.next_frame(),
            Err(NetError::ImpossibleLength { .. })
        ));
    }
}
