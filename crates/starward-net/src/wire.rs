//! Primitive readers and writers for the wire format.
//!
//! All multi-byte integers are big-endian; floats travel as the big-endian
//! bit pattern of their IEEE-754 `f32` representation; strings are
//! `[len:1][bytes]`.

use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::NetError;

/// Reader over a received payload.
pub type Reader<'a> = Cursor<&'a [u8]>;

fn short(msg_type: u8) -> NetError {
    NetError::Malformed {
        msg_type,
        detail: "payload ended early",
    }
}

// -- scalar reads -----------------------------------------------------------

pub fn read_u8(r: &mut Reader<'_>, msg_type: u8) -> Result<u8, NetError> {
    r.read_u8().map_err(|_| short(msg_type))
}

pub fn read_u16(r: &mut Reader<'_>, msg_type: u8) -> Result<u16, NetError> {
    r.read_u16::<BigEndian>().map_err(|_| short(msg_type))
}

pub fn read_u32(r: &mut Reader<'_>, msg_type: u8) -> Result<u32, NetError> {
    r.read_u32::<BigEndian>().map_err(|_| short(msg_type))
}

pub fn read_i8(r: &mut Reader<'_>, msg_type: u8) -> Result<i8, NetError> {
    r.read_i8().map_err(|_| short(msg_type))
}

pub fn read_f32(r: &mut Reader<'_>, msg_type: u8) -> Result<f32, NetError> {
    Ok(f32::from_bits(read_u32(r, msg_type)?))
}

pub fn read_bool(r: &mut Reader<'_>, msg_type: u8) -> Result<bool, NetError> {
    Ok(read_u8(r, msg_type)? != 0)
}

/// `[len:1][bytes]`, contents taken as UTF-8 (lossy on bad input rather than
/// dropping the whole packet).
pub fn read_str(r: &mut Reader<'_>, msg_type: u8) -> Result<String, NetError> {
    let len = read_u8(r, msg_type)? as usize;
    let mut bytes = vec![0u8; len];
    std::io::Read::read_exact(r, &mut bytes).map_err(|_| short(msg_type))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// -- scalar writes ----------------------------------------------------------

pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.write_u16::<BigEndian>(value).expect("vec write");
}

pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.write_u32::<BigEndian>(value).expect("vec write");
}

pub fn write_i8(out: &mut Vec<u8>, value: i8) {
    out.write_i8(value).expect("vec write");
}

pub fn write_f32(out: &mut Vec<u8>, value: f32) {
    write_u32(out, value.to_bits());
}

pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

/// Strings longer than 255 bytes are truncated to the length prefix.
pub fn write_str(out: &mut Vec<u8>, value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(u8::MAX as usize);
    out.push(len as u8);
    out.extend_from_slice(&bytes[..len]);
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
