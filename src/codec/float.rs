//! 32 and 64-bit IEEE-754 float codec.
//!
//! Leading byte patterns: `0x40` (f32), `0x50` (f64); bit 3 marks a zero
//! value, which takes no payload. Nonzero values are followed by the
//! little-endian bit pattern.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::YarpError;

pub fn encode_float32(buf: &mut BytesMut, value: f32) {
    let header: u8 = 0x40;
    if value == 0.0 {
        buf.put_u8(header | 0x8);
        return;
    }
    buf.put_u8(header);
    buf.put_u32_le(value.to_bits());
}

pub fn encode_float64(buf: &mut BytesMut, value: f64) {
    let header: u8 = 0x50;
    if value == 0.0 {
        buf.put_u8(header | 0x8);
        return;
    }
    buf.put_u8(header);
    buf.put_u64_le(value.to_bits());
}

/// Decodes a float given its leading byte. Returns the bit width (32 or
/// 64) and the value widened to f64; higher layers narrow back when the
/// target type demands f32.
pub fn decode_float(head: u8, buf: &mut impl Buf) -> Result<(u32, f64), YarpError> {
    let bits = if head & 0x10 == 0x10 { 64 } else { 32 };
    if head & 0x8 == 0x8 {
        return Ok((bits, 0.0));
    }
    if buf.remaining() < bits as usize / 8 {
        return Err(YarpError::CorruptStream);
    }
    let value = if bits == 32 {
        f64::from(f32::from_bits(buf.get_u32_le()))
    } else {
        f64::from_bits(buf.get_u64_le())
    };
    Ok((bits, value))
}
