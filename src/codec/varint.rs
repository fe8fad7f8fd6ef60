//! Variable-length integer and scalar codec.
//!
//! The leading byte holds up to two payload bits at positions 2–1 and a
//! continuation flag at bit 0; bit 4 distinguishes signed from unsigned
//! scalars. Each continuation byte carries seven payload bits at positions
//! 7–1 and a continuation flag at bit 0, most significant chunk first.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::YarpError;

const MAX_LEN: usize = 16;

/// Appends the varint encoding of `value` and returns the index of its
/// leading byte, so callers can fold a type tag into the top nibble.
pub fn encode_integer(buf: &mut BytesMut, value: u64) -> usize {
    let mut data = [0u8; MAX_LEN];
    let mut pos = MAX_LEN - 1;
    let mut v = value;
    while v > 0x3 {
        data[pos] = ((v & 0x7F) as u8) << 1;
        if pos != MAX_LEN - 1 {
            data[pos] |= 0x1;
        }
        pos -= 1;
        v >>= 7;
    }
    data[pos] = ((v as u8) << 1) & 0x7;
    if pos < MAX_LEN - 1 {
        data[pos] |= 0x1;
    }
    let head = buf.len();
    buf.put_slice(&data[pos..]);
    head
}

/// Encodes an unsigned scalar value.
pub fn encode_uint(buf: &mut BytesMut, value: u64) {
    let head = encode_integer(buf, value);
    buf[head] |= 0x20;
}

/// Encodes a signed scalar value (two's-complement magnitude).
pub fn encode_int(buf: &mut BytesMut, value: i64) {
    let head = encode_integer(buf, value as u64);
    buf[head] |= 0x30;
}

/// Encodes a boolean as a single-byte degenerate scalar.
pub fn encode_bool(buf: &mut BytesMut, value: bool) {
    buf.put_u8(if value { 0x30 } else { 0x20 });
}

/// Decodes a scalar given its leading byte, reading continuation bytes
/// from `buf`. Returns the sign flag and the 64-bit magnitude.
///
/// Running out of bytes while a continuation bit is set means the stream
/// is corrupt.
pub fn decode_scalar(head: u8, buf: &mut impl Buf) -> Result<(bool, u64), YarpError> {
    let mut value = u64::from(head & 0xE) >> 1;
    let signed = head & 0x10 == 0x10;
    if head & 0x1 != 0x1 {
        return Ok((signed, value));
    }
    loop {
        value <<= 7;
        if !buf.has_remaining() {
            return Err(YarpError::CorruptStream);
        }
        let b = buf.get_u8();
        value |= u64::from(b) >> 1;
        if b & 0x1 != 0x1 {
            break;
        }
    }
    Ok((signed, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimaryType;

    fn round_trip_uint(value: u64) -> (bool, u64) {
        let mut buf = BytesMut::new();
        encode_uint(&mut buf, value);
        let head = buf[0];
        let mut rest = &buf[1..];
        decode_scalar(head, &mut rest).expect("decode failed")
    }

    #[test]
    fn uint_round_trip() {
        for i in 0..1024u64 {
            let (signed, v) = round_trip_uint(i);
            assert!(!signed);
            assert_eq!(v, i);
        }
    }

    #[test]
    fn int_round_trip() {
        for i in -512i64..512 {
            let mut buf = BytesMut::new();
            encode_int(&mut buf, i);
            let head = buf[0];
            assert_eq!(PrimaryType::detect(head), PrimaryType::Scalar);
            let mut rest = &buf[1..];
            let (signed, v) = decode_scalar(head, &mut rest).unwrap();
            assert!(signed);
            assert_eq!(v as i64, i);
        }
    }

    #[test]
    fn twelve_is_two_bytes() {
        let mut buf = BytesMut::new();
        encode_uint(&mut buf, 12);
        assert_eq!(&buf[..], &[0x21, 0x18]);
    }

    #[test]
    fn zero_fits_in_head() {
        let mut buf = BytesMut::new();
        encode_uint(&mut buf, 0);
        assert_eq!(&buf[..], &[0x20]);
        for i in 0..=3u64 {
            let mut buf = BytesMut::new();
            encode_uint(&mut buf, i);
            assert_eq!(buf.len(), 1, "value {i} should fit in the head");
        }
        let mut buf = BytesMut::new();
        encode_uint(&mut buf, 4);
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn bool_single_bytes() {
        let mut buf = BytesMut::new();
        encode_bool(&mut buf, true);
        encode_bool(&mut buf, false);
        assert_eq!(&buf[..], &[0x30, 0x20]);
        assert_eq!(PrimaryType::detect(0x30), PrimaryType::Scalar);
    }

    #[test]
    fn large_values_round_trip() {
        for v in [
            u64::from(u32::MAX),
            u64::MAX,
            1 << 62,
            1 << 63,
            (1 << 63) + 3,
            u64::MAX - 1,
        ] {
            let (signed, got) = round_trip_uint(v);
            assert!(!signed);
            assert_eq!(got, v, "failed for {v:#x}");
        }
    }

    #[test]
    fn negative_int_round_trip() {
        let mut buf = BytesMut::new();
        encode_int(&mut buf, -1);
        let head = buf[0];
        let mut rest = &buf[1..];
        let (signed, v) = decode_scalar(head, &mut rest).unwrap();
        assert!(signed);
        assert_eq!(v as i64, -1);
    }

    #[test]
    fn truncated_continuation_is_corrupt() {
        let mut buf = BytesMut::new();
        encode_uint(&mut buf, 1_000_000);
        // Drop the terminal byte.
        let head = buf[0];
        let mut rest = &buf[1..buf.len() - 1];
        assert!(matches!(
            decode_scalar(head, &mut rest),
            Err(YarpError::CorruptStream)
        ));
    }
}
