//! Decoding: bytes → `YarpValue`.

use bytes::{Buf, Bytes};

use super::{array, float, map, oneof, string, structs, varint, SIZE_LIMIT};
use crate::error::YarpError;
use crate::types::{PrimaryType, YarpValue};

/// Decodes a single `YarpValue` from the buffer.
///
/// Produces either a well-typed value or an error; struct values are
/// returned raw (id + positional fields) for a later binding pass.
pub fn decode_value(buf: &mut impl Buf) -> Result<YarpValue, YarpError> {
    if !buf.has_remaining() {
        return Err(YarpError::CorruptStream);
    }
    let head = buf.get_u8();
    match PrimaryType::detect(head) {
        PrimaryType::Void => Ok(YarpValue::Void),
        PrimaryType::Scalar => {
            let (signed, value) = varint::decode_scalar(head, buf)?;
            Ok(YarpValue::Scalar { signed, value })
        }
        PrimaryType::Float => {
            let (bits, value) = float::decode_float(head, buf)?;
            if bits == 32 {
                Ok(YarpValue::Float32(value as f32))
            } else {
                Ok(YarpValue::Float64(value))
            }
        }
        PrimaryType::String => Ok(YarpValue::String(string::decode_string(head, buf)?)),
        PrimaryType::Array => array::decode_array(head, buf).map(YarpValue::Array),
        PrimaryType::Map => map::decode_map(head, buf).map(YarpValue::Map),
        PrimaryType::OneOf => oneof::decode_oneof(head, buf).map(YarpValue::OneOf),
        PrimaryType::Struct => structs::decode_struct(head, buf).map(YarpValue::Struct),
        PrimaryType::Invalid => Err(YarpError::InvalidType),
    }
}

/// Reads a size-prefixed container body given its leading byte: decodes
/// the varint size, guards the ceiling, and slices off exactly that many
/// bytes.
pub(crate) fn read_body(head: u8, buf: &mut impl Buf) -> Result<Bytes, YarpError> {
    let (_, size) = varint::decode_scalar(head, buf)?;
    if size >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let size = size as usize;
    if buf.remaining() < size {
        return Err(YarpError::CorruptStream);
    }
    Ok(buf.copy_to_bytes(size))
}

/// Convenience: decodes exactly one value from a byte slice, requiring the
/// slice to be fully consumed.
pub fn decode_from_bytes(data: &[u8]) -> Result<YarpValue, YarpError> {
    let mut buf = data;
    let value = decode_value(&mut buf)?;
    if buf.has_remaining() {
        return Err(YarpError::CorruptStream);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode::encode_to_bytes;

    fn round_trip(value: &YarpValue) -> YarpValue {
        let buf = encode_to_bytes(value).unwrap();
        decode_from_bytes(&buf).expect("decode failed")
    }

    #[test]
    fn round_trip_void() {
        assert_eq!(round_trip(&YarpValue::Void), YarpValue::Void);
    }

    #[test]
    fn round_trip_scalars() {
        for v in [0u64, 1, 3, 4, 7, 8, 12, 127, 128, 1 << 20, u64::MAX] {
            assert_eq!(round_trip(&YarpValue::uint(v)), YarpValue::uint(v));
        }
        for v in [-1i64, -512, 0, 42, i64::MIN, i64::MAX] {
            assert_eq!(round_trip(&YarpValue::int(v)), YarpValue::int(v));
        }
        assert_eq!(round_trip(&YarpValue::bool(true)), YarpValue::bool(true));
        assert_eq!(round_trip(&YarpValue::bool(false)), YarpValue::bool(false));
    }

    #[test]
    fn round_trip_floats() {
        for v in [0.0f32, 0.1, -2.5, f32::MAX] {
            assert_eq!(round_trip(&YarpValue::Float32(v)), YarpValue::Float32(v));
        }
        for v in [0.0f64, 0.1, -2.5, f64::MAX] {
            assert_eq!(round_trip(&YarpValue::Float64(v)), YarpValue::Float64(v));
        }
    }

    #[test]
    fn round_trip_string() {
        let v = YarpValue::String("Hello, World!".into());
        assert_eq!(round_trip(&v), v);
    }

    #[test]
    fn empty_input_is_corrupt() {
        assert!(matches!(
            decode_from_bytes(&[]),
            Err(YarpError::CorruptStream)
        ));
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        assert!(matches!(
            decode_from_bytes(&[0x20, 0x20]),
            Err(YarpError::CorruptStream)
        ));
    }
}
