//! Encoding: `YarpValue` → bytes.

use bytes::{BufMut, BytesMut};

use super::{array, float, map, oneof, string, structs, varint};
use crate::error::YarpError;
use crate::types::YarpValue;

/// Encodes a `YarpValue` into the buffer.
pub fn encode_value(buf: &mut BytesMut, value: &YarpValue) -> Result<(), YarpError> {
    match value {
        YarpValue::Void => {
            encode_void(buf);
            Ok(())
        }
        YarpValue::Scalar {
            signed: true,
            value,
        } => {
            varint::encode_int(buf, *value as i64);
            Ok(())
        }
        YarpValue::Scalar {
            signed: false,
            value,
        } => {
            varint::encode_uint(buf, *value);
            Ok(())
        }
        YarpValue::Float32(v) => {
            float::encode_float32(buf, *v);
            Ok(())
        }
        YarpValue::Float64(v) => {
            float::encode_float64(buf, *v);
            Ok(())
        }
        YarpValue::String(s) => {
            string::encode_string(buf, s);
            Ok(())
        }
        YarpValue::Array(items) => array::encode_array(buf, items),
        YarpValue::Map(m) => map::encode_map(buf, m),
        YarpValue::OneOf(oo) => oneof::encode_oneof(buf, oo),
        YarpValue::Struct(raw) => structs::encode_raw_struct(buf, raw),
    }
}

/// Encodes a void value: a single zero byte.
pub fn encode_void(buf: &mut BytesMut) {
    buf.put_u8(0x00);
}

/// Convenience: encodes a value into a fresh buffer.
pub fn encode_to_bytes(value: &YarpValue) -> Result<BytesMut, YarpError> {
    let mut buf = BytesMut::new();
    encode_value(&mut buf, value)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_is_a_zero_byte() {
        let buf = encode_to_bytes(&YarpValue::Void).unwrap();
        assert_eq!(&buf[..], &[0x00]);
    }

    #[test]
    fn booleans_as_degenerate_scalars() {
        assert_eq!(&encode_to_bytes(&YarpValue::bool(true)).unwrap()[..], &[0x30]);
        assert_eq!(&encode_to_bytes(&YarpValue::bool(false)).unwrap()[..], &[0x20]);
    }

    #[test]
    fn unsigned_twelve() {
        let buf = encode_to_bytes(&YarpValue::uint(12)).unwrap();
        assert_eq!(&buf[..], &[0x21, 0x18]);
    }
}
