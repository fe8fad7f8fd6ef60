//! OneOf codec: a varint discriminant followed by one encoded inner
//! value, inside a size-prefixed body. An absent variant is a zero-length
//! body.

use bytes::{Buf, BufMut, BytesMut};

use super::decode::{decode_value, read_body};
use super::encode::encode_value;
use super::{varint, SIZE_LIMIT};
use crate::error::YarpError;
use crate::types::OneOfValue;

pub fn encode_oneof(buf: &mut BytesMut, oo: &Option<OneOfValue>) -> Result<(), YarpError> {
    let Some(oo) = oo else {
        buf.put_u8(0xE0);
        return Ok(());
    };

    let mut body = BytesMut::new();
    varint::encode_uint(&mut body, oo.index);
    encode_value(&mut body, &oo.data)?;
    if body.len() as u64 >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let head = varint::encode_integer(buf, body.len() as u64);
    buf[head] |= 0xE0;
    buf.put_slice(&body);
    Ok(())
}

pub fn decode_oneof(head: u8, buf: &mut impl Buf) -> Result<Option<OneOfValue>, YarpError> {
    let body = read_body(head, buf)?;
    let mut window = &body[..];
    if !window.has_remaining() {
        return Ok(None);
    }

    let idx_head = window.get_u8();
    let (_, index) = varint::decode_scalar(idx_head, &mut window)?;
    let data = decode_value(&mut window)?;
    if window.has_remaining() {
        return Err(YarpError::CorruptStream);
    }
    Ok(Some(OneOfValue {
        index,
        data: Box::new(data),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::decode::decode_from_bytes;
    use crate::codec::encode::encode_to_bytes;
    use crate::types::YarpValue;

    #[test]
    fn string_variant_layout() {
        let v = YarpValue::OneOf(Some(OneOfValue {
            index: 45,
            data: Box::new(YarpValue::String("Hello, World!".into())),
        }));
        let buf = encode_to_bytes(&v).unwrap();
        assert_eq!(
            &buf[..],
            &[
                0xE1, 0x22, 0x21, 0x5A, 0xA1, 0x1A, 0x48, 0x65, 0x6C, 0x6C, 0x6F, 0x2C, 0x20,
                0x57, 0x6F, 0x72, 0x6C, 0x64, 0x21
            ]
        );
        assert_eq!(decode_from_bytes(&buf).unwrap(), v);
    }

    #[test]
    fn absent_variant_is_one_byte() {
        let v = YarpValue::OneOf(None);
        let buf = encode_to_bytes(&v).unwrap();
        assert_eq!(&buf[..], &[0xE0]);
        assert_eq!(decode_from_bytes(&buf).unwrap(), v);
    }

    #[test]
    fn nested_value_round_trip() {
        let v = YarpValue::OneOf(Some(OneOfValue {
            index: 2,
            data: Box::new(YarpValue::Array(vec![
                YarpValue::uint(1),
                YarpValue::uint(2),
            ])),
        }));
        let buf = encode_to_bytes(&v).unwrap();
        assert_eq!(decode_from_bytes(&buf).unwrap(), v);
    }

    #[test]
    fn trailing_body_bytes_are_corrupt() {
        // Body: index 0, void value, one stray byte.
        let data = [0xE1, 0x06, 0x20, 0x00, 0x00];
        assert!(matches!(
            decode_from_bytes(&data),
            Err(YarpError::CorruptStream)
        ));
    }
}
