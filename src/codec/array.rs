//! Homogeneous array codec: a size-prefixed concatenation of encoded
//! elements.

use bytes::{Buf, BufMut, BytesMut};

use super::decode::{decode_value, read_body};
use super::encode::encode_value;
use super::{varint, SIZE_LIMIT};
use crate::error::YarpError;
use crate::types::YarpValue;

/// Encodes an array. All elements must carry the same primary type; an
/// empty array is the single byte `0x60`.
pub fn encode_array(buf: &mut BytesMut, items: &[YarpValue]) -> Result<(), YarpError> {
    if items.is_empty() {
        buf.put_u8(0x60);
        return Ok(());
    }

    let element_type = items[0].primary_type();
    for item in items {
        if item.primary_type() != element_type {
            return Err(YarpError::NonHomogeneousArray);
        }
    }

    let mut body = BytesMut::new();
    for item in items {
        encode_value(&mut body, item)?;
    }
    if body.len() as u64 >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let head = varint::encode_integer(buf, body.len() as u64);
    buf[head] |= 0x60;
    buf.put_slice(&body);
    Ok(())
}

/// Decodes an array given its leading byte: slices off the declared body
/// and decodes values until it is exhausted.
///
/// Heterogeneous payloads are not policed here; elements carry their own
/// types, and typed consumers reject mixtures during conversion.
pub fn decode_array(head: u8, buf: &mut impl Buf) -> Result<Vec<YarpValue>, YarpError> {
    let body = read_body(head, buf)?;
    let mut window = &body[..];
    let mut items = Vec::new();
    while window.has_remaining() {
        items.push(decode_value(&mut window)?);
    }
    Ok(items)
}
