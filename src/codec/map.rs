//! Map codec: two parallel size-prefixed blocks of encoded keys and
//! values inside a size-prefixed outer body.

use bytes::{Buf, BufMut, BytesMut};

use super::decode::{decode_value, read_body};
use super::encode::encode_value;
use super::{varint, SIZE_LIMIT};
use crate::error::YarpError;
use crate::types::{MapValue, PrimaryType, YarpValue};

/// Encodes a map. Keys must be integer or string values and homogeneous;
/// values may be any encodable type but must be homogeneous among
/// themselves. An empty map is the single byte `0xC0`.
pub fn encode_map(buf: &mut BytesMut, m: &MapValue) -> Result<(), YarpError> {
    if m.keys.len() != m.values.len() {
        return Err(YarpError::UnevenMap);
    }
    if m.keys.is_empty() {
        buf.put_u8(0xC0);
        return Ok(());
    }

    let key_type = m.keys[0].primary_type();
    if !matches!(key_type, PrimaryType::Scalar | PrimaryType::String) {
        return Err(YarpError::Unsupported(format!(
            "map key type {key_type} is not encodable"
        )));
    }
    if m.keys.iter().any(|k| k.primary_type() != key_type) {
        return Err(YarpError::NonHomogeneousMapKeys);
    }
    let value_type = m.values[0].primary_type();
    if m.values.iter().any(|v| v.primary_type() != value_type) {
        return Err(YarpError::NonHomogeneousMapValues);
    }

    let mut keys = BytesMut::new();
    for k in &m.keys {
        encode_value(&mut keys, k)?;
    }
    let mut values = BytesMut::new();
    for v in &m.values {
        encode_value(&mut values, v)?;
    }

    let mut body = BytesMut::new();
    varint::encode_uint(&mut body, keys.len() as u64);
    body.put_slice(&keys);
    varint::encode_uint(&mut body, values.len() as u64);
    body.put_slice(&values);

    if body.len() as u64 >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let head = varint::encode_integer(buf, body.len() as u64);
    buf[head] |= 0xC0;
    buf.put_slice(&body);
    Ok(())
}

/// Decodes a map given its leading byte: the key block, the value block,
/// homogeneity of each, and the cardinality invariant.
pub fn decode_map(head: u8, buf: &mut impl Buf) -> Result<MapValue, YarpError> {
    let body = read_body(head, buf)?;
    let mut window = &body[..];
    if !window.has_remaining() {
        return Ok(MapValue::default());
    }

    let keys = decode_block(&mut window, YarpError::NonHomogeneousMapKeys)?;
    let values = decode_block(&mut window, YarpError::NonHomogeneousMapValues)?;
    if window.has_remaining() {
        return Err(YarpError::CorruptStream);
    }
    if keys.len() != values.len() {
        return Err(YarpError::UnevenMap);
    }
    Ok(MapValue { keys, values })
}

/// Decodes one length-prefixed block of homogeneous values.
fn decode_block(
    window: &mut &[u8],
    mismatch: YarpError,
) -> Result<Vec<YarpValue>, YarpError> {
    if !window.has_remaining() {
        return Err(YarpError::CorruptStream);
    }
    let len_head = window.get_u8();
    let (_, len) = varint::decode_scalar(len_head, window)?;
    if len >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let len = len as usize;
    if window.remaining() < len {
        return Err(YarpError::CorruptStream);
    }
    let block = window.copy_to_bytes(len);
    let mut block = &block[..];

    let mut items = Vec::new();
    let mut block_type: Option<PrimaryType> = None;
    while block.has_remaining() {
        let value = decode_value(&mut block)?;
        match block_type {
            None => block_type = Some(value.primary_type()),
            Some(t) if t != value.primary_type() => return Err(mismatch),
            Some(_) => {}
        }
        items.push(value);
    }
    Ok(items)
}
