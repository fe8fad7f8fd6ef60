//! Length-prefixed UTF-8 string codec.

use bytes::{Buf, BufMut, BytesMut};

use super::{varint, SIZE_LIMIT};
use crate::error::YarpError;

pub fn encode_string(buf: &mut BytesMut, value: &str) {
    let head = varint::encode_integer(buf, value.len() as u64);
    buf[head] |= 0xA0;
    buf.put_slice(value.as_bytes());
}

/// Decodes a string given its leading byte: a varint byte length followed
/// by exactly that many UTF-8 bytes.
pub fn decode_string(head: u8, buf: &mut impl Buf) -> Result<String, YarpError> {
    let (_, size) = varint::decode_scalar(head, buf)?;
    if size >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let size = size as usize;
    if buf.remaining() < size {
        return Err(YarpError::CorruptStream);
    }
    let mut data = vec![0u8; size];
    buf.copy_to_slice(&mut data);
    String::from_utf8(data).map_err(|_| YarpError::CorruptStream)
}
