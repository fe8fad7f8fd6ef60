//! Reads encoded values from an async byte stream.
//!
//! Every value's total length is determined by its leading byte and size
//! varint, so the reader pulls exactly one complete encoding off the
//! stream and hands it to the synchronous decoder. The size ceiling is
//! enforced before any body is buffered.

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::codec::decode::decode_from_bytes;
use crate::codec::SIZE_LIMIT;
use crate::error::YarpError;
use crate::types::{PrimaryType, YarpValue};

/// Reads YARP values from an `AsyncRead` stream.
pub struct ValueReader<R> {
    reader: R,
}

impl<R: AsyncRead + Unpin> ValueReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Access to the underlying stream, for callers that interleave
    /// writes on the same connection.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consumes the reader, returning the underlying stream.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Reads a three-byte magic prefix.
    pub async fn read_magic(&mut self) -> Result<[u8; 3], YarpError> {
        let mut magic = [0u8; 3];
        self.reader.read_exact(&mut magic).await?;
        Ok(magic)
    }

    /// Reads one complete value off the stream.
    pub async fn read_value(&mut self) -> Result<YarpValue, YarpError> {
        let bytes = self.read_value_bytes().await?;
        decode_from_bytes(&bytes)
    }

    /// Reads a bare scalar (sign flag and magnitude), as used for frame
    /// fields like the request body length.
    pub async fn read_scalar(&mut self) -> Result<(bool, u64), YarpError> {
        let head = self.reader.read_u8().await?;
        let mut scratch = BytesMut::new();
        let value = self.read_scalar_tail(head, &mut scratch).await?;
        Ok((head & 0x10 == 0x10, value))
    }

    /// Reads exactly `len` bytes.
    pub async fn read_bytes(&mut self, len: usize) -> Result<BytesMut, YarpError> {
        let mut buf = BytesMut::zeroed(len);
        self.reader.read_exact(&mut buf).await?;
        Ok(buf)
    }

    /// Buffers the complete encoding of the next value, leading byte
    /// included.
    async fn read_value_bytes(&mut self) -> Result<BytesMut, YarpError> {
        let head = self.reader.read_u8().await?;
        let mut buf = BytesMut::new();
        buf.put_u8(head);

        match PrimaryType::detect(head) {
            PrimaryType::Void => {}
            PrimaryType::Scalar => {
                self.read_scalar_tail(head, &mut buf).await?;
            }
            PrimaryType::Float => {
                // Bit 3 marks the one-byte zero form.
                if head & 0x8 != 0x8 {
                    let width = if head & 0x10 == 0x10 { 8 } else { 4 };
                    let mut payload = [0u8; 8];
                    self.reader.read_exact(&mut payload[..width]).await?;
                    buf.put_slice(&payload[..width]);
                }
            }
            PrimaryType::String
            | PrimaryType::Array
            | PrimaryType::Map
            | PrimaryType::OneOf
            | PrimaryType::Struct => {
                let size = self.read_scalar_tail(head, &mut buf).await?;
                if size >= SIZE_LIMIT {
                    return Err(YarpError::SizeTooLarge);
                }
                let start = buf.len();
                buf.resize(start + size as usize, 0);
                self.reader.read_exact(&mut buf[start..]).await?;
            }
            PrimaryType::Invalid => return Err(YarpError::InvalidType),
        }

        Ok(buf)
    }

    /// Reads a varint's continuation bytes, appending them to `buf`, and
    /// returns the full magnitude including the head's payload bits.
    async fn read_scalar_tail(&mut self, head: u8, buf: &mut BytesMut) -> Result<u64, YarpError> {
        let mut value = u64::from(head & 0xE) >> 1;
        if head & 0x1 != 0x1 {
            return Ok(value);
        }
        loop {
            value <<= 7;
            let b = self.reader.read_u8().await?;
            buf.put_u8(b);
            value |= u64::from(b) >> 1;
            if b & 0x1 != 0x1 {
                return Ok(value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    use crate::codec::encode::encode_to_bytes;
    use crate::types::{MapValue, OneOfValue};

    async fn round_trip(value: &YarpValue) -> YarpValue {
        let buf = encode_to_bytes(value).unwrap();
        let mut reader = ValueReader::new(Cursor::new(buf.to_vec()));
        reader.read_value().await.expect("read failed")
    }

    #[tokio::test]
    async fn reads_each_shape() {
        for value in [
            YarpValue::Void,
            YarpValue::uint(12),
            YarpValue::int(-3),
            YarpValue::bool(true),
            YarpValue::Float32(0.0),
            YarpValue::Float32(0.25),
            YarpValue::Float64(std::f64::consts::PI),
            YarpValue::String("Hello, World!".into()),
            YarpValue::Array(vec![YarpValue::uint(1), YarpValue::uint(2)]),
            YarpValue::Map(MapValue {
                keys: vec![YarpValue::String("k".into())],
                values: vec![YarpValue::String("v".into())],
            }),
            YarpValue::OneOf(None),
            YarpValue::OneOf(Some(OneOfValue {
                index: 1,
                data: Box::new(YarpValue::uint(9)),
            })),
        ] {
            assert_eq!(round_trip(&value).await, value);
        }
    }

    #[tokio::test]
    async fn reads_values_back_to_back() {
        let mut buf = encode_to_bytes(&YarpValue::uint(7)).unwrap();
        buf.extend_from_slice(&encode_to_bytes(&YarpValue::String("next".into())).unwrap());
        let mut reader = ValueReader::new(Cursor::new(buf.to_vec()));
        assert_eq!(reader.read_value().await.unwrap(), YarpValue::uint(7));
        assert_eq!(
            reader.read_value().await.unwrap(),
            YarpValue::String("next".into())
        );
        // Stream is exhausted.
        assert!(reader.read_value().await.is_err());
    }

    #[tokio::test]
    async fn truncated_body_is_an_error() {
        let buf = encode_to_bytes(&YarpValue::String("truncated".into())).unwrap();
        let mut reader = ValueReader::new(Cursor::new(buf[..buf.len() - 2].to_vec()));
        assert!(reader.read_value().await.is_err());
    }

    #[tokio::test]
    async fn oversized_declaration_refused_before_buffering() {
        // String header declaring 2e9 bytes.
        let mut buf = BytesMut::new();
        let head = crate::codec::varint::encode_integer(&mut buf, SIZE_LIMIT);
        buf[head] |= 0xA0;
        let mut reader = ValueReader::new(Cursor::new(buf.to_vec()));
        assert!(matches!(
            reader.read_value().await,
            Err(YarpError::SizeTooLarge)
        ));
    }

    #[tokio::test]
    async fn bare_scalar_read() {
        let mut buf = BytesMut::new();
        crate::codec::varint::encode_uint(&mut buf, 26);
        let mut reader = ValueReader::new(Cursor::new(buf.to_vec()));
        assert_eq!(reader.read_scalar().await.unwrap(), (false, 26));
    }
}
