//! The request frame: magic prefix, body length, method id, and headers.

use bytes::{Buf, BufMut, BytesMut};
use tokio::io::AsyncRead;

use super::{ValueReader, MAGIC_REQUEST};
use crate::codec::decode::decode_value;
use crate::codec::{varint, SIZE_LIMIT};
use crate::error::YarpError;
use crate::types::{FromValue, Header, IntoValue};

/// An incoming request's framing: which handler should be called and any
/// metadata sent by the client. The argument value follows the frame on
/// the wire.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Request {
    pub method: u64,
    pub headers: Header,
}

impl Request {
    pub fn new(method: u64, headers: Header) -> Self {
        Self { method, headers }
    }

    /// Encodes the request frame.
    pub fn encode(&self) -> Result<BytesMut, YarpError> {
        let mut body = BytesMut::new();
        varint::encode_uint(&mut body, self.method);
        crate::codec::encode_value(&mut body, &self.headers.to_value()?)?;

        let mut data = BytesMut::new();
        data.put_slice(&MAGIC_REQUEST);
        varint::encode_uint(&mut data, body.len() as u64);
        data.put_slice(&body);
        Ok(data)
    }

    /// Reads a complete request frame, magic included.
    pub async fn read_from<R: AsyncRead + Unpin>(
        reader: &mut ValueReader<R>,
    ) -> Result<Request, YarpError> {
        let magic = reader.read_magic().await?;
        if magic != MAGIC_REQUEST {
            return Err(YarpError::CorruptStream);
        }
        Self::read_after_magic(reader).await
    }

    /// Reads the frame body once the magic prefix has been consumed.
    pub async fn read_after_magic<R: AsyncRead + Unpin>(
        reader: &mut ValueReader<R>,
    ) -> Result<Request, YarpError> {
        let (_, len) = reader.read_scalar().await?;
        if len >= SIZE_LIMIT {
            return Err(YarpError::SizeTooLarge);
        }
        let body = reader.read_bytes(len as usize).await?;
        let mut window = &body[..];

        if !window.has_remaining() {
            return Err(YarpError::CorruptStream);
        }
        let head = window.get_u8();
        let (_, method) = varint::decode_scalar(head, &mut window)?;

        let headers =
            Header::from_value(&decode_value(&mut window)?).ok_or(YarpError::CorruptStream)?;
        if window.has_remaining() {
            return Err(YarpError::CorruptStream);
        }
        Ok(Request { method, headers })
    }
}
