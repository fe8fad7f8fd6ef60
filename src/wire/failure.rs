//! The error frame: a managed error serialized onto the wire.

use std::collections::HashMap;

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncRead;

use super::{ValueReader, MAGIC_ERROR};
use crate::codec::{encode_value, string, varint};
use crate::error::{ErrorKind, RpcError, YarpError};
use crate::types::{FromValue, Header, IntoValue, YarpValue};

impl RpcError {
    /// Encodes this error as a frame: magic, kind, headers, identifier,
    /// and user data.
    pub fn encode_frame(&self) -> Result<BytesMut, YarpError> {
        let mut data = BytesMut::new();
        data.put_slice(&MAGIC_ERROR);
        varint::encode_uint(&mut data, self.kind.code());
        encode_value(&mut data, &self.headers.to_value()?)?;
        string::encode_string(&mut data, &self.identifier);
        encode_value(&mut data, &self.user_data.to_value()?)?;
        Ok(data)
    }

    /// Reads a complete error frame, magic included.
    pub async fn read_frame<R: AsyncRead + Unpin>(
        reader: &mut ValueReader<R>,
    ) -> Result<RpcError, YarpError> {
        let magic = reader.read_magic().await?;
        if magic != MAGIC_ERROR {
            return Err(YarpError::CorruptStream);
        }
        Self::read_after_magic(reader).await
    }

    /// Reads the frame body once the magic prefix has been consumed.
    pub async fn read_after_magic<R: AsyncRead + Unpin>(
        reader: &mut ValueReader<R>,
    ) -> Result<RpcError, YarpError> {
        let (_, code) = reader.read_scalar().await?;
        let headers = Header::from_value(&reader.read_value().await?)
            .ok_or(YarpError::CorruptStream)?;
        let identifier = match reader.read_value().await? {
            YarpValue::String(s) => s,
            _ => return Err(YarpError::CorruptStream),
        };
        let user_data = HashMap::<String, String>::from_value(&reader.read_value().await?)
            .ok_or(YarpError::CorruptStream)?;
        Ok(RpcError {
            kind: ErrorKind::from_code(code),
            headers,
            identifier,
            user_data,
        })
    }
}
