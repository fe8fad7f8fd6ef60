//! The response frame: magic prefix, headers, and the stream flag.

use bytes::{BufMut, BytesMut};
use tokio::io::AsyncRead;

use super::{ValueReader, MAGIC_RESPONSE};
use crate::codec::varint;
use crate::error::YarpError;
use crate::types::{FromValue, Header, IntoValue, YarpValue};

/// The beginning of a response in a YARP stream: arbitrary headers
/// followed by a boolean indicating whether the server will stream a
/// sequence of response values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub headers: Header,
    pub stream: bool,
}

impl Response {
    pub fn new(headers: Header, stream: bool) -> Self {
        Self { headers, stream }
    }

    /// Encodes the response frame.
    pub fn encode(&self) -> Result<BytesMut, YarpError> {
        let mut data = BytesMut::new();
        data.put_slice(&MAGIC_RESPONSE);
        crate::codec::encode_value(&mut data, &self.headers.to_value()?)?;
        varint::encode_bool(&mut data, self.stream);
        Ok(data)
    }

    /// Reads a complete response frame, magic included.
    pub async fn read_from<R: AsyncRead + Unpin>(
        reader: &mut ValueReader<R>,
    ) -> Result<Response, YarpError> {
        let magic = reader.read_magic().await?;
        if magic != MAGIC_RESPONSE {
            return Err(YarpError::CorruptStream);
        }
        Self::read_after_magic(reader).await
    }

    /// Reads the frame body once the magic prefix has been consumed.
    pub async fn read_after_magic<R: AsyncRead + Unpin>(
        reader: &mut ValueReader<R>,
    ) -> Result<Response, YarpError> {
        let headers = Header::from_value(&reader.read_value().await?)
            .ok_or(YarpError::CorruptStream)?;
        let stream = match reader.read_value().await? {
            // The sign flag carries the boolean.
            YarpValue::Scalar { signed, .. } => signed,
            _ => return Err(YarpError::CorruptStream),
        };
        Ok(Response { headers, stream })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn frame_layout() {
        let res = Response::new(
            Header::from(HashMap::from([(
                "Header".to_string(),
                "Value".to_string(),
            )])),
            true,
        );
        let data = res.encode().unwrap();
        assert_eq!(
            &data[..],
            &[
                0x79, 0x79, 0x52, 0xC1, 0x26, 0x21, 0x10, 0xA1, 0x0C, 0x48, 0x65, 0x61, 0x64,
                0x65, 0x72, 0x21, 0x0E, 0xA1, 0x0A, 0x56, 0x61, 0x6C, 0x75, 0x65, 0x30
            ]
        );

        let mut reader = ValueReader::new(Cursor::new(data.to_vec()));
        let decoded = Response::read_from(&mut reader).await.unwrap();
        assert!(decoded.stream);
        assert_eq!(decoded.headers.get("Header"), "Value");
    }

    #[tokio::test]
    async fn non_streamed_round_trip() {
        let res = Response::new(Header::new(), false);
        let data = res.encode().unwrap();
        let mut reader = ValueReader::new(Cursor::new(data.to_vec()));
        assert_eq!(Response::read_from(&mut reader).await.unwrap(), res);
    }
}
