//! YARP client — dials a server and issues single or streamed requests.
//!
//! Each request opens a fresh connection carrying exactly one request and
//! one response.

mod connection;

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::codec::encode::encode_to_bytes;
use crate::error::{RpcError, YarpError};
use crate::net::Endpoint;
use crate::types::{FromValue, Header, IntoValue, YarpValue};
use crate::wire::{FrameKind, Request, Response, ValueReader};
use connection::Transport;

/// A client for a single YARP server address.
pub struct YarpClient {
    endpoint: Endpoint,
    timeout: Option<Duration>,
}

impl YarpClient {
    /// Creates a client for `address`: `host:port`, or `unix://<path>`
    /// for a Unix domain socket.
    pub fn new(address: &str) -> Self {
        Self {
            endpoint: Endpoint::parse(address),
            timeout: None,
        }
    }

    /// Sets the dial timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Writes the request frame and argument, then reads the peer's frame
    /// choice: a response (returned along with the reader positioned at
    /// the first body value) or an error (surfaced as
    /// [`YarpError::Remote`]).
    async fn perform_request(
        &self,
        request: &Request,
        value: &YarpValue,
    ) -> Result<(Response, ValueReader<Transport>), YarpError> {
        let mut data = request.encode()?;
        data.extend_from_slice(&encode_to_bytes(value)?);

        let mut stream = Transport::dial(&self.endpoint, self.timeout).await?;
        stream.write_all(&data).await?;
        stream.flush().await?;

        let mut reader = ValueReader::new(stream);
        let magic = reader.read_magic().await?;
        match FrameKind::detect(&magic) {
            Some(FrameKind::Error) => {
                let error = RpcError::read_after_magic(&mut reader).await?;
                Err(YarpError::Remote(error))
            }
            Some(FrameKind::Response) => {
                let response = Response::read_after_magic(&mut reader).await?;
                Ok((response, reader))
            }
            _ => Err(YarpError::CorruptStream),
        }
    }

    /// Issues a request expecting a single response value.
    pub async fn do_request(
        &self,
        request: Request,
        value: &impl IntoValue,
    ) -> Result<(YarpValue, Header), YarpError> {
        let (response, mut reader) = self.perform_request(&request, &value.to_value()?).await?;
        if response.stream {
            return Err(YarpError::WantsStreamed);
        }
        let value = reader.read_value().await?;
        Ok((value, response.headers))
    }

    /// Issues a request expecting a streamed response. The returned
    /// channel yields decoded values until end-of-stream; any decode
    /// error ends the sequence.
    pub async fn do_request_streamed(
        &self,
        request: Request,
        value: &impl IntoValue,
    ) -> Result<(mpsc::Receiver<YarpValue>, Header), YarpError> {
        let (response, mut reader) = self.perform_request(&request, &value.to_value()?).await?;
        let (tx, rx) = mpsc::channel(10);
        tokio::spawn(async move {
            loop {
                match reader.read_value().await {
                    Ok(value) => {
                        tracing::debug!(%value, "streamed response value");
                        if tx.send(value).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });
        Ok((rx, response.headers))
    }

    /// Typed convenience around [`do_request`](Self::do_request):
    /// converts the response to `Out`, failing with
    /// [`YarpError::IncompatibleResponse`] when the server returned a
    /// different shape.
    pub async fn call<In, Out>(
        &self,
        method: u64,
        headers: Header,
        value: &In,
    ) -> Result<(Out, Header), YarpError>
    where
        In: IntoValue,
        Out: FromValue,
    {
        let (value, headers) = self.do_request(Request::new(method, headers), value).await?;
        match Out::from_value(&value) {
            Some(out) => Ok((out, headers)),
            None => Err(YarpError::IncompatibleResponse {
                received: value.primary_type().to_string(),
                wants: std::any::type_name::<Out>().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::ErrorKind;
    use crate::registry;
    use crate::server::{Context, Streamer, YarpServer};
    use crate::structure::{FieldTag, FieldValue, Structure, StructValuer};
    use crate::{codec, YarpError};

    #[derive(Debug, Clone, Default, PartialEq)]
    struct SimpleRequest {
        structure: Structure,
        name: String,
        email: String,
    }

    impl StructValuer for SimpleRequest {
        fn yarp_id() -> u64 {
            0x20
        }
        fn yarp_package() -> &'static str {
            "io.yarpr.simple"
        }
        fn yarp_struct_name() -> &'static str {
            "SimpleRequest"
        }
        fn field_tags() -> &'static [FieldTag] {
            const TAGS: [FieldTag; 2] = [FieldTag::new("0", "name"), FieldTag::new("1", "email")];
            &TAGS
        }
        fn field_values(&self) -> Result<Vec<FieldValue>, YarpError> {
            Ok(vec![
                FieldValue::Plain(self.name.to_value()?),
                FieldValue::Plain(self.email.to_value()?),
            ])
        }
        fn set_field(&mut self, index: u32, value: &YarpValue) -> bool {
            let target = match index {
                0 => &mut self.name,
                1 => &mut self.email,
                _ => return false,
            };
            match String::from_value(value) {
                Some(v) => {
                    *target = v;
                    true
                }
                None => false,
            }
        }
        fn set_variant(&mut self, _: u32, _: u64, _: &YarpValue) -> bool {
            false
        }
        fn structure_mut(&mut self) -> &mut Structure {
            &mut self.structure
        }
    }

    impl IntoValue for SimpleRequest {
        fn to_value(&self) -> Result<YarpValue, YarpError> {
            codec::struct_to_value(self)
        }
    }

    impl FromValue for SimpleRequest {
        fn from_value(v: &YarpValue) -> Option<Self> {
            codec::struct_from_value(v).ok()
        }
    }

    #[derive(Debug, Clone, Default, PartialEq)]
    struct SimpleResponse {
        structure: Structure,
        id: i32,
    }

    impl StructValuer for SimpleResponse {
        fn yarp_id() -> u64 {
            0x21
        }
        fn yarp_package() -> &'static str {
            "io.yarpr.simple"
        }
        fn yarp_struct_name() -> &'static str {
            "SimpleResponse"
        }
        fn field_tags() -> &'static [FieldTag] {
            const TAGS: [FieldTag; 1] = [FieldTag::new("0", "id")];
            &TAGS
        }
        fn field_values(&self) -> Result<Vec<FieldValue>, YarpError> {
            Ok(vec![FieldValue::Plain(self.id.to_value()?)])
        }
        fn set_field(&mut self, index: u32, value: &YarpValue) -> bool {
            if index != 0 {
                return false;
            }
            match i32::from_value(value) {
                Some(v) => {
                    self.id = v;
                    true
                }
                None => false,
            }
        }
        fn set_variant(&mut self, _: u32, _: u64, _: &YarpValue) -> bool {
            false
        }
        fn structure_mut(&mut self) -> &mut Structure {
            &mut self.structure
        }
    }

    impl IntoValue for SimpleResponse {
        fn to_value(&self) -> Result<YarpValue, YarpError> {
            codec::struct_to_value(self)
        }
    }

    impl FromValue for SimpleResponse {
        fn from_value(v: &YarpValue) -> Option<Self> {
            codec::struct_from_value(v).ok()
        }
    }

    async fn start_simple_service() -> (Arc<YarpServer>, YarpClient) {
        registry::register_struct_type::<SimpleRequest>();
        registry::register_struct_type::<SimpleResponse>();

        let mut server = YarpServer::new("127.0.0.1:0");
        server.handle_streaming(
            0,
            "io.yarpr.SimpleService.RegisterUser",
            |_ctx: Context,
             _headers: Header,
             req: SimpleRequest,
             out: Streamer<SimpleResponse>| async move {
                if req.name == "Vito" && req.email == "hey@vito.io" {
                    out.set_header("Test", "OK");
                }
                out.push(SimpleResponse {
                    id: 1,
                    structure: Structure::default(),
                })
                .await?;
                Ok(())
            },
        );
        server.handle(
            1,
            "io.yarpr.SimpleService.DeregisterUser",
            |_ctx: Context, headers: Header, _req: SimpleRequest| async move {
                Ok((
                    headers,
                    SimpleResponse {
                        id: 41,
                        structure: Structure::default(),
                    },
                ))
            },
        );
        server.handle(
            2,
            "io.yarpr.SimpleService.FailUser",
            |_ctx: Context, _headers: Header, _req: ()| async move {
                Err::<(Header, ()), _>(RpcError::managed("user.failed"))
            },
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(server);
        {
            let server = server.clone();
            tokio::spawn(async move {
                let _ = server.start_listener(listener).await;
            });
        }

        let client =
            YarpClient::new(&addr.to_string()).with_timeout(Duration::from_secs(5));
        (server, client)
    }

    fn vito() -> SimpleRequest {
        SimpleRequest {
            name: "Vito".into(),
            email: "hey@vito.io".into(),
            structure: Structure::default(),
        }
    }

    #[tokio::test]
    async fn streamed_request_end_to_end() {
        let _guard = registry::test_guard();
        let (_server, client) = start_simple_service().await;

        let (mut rx, headers) = client
            .do_request_streamed(Request::new(0, Header::new()), &vito())
            .await
            .unwrap();
        assert_eq!(headers.get("Test"), "OK");

        let value = rx.recv().await.expect("expected one streamed value");
        let response = SimpleResponse::from_value(&value).unwrap();
        assert_eq!(response.id, 1);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn typed_call_end_to_end() {
        let _guard = registry::test_guard();
        let (_server, client) = start_simple_service().await;

        let (response, _headers) = client
            .call::<SimpleRequest, SimpleResponse>(1, Header::new(), &vito())
            .await
            .unwrap();
        assert_eq!(response.id, 41);
    }

    #[tokio::test]
    async fn single_request_against_streamed_method() {
        let _guard = registry::test_guard();
        let (_server, client) = start_simple_service().await;

        let result = client
            .do_request(Request::new(0, Header::new()), &vito())
            .await;
        assert!(matches!(result, Err(YarpError::WantsStreamed)));
    }

    #[tokio::test]
    async fn handler_error_surfaces_as_remote_error() {
        let _guard = registry::test_guard();
        let (_server, client) = start_simple_service().await;

        let result = client.do_request(Request::new(2, Header::new()), &()).await;
        match result {
            Err(YarpError::Remote(e)) => {
                assert_eq!(e.kind, ErrorKind::ManagedError);
                assert_eq!(e.identifier, "user.failed");
            }
            other => panic!("expected remote error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn incompatible_response_type() {
        let _guard = registry::test_guard();
        let (_server, client) = start_simple_service().await;

        let result = client
            .call::<SimpleRequest, String>(1, Header::new(), &vito())
            .await;
        assert!(matches!(
            result,
            Err(YarpError::IncompatibleResponse { .. })
        ));
    }
}
