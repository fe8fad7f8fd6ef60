//! Handler bindings: typed closures stored in the handler table, and the
//! streamer handed to streaming handlers.

use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;

use crate::error::{ErrorKind, RpcError};
use crate::server::middleware::Context;
use crate::types::{FromValue, Header, IntoValue, YarpValue};

pub(crate) type HandlerFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Streaming responses are buffered in a small channel between the
/// handler and the pump that owns the socket.
pub(crate) const STREAM_BUFFER: usize = 10;

/// The erased invocation shapes stored in the handler table.
pub(crate) enum HandlerBinding {
    /// One decoded input, one response value.
    Unary(
        Box<
            dyn Fn(Context, Header, YarpValue) -> HandlerFuture<Result<(Header, YarpValue), RpcError>>
                + Send
                + Sync,
        >,
    ),
    /// One decoded input, a sequence of response values through a pipe.
    Streaming(
        Box<
            dyn Fn(Context, Header, YarpValue, StreamPipe) -> HandlerFuture<Result<(), RpcError>>
                + Send
                + Sync,
        >,
    ),
}

/// A registered method: id, qualified name, short name, and the erased
/// handler.
pub(crate) struct ServiceHandler {
    pub id: u64,
    pub name: String,
    pub fqn: String,
    pub binding: HandlerBinding,
}

impl ServiceHandler {
    pub(crate) fn new(id: u64, fqn: &str, binding: HandlerBinding) -> Self {
        let name = fqn.rsplit('.').next().unwrap_or(fqn).to_string();
        Self {
            id,
            name,
            fqn: fqn.to_string(),
            binding,
        }
    }
}

/// The untyped half of a streamer: response headers shared with the pump,
/// and the send side of the value channel.
pub(crate) struct StreamPipe {
    pub(crate) headers: Arc<RwLock<Header>>,
    pub(crate) tx: mpsc::Sender<YarpValue>,
}

/// A server-side aggregate allowing a streaming handler to emit a
/// sequence of response values.
///
/// Headers set before the first [`push`](Streamer::push) are flushed with
/// the response frame; later changes are not observed by the peer.
pub struct Streamer<T: IntoValue> {
    headers: Arc<RwLock<Header>>,
    tx: mpsc::Sender<YarpValue>,
    _marker: PhantomData<fn(T)>,
}

impl<T: IntoValue> Streamer<T> {
    fn from_pipe(pipe: StreamPipe) -> Self {
        Self {
            headers: pipe.headers,
            tx: pipe.tx,
            _marker: PhantomData,
        }
    }

    /// Sets a response header.
    pub fn set_header(&self, key: impl AsRef<str>, value: impl Into<String>) {
        self.headers.write().unwrap().set(key, value);
    }

    /// Reads back a response header.
    pub fn header(&self, key: impl AsRef<str>) -> String {
        self.headers.read().unwrap().get(key).to_string()
    }

    /// Sends one response value. Fails when the value cannot be encoded
    /// or the connection is gone.
    pub async fn push(&self, value: T) -> Result<(), RpcError> {
        let value = value
            .to_value()
            .map_err(|_| RpcError::new(ErrorKind::InternalError))?;
        self.tx
            .send(value)
            .await
            .map_err(|_| RpcError::new(ErrorKind::InternalError))
    }
}

/// Wraps a typed unary handler. `In` and `Out` may be `()` for the void
/// shapes; a body that does not convert to `In` is a type mismatch.
pub(crate) fn unary_binding<In, Out, F, Fut>(f: F) -> HandlerBinding
where
    In: FromValue + Send + 'static,
    Out: IntoValue + Send + 'static,
    F: Fn(Context, Header, In) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(Header, Out), RpcError>> + Send + 'static,
{
    HandlerBinding::Unary(Box::new(move |ctx, headers, value| {
        let fut = In::from_value(&value).map(|input| f(ctx, headers, input));
        Box::pin(async move {
            let Some(fut) = fut else {
                return Err(RpcError::new(ErrorKind::TypeMismatch));
            };
            let (headers, out) = fut.await?;
            let value = out
                .to_value()
                .map_err(|_| RpcError::new(ErrorKind::InternalError))?;
            Ok((headers, value))
        })
    }))
}

/// Wraps a typed streaming handler.
pub(crate) fn streaming_binding<In, Out, F, Fut>(f: F) -> HandlerBinding
where
    In: FromValue + Send + 'static,
    Out: IntoValue + Send + 'static,
    F: Fn(Context, Header, In, Streamer<Out>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), RpcError>> + Send + 'static,
{
    HandlerBinding::Streaming(Box::new(move |ctx, headers, value, pipe| {
        let fut =
            In::from_value(&value).map(|input| f(ctx, headers, input, Streamer::from_pipe(pipe)));
        Box::pin(async move {
            match fut {
                Some(fut) => fut.await,
                None => Err(RpcError::new(ErrorKind::TypeMismatch)),
            }
        })
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke_unary(
        binding: &HandlerBinding,
        value: YarpValue,
    ) -> HandlerFuture<Result<(Header, YarpValue), RpcError>> {
        match binding {
            HandlerBinding::Unary(f) => f(Context::background(), Header::new(), value),
            HandlerBinding::Streaming(_) => panic!("expected unary binding"),
        }
    }

    #[tokio::test]
    async fn unary_binds_typed_input_and_output() {
        let binding = unary_binding(|_ctx, headers: Header, input: u64| async move {
            Ok((headers, input * 2))
        });
        let (_, out) = invoke_unary(&binding, YarpValue::uint(21)).await.unwrap();
        assert_eq!(out, YarpValue::uint(42));
    }

    #[tokio::test]
    async fn unary_rejects_mismatched_input() {
        let binding =
            unary_binding(|_ctx, headers: Header, _input: String| async move { Ok((headers, ())) });
        let err = invoke_unary(&binding, YarpValue::uint(1)).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[tokio::test]
    async fn void_shapes_accept_anything() {
        let binding =
            unary_binding(|_ctx, headers: Header, _input: ()| async move { Ok((headers, ())) });
        let (_, out) = invoke_unary(&binding, YarpValue::String("ignored".into()))
            .await
            .unwrap();
        assert_eq!(out, YarpValue::Void);
    }

    #[tokio::test]
    async fn streaming_pushes_through_the_pipe() {
        let binding = streaming_binding(
            |_ctx, _headers: Header, input: u64, out: Streamer<u64>| async move {
                out.set_header("Test", "OK");
                for i in 0..input {
                    out.push(i).await?;
                }
                Ok(())
            },
        );

        let (tx, mut rx) = mpsc::channel(STREAM_BUFFER);
        let headers = Arc::new(RwLock::new(Header::new()));
        let pipe = StreamPipe {
            headers: headers.clone(),
            tx,
        };
        let fut = match &binding {
            HandlerBinding::Streaming(f) => {
                f(Context::background(), Header::new(), YarpValue::uint(3), pipe)
            }
            HandlerBinding::Unary(_) => panic!("expected streaming binding"),
        };
        fut.await.unwrap();

        let mut got = Vec::new();
        while let Some(v) = rx.recv().await {
            got.push(v);
        }
        assert_eq!(
            got,
            vec![YarpValue::uint(0), YarpValue::uint(1), YarpValue::uint(2)]
        );
        assert_eq!(headers.read().unwrap().get("Test"), "OK");
    }

    #[test]
    fn short_name_is_last_segment() {
        let handler = ServiceHandler::new(
            3,
            "io.yarpr.SimpleService.RegisterUser",
            unary_binding(|_ctx, h: Header, _: ()| async move { Ok((h, ())) }),
        );
        assert_eq!(handler.name, "RegisterUser");
        assert_eq!(handler.fqn, "io.yarpr.SimpleService.RegisterUser");
        assert_eq!(handler.id, 3);
    }
}
