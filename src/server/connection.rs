//! Per-connection request handling.

use std::sync::{Arc, RwLock};

use futures::FutureExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::codec::encode::encode_to_bytes;
use crate::error::{ErrorKind, RpcError, YarpError};
use crate::registry;
use crate::server::handler::{HandlerBinding, StreamPipe, STREAM_BUFFER};
use crate::server::middleware::{Context, RpcRequest};
use crate::server::state_machine::ConnState;
use crate::server::ServerShared;
use crate::types::{Header, YarpValue};
use crate::wire::{Request, Response, ValueReader};

/// Handles a single connection: one request, one (possibly streamed)
/// response.
pub(crate) struct Connection<R, W> {
    reader: ValueReader<R>,
    writer: W,
    state: ConnState,
    peer: String,
}

impl<R, W> Connection<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub(crate) fn new(reader: R, writer: W, peer: String) -> Self {
        Self {
            reader: ValueReader::new(reader),
            writer,
            state: ConnState::New,
            peer,
        }
    }

    /// Runs the connection lifecycle: headers, middleware, body, dispatch,
    /// response.
    pub(crate) async fn serve(mut self, shared: &ServerShared, ctx: Context) {
        self.state.advance(ConnState::WaitingHeaders);

        // The header-read timer only runs until the peer identifies
        // itself; expiry closes the connection without an error frame.
        let request = tokio::select! {
            _ = tokio::time::sleep(shared.timeout) => {
                tracing::debug!(peer = %self.peer, "timed out waiting for request headers");
                return;
            }
            res = Request::read_from(&mut self.reader) => match res {
                Ok(request) => request,
                Err(e) => {
                    tracing::debug!(peer = %self.peer, error = %e, "failed to read request");
                    return;
                }
            }
        };
        self.state.advance(ConnState::ReceivedHeaders);

        let Some(handler) = shared.handlers.get(&request.method) else {
            tracing::debug!(peer = %self.peer, method = request.method, "unimplemented method");
            self.handle_error(RpcError::new(ErrorKind::UnimplementedMethod))
                .await;
            return;
        };

        let mut req = RpcRequest::new(
            ctx,
            handler.name.clone(),
            handler.id,
            handler.fqn.clone(),
            request.headers,
        );
        for middleware in &shared.middlewares {
            req = match middleware(req) {
                Ok(req) => req,
                Err(e) => {
                    self.handle_error(e).await;
                    return;
                }
            };
        }

        self.state.advance(ConnState::ReceivingBody);
        let value = match self.reader.read_value().await {
            Ok(value) => value,
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "failed to decode request body");
                self.handle_error(e.into_rpc_error()).await;
                return;
            }
        };
        // Struct bodies must resolve to a registered type.
        if let YarpValue::Struct(raw) = &value {
            if !registry::contains(raw.id) {
                tracing::debug!(peer = %self.peer, id = raw.id, "unknown struct type in body");
                self.handle_error(YarpError::UnknownStructType.into_rpc_error())
                    .await;
                return;
            }
        }
        self.state.advance(ConnState::ReceivedBody);

        let ctx = req.context().clone();
        let headers = req.headers.clone();
        tracing::debug!(peer = %self.peer, method = %handler.fqn, "dispatching request");
        match &handler.binding {
            HandlerBinding::Unary(f) => self.apply_unary(f(ctx, headers, value)).await,
            HandlerBinding::Streaming(f) => {
                let (tx, rx) = mpsc::channel(STREAM_BUFFER);
                let stream_headers = Arc::new(RwLock::new(req.headers.clone()));
                let pipe = StreamPipe {
                    headers: stream_headers.clone(),
                    tx,
                };
                let fut = f(ctx, headers, value, pipe);
                self.apply_streaming(fut, rx, stream_headers).await;
            }
        }
    }

    async fn apply_unary(
        &mut self,
        fut: crate::server::handler::HandlerFuture<Result<(Header, YarpValue), RpcError>>,
    ) {
        let outcome = std::panic::AssertUnwindSafe(fut).catch_unwind().await;
        let (headers, value) = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                self.handle_error(e).await;
                return;
            }
            Err(_) => {
                tracing::warn!(peer = %self.peer, "handler panicked");
                self.handle_error(RpcError::new(ErrorKind::InternalError))
                    .await;
                return;
            }
        };

        let data = match encode_to_bytes(&value) {
            Ok(data) => data,
            Err(e) => {
                tracing::debug!(peer = %self.peer, error = %e, "failed to encode response value");
                self.handle_error(e.into_rpc_error()).await;
                return;
            }
        };
        if let Err(e) = self.write_response_header(&headers, false).await {
            tracing::debug!(peer = %self.peer, error = %e, "failed to write response");
            return;
        }
        if let Err(e) = self.write_all(&data).await {
            tracing::debug!(peer = %self.peer, error = %e, "failed to write response value");
            return;
        }
        self.state.advance(ConnState::WroteResponse);
    }

    async fn apply_streaming(
        &mut self,
        fut: crate::server::handler::HandlerFuture<Result<(), RpcError>>,
        rx: mpsc::Receiver<YarpValue>,
        headers: Arc<RwLock<Header>>,
    ) {
        let fut = std::panic::AssertUnwindSafe(fut).catch_unwind();
        // The handler completing drops its streamer, which closes the
        // channel and drains the pump.
        let (handler_result, pump_result) = tokio::join!(
            fut,
            run_pump(&mut self.writer, &mut self.state, rx, headers)
        );

        match handler_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.handle_error(e).await;
                return;
            }
            Err(_) => {
                tracing::warn!(peer = %self.peer, "streaming handler panicked");
                self.handle_error(RpcError::new(ErrorKind::InternalError))
                    .await;
                return;
            }
        }
        if let Err(e) = pump_result {
            tracing::debug!(peer = %self.peer, error = %e, "stream write failed");
            self.handle_error(e.into_rpc_error()).await;
            return;
        }
        self.state.advance(ConnState::WroteResponse);
    }

    async fn write_response_header(
        &mut self,
        headers: &Header,
        stream: bool,
    ) -> Result<(), YarpError> {
        let data = Response::new(headers.clone(), stream).encode()?;
        self.write_all(&data).await?;
        self.state.advance(ConnState::WritingResponse);
        Ok(())
    }

    async fn write_all(&mut self, data: &[u8]) -> Result<(), YarpError> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Writes an error frame when the connection is still in a state that
    /// allows one; otherwise the connection just closes.
    async fn handle_error(&mut self, error: RpcError) {
        if !self.state.can_write_error_frame() {
            return;
        }
        let frame = match error.encode_frame() {
            Ok(frame) => frame,
            Err(_) => return,
        };
        if let Err(e) = self.write_all(&frame).await {
            tracing::debug!(peer = %self.peer, error = %e, "failed to write error frame");
        }
    }
}

/// Reads response values from the handler's channel and writes them to
/// the socket. The response frame (with the stream flag set) is flushed
/// together with the first value; after a write error the channel keeps
/// draining so the handler never blocks on a dead connection.
async fn run_pump<W: AsyncWrite + Unpin>(
    writer: &mut W,
    state: &mut ConnState,
    mut rx: mpsc::Receiver<YarpValue>,
    headers: Arc<RwLock<Header>>,
) -> Result<(), YarpError> {
    let mut result = Ok(());
    while let Some(value) = rx.recv().await {
        if result.is_err() {
            continue;
        }
        result = write_stream_value(writer, state, &headers, &value).await;
    }
    result
}

async fn write_stream_value<W: AsyncWrite + Unpin>(
    writer: &mut W,
    state: &mut ConnState,
    headers: &Arc<RwLock<Header>>,
    value: &YarpValue,
) -> Result<(), YarpError> {
    if *state == ConnState::ReceivedBody {
        let snapshot = headers.read().unwrap().clone();
        let frame = Response::new(snapshot, true).encode()?;
        writer.write_all(&frame).await?;
        state.advance(ConnState::WritingResponse);
    }
    let data = encode_to_bytes(value)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}
