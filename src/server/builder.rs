//! Server construction, the accept loop, and graceful shutdown.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::error::{RpcError, YarpError};
use crate::net::Endpoint;
use crate::server::connection::Connection;
use crate::server::handler::{
    streaming_binding, unary_binding, ServiceHandler, Streamer,
};
use crate::server::middleware::{Context, Middleware, RpcRequest};
use crate::types::{FromValue, Header, IntoValue};

/// How long the server waits for a client to transmit request headers
/// before disconnecting it, unless overridden.
pub const DEFAULT_HEADER_TIMEOUT: Duration = Duration::from_secs(15);

/// State the accept loop shares with every connection task.
pub(crate) struct ServerShared {
    pub(crate) timeout: Duration,
    pub(crate) handlers: HashMap<u64, ServiceHandler>,
    pub(crate) middlewares: Vec<Middleware>,
}

/// A YARP server: routes each incoming connection's single request to a
/// registered handler.
///
/// Handlers and middlewares are registered before [`start`](Self::start);
/// the server is then shared behind an `Arc` between the accept loop and
/// whoever calls [`shutdown`](Self::shutdown).
pub struct YarpServer {
    endpoint: Endpoint,
    shared: ServerShared,
    stop: watch::Sender<bool>,
    stopping: AtomicBool,
    connections: Mutex<HashMap<u64, watch::Sender<bool>>>,
    next_connection_id: AtomicU64,
}

impl YarpServer {
    /// Creates a server bound to the given address when started. `bind`
    /// is `host:port`, or `unix://<path>` for a Unix domain socket.
    pub fn new(bind: &str) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            endpoint: Endpoint::parse(bind),
            shared: ServerShared {
                timeout: DEFAULT_HEADER_TIMEOUT,
                handlers: HashMap::new(),
                middlewares: Vec::new(),
            },
            stop,
            stopping: AtomicBool::new(false),
            connections: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(0),
        }
    }

    /// Overrides the header-read timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.shared.timeout = timeout;
        self
    }

    /// Registers a middleware, executed on new requests in registration
    /// order.
    pub fn use_middleware<F>(&mut self, middleware: F)
    where
        F: Fn(RpcRequest) -> Result<RpcRequest, RpcError> + Send + Sync + 'static,
    {
        self.shared.middlewares.push(Box::new(middleware));
    }

    /// Registers a handler for method `id`, named by its qualified name
    /// `fqn`. `In` and `Out` may be `()` for the void request/response
    /// shapes. Not intended to be called directly by users, but rather by
    /// generated service-registration code.
    pub fn handle<In, Out, F, Fut>(&mut self, id: u64, fqn: &str, handler: F)
    where
        In: FromValue + Send + 'static,
        Out: IntoValue + Send + 'static,
        F: Fn(Context, Header, In) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(Header, Out), RpcError>> + Send + 'static,
    {
        self.shared
            .handlers
            .insert(id, ServiceHandler::new(id, fqn, unary_binding(handler)));
    }

    /// Registers a streaming handler for method `id`: the handler pushes
    /// response values through a [`Streamer`] instead of returning one.
    pub fn handle_streaming<In, Out, F, Fut>(&mut self, id: u64, fqn: &str, handler: F)
    where
        In: FromValue + Send + 'static,
        Out: IntoValue + Send + 'static,
        F: Fn(Context, Header, In, Streamer<Out>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), RpcError>> + Send + 'static,
    {
        self.shared
            .handlers
            .insert(id, ServiceHandler::new(id, fqn, streaming_binding(handler)));
    }

    /// Binds a listener for the configured address and runs the accept
    /// loop. Always returns an error: a bind or accept failure, or
    /// [`YarpError::ServerClosed`] after [`shutdown`](Self::shutdown).
    pub async fn start(self: &Arc<Self>) -> Result<(), YarpError> {
        match self.endpoint.clone() {
            Endpoint::Tcp(addr) => {
                let listener = TcpListener::bind(&addr).await?;
                self.start_listener(listener).await
            }
            #[cfg(unix)]
            Endpoint::Unix(path) => {
                let listener = tokio::net::UnixListener::bind(&path)?;
                tracing::info!(path = %path, "server listening");
                let mut stop = self.stop.subscribe();
                if *stop.borrow() {
                    return Err(YarpError::ServerClosed);
                }
                let mut backoff = Backoff::default();
                loop {
                    tokio::select! {
                        _ = stop.changed() => return Err(YarpError::ServerClosed),
                        accepted = listener.accept() => match accepted {
                            Ok((stream, _)) => {
                                backoff.reset();
                                self.spawn_connection(stream, path.clone());
                            }
                            Err(e) => backoff.sleep(&e).await,
                        }
                    }
                }
            }
            #[cfg(not(unix))]
            Endpoint::Unix(path) => Err(YarpError::Unsupported(format!(
                "unix domain sockets are not available on this platform: {path}"
            ))),
        }
    }

    /// Runs the accept loop on an existing TCP listener.
    pub async fn start_listener(self: &Arc<Self>, listener: TcpListener) -> Result<(), YarpError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "server listening");
        }
        let mut stop = self.stop.subscribe();
        if *stop.borrow() {
            return Err(YarpError::ServerClosed);
        }
        let mut backoff = Backoff::default();
        loop {
            tokio::select! {
                _ = stop.changed() => return Err(YarpError::ServerClosed),
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        backoff.reset();
                        self.spawn_connection(stream, peer.to_string());
                    }
                    Err(e) => backoff.sleep(&e).await,
                }
            }
        }
    }

    fn spawn_connection<S>(self: &Arc<Self>, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (cancel, mut cancelled) = watch::channel(false);
        self.connections.lock().unwrap().insert(id, cancel);

        let server = self.clone();
        let ctx = Context::with_cancel(self.stop.subscribe());
        tokio::spawn(async move {
            let (reader, writer) = tokio::io::split(stream);
            let connection = Connection::new(reader, writer, peer.clone());
            tokio::select! {
                _ = cancelled.changed() => {
                    tracing::debug!(%peer, "connection force-closed");
                }
                () = connection.serve(&server.shared, ctx) => {}
            }
            tracing::debug!(%peer, "connection closed");
            server.connections.lock().unwrap().remove(&id);
        });
    }

    /// The number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().unwrap().len()
    }

    /// Stops accepting new connections and waits for current clients to
    /// disconnect, polling the live set once per second. If `ctx` is
    /// cancelled first, remaining connections are forcefully closed.
    /// Calling `shutdown` more than once is a no-op.
    pub async fn shutdown(&self, ctx: Context) {
        if self.stopping.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.stop.send(true);

        let mut poll = tokio::time::interval(Duration::from_secs(1));
        poll.tick().await; // the first tick completes immediately
        loop {
            tokio::select! {
                () = ctx.cancelled() => {
                    self.force_shutdown();
                    return;
                }
                _ = poll.tick() => {
                    if self.connections.lock().unwrap().is_empty() {
                        return;
                    }
                }
            }
        }
    }

    fn force_shutdown(&self) {
        let connections = self.connections.lock().unwrap();
        tracing::info!(remaining = connections.len(), "force-closing connections");
        for cancel in connections.values() {
            let _ = cancel.send(true);
        }
    }
}

/// Exponential back-off for transient accept errors.
struct Backoff {
    delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
        }
    }
}

impl Backoff {
    const FLOOR: Duration = Duration::from_millis(5);
    const CEILING: Duration = Duration::from_secs(1);

    fn reset(&mut self) {
        self.delay = Duration::ZERO;
    }

    fn advance(&mut self) -> Duration {
        self.delay = if self.delay.is_zero() {
            Self::FLOOR
        } else {
            (self.delay * 2).min(Self::CEILING)
        };
        self.delay
    }

    async fn sleep(&mut self, error: &std::io::Error) {
        let delay = self.advance();
        tracing::warn!(%error, ?delay, "accept error; backing off");
        tokio::time::sleep(delay).await;
    }
}
