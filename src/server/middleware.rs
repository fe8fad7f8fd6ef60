//! Request context, the middleware chain, and the per-request view
//! handed to it.

use tokio::sync::watch;

use crate::error::RpcError;
use crate::types::Header;

/// A cancellation-carrying context handed to handlers.
///
/// The server's context is cancelled when it shuts down; handlers should
/// observe it and abort long-running work.
#[derive(Debug, Clone)]
pub struct Context {
    cancel: Option<watch::Receiver<bool>>,
}

impl Context {
    /// A context that is never cancelled.
    pub fn background() -> Self {
        Self { cancel: None }
    }

    pub(crate) fn with_cancel(cancel: watch::Receiver<bool>) -> Self {
        Self {
            cancel: Some(cancel),
        }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. Pending forever on a
    /// background context.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            // A dropped sender counts as cancellation.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// An incoming RPC request as seen by middleware.
///
/// Changing `headers` or attaching a new context affects what the target
/// handler receives; the method fields are informational and pass through
/// to later middlewares unchanged in meaning.
#[derive(Debug, Clone)]
pub struct RpcRequest {
    ctx: Context,
    pub method: String,
    pub identifier: u64,
    pub method_fqn: String,
    pub headers: Header,
}

impl RpcRequest {
    pub(crate) fn new(
        ctx: Context,
        method: String,
        identifier: u64,
        method_fqn: String,
        headers: Header,
    ) -> Self {
        Self {
            ctx,
            method,
            identifier,
            method_fqn,
            headers,
        }
    }

    /// The context for this request.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Returns a copy of this request carrying the given context.
    pub fn with_context(self, ctx: Context) -> Self {
        Self { ctx, ..self }
    }
}

/// A pure transform applied to each request before dispatch, in
/// registration order. Returning an error stops processing and turns into
/// an error frame.
pub type Middleware = Box<dyn Fn(RpcRequest) -> Result<RpcRequest, RpcError> + Send + Sync>;
