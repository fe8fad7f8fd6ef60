//! YARP server framework.

pub mod builder;
pub(crate) mod connection;
pub mod handler;
pub mod middleware;
pub mod state_machine;

pub use builder::{YarpServer, DEFAULT_HEADER_TIMEOUT};
pub use handler::Streamer;
pub use middleware::{Context, Middleware, RpcRequest};
pub use state_machine::ConnState;

pub(crate) use builder::ServerShared;
