//! YarpR — A pure-Rust YARP wire format and RPC library.
//!
//! YARP is a compact, self-describing binary serialization format paired
//! with a single-request-per-connection RPC protocol. This crate implements
//! both halves: the tagged wire codec and the client/server cores that
//! carry encoded values over TCP or Unix domain sockets.
//!
//! # Architecture
//!
//! - **`codec`** — Binary encoding/decoding (varints, scalars, floats,
//!   strings, arrays, maps, oneofs, structs)
//! - **`types`** — Decoded value tree, headers, typed conversions
//! - **`structure`** — The `StructValuer` capability and field plans
//! - **`registry`** — Process-wide `type id → struct type` registry
//! - **`wire`** — Request/Response/Error framing with magic prefixes
//! - **`server`** — RPC server with handler table, middleware, streaming
//! - **`client`** — Client for issuing single and streamed requests
//!   (feature-gated)

pub mod codec;
pub mod error;
pub mod net;
pub mod registry;
pub mod server;
pub mod structure;
pub mod types;
pub mod wire;

#[cfg(feature = "client")]
pub mod client;

pub use error::{ErrorKind, RpcError, YarpError};
pub use registry::{register_struct_type, try_register_struct_type};
pub use server::{Context, Streamer, YarpServer};
pub use structure::{FieldTag, FieldValue, Structure, StructValuer, UnknownField};
pub use types::{
    FromValue, Header, IntoValue, MapValue, OneOfValue, PrimaryType, RawStruct, YarpValue,
};
pub use wire::{Request, Response};

#[cfg(feature = "client")]
pub use client::YarpClient;
