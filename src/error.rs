//! Error types for the YARP protocol.

use std::collections::HashMap;
use std::fmt;

use crate::types::Header;

/// Errors that can occur during YARP codec and protocol operations.
#[derive(Debug, thiserror::Error)]
pub enum YarpError {
    /// The stream is corrupt: magic mismatch, truncated varint, or a value
    /// that does not fill its declared window.
    #[error("corrupt stream")]
    CorruptStream,

    /// A declared size reached the 2 GB ceiling, indicating either an
    /// oversized message or a corrupt stream.
    #[error("size is too large")]
    SizeTooLarge,

    /// The leading byte's type tag maps to none of the known types.
    #[error("invalid type in stream")]
    InvalidType,

    /// An operation was attempted against a non-homogeneous array.
    #[error("only homogeneous arrays are supported")]
    NonHomogeneousArray,

    /// A map's keys do not all carry the same primary type.
    #[error("non-homogeneous map key type")]
    NonHomogeneousMapKeys,

    /// A map's values do not all carry the same primary type.
    #[error("non-homogeneous map value type")]
    NonHomogeneousMapValues,

    /// A decoded map's key and value counts differ.
    #[error("uneven map values")]
    UnevenMap,

    /// A structure field tag could not be parsed as an index.
    #[error("invalid index tag")]
    InvalidTag,

    /// A structure declares two fields sharing the same index.
    #[error("duplicated field index")]
    DuplicatedFieldIndex,

    /// A structure's minimum field index is not zero.
    #[error("minimum field index should be zero")]
    MinFieldNotZero,

    /// A structure's field indices contain a gap.
    #[error("structs must have no gaps between field indexes")]
    FieldGap,

    /// A decoded type id is not present in the struct registry.
    #[error("unknown struct type")]
    UnknownStructType,

    /// The server replied with a streamed response to a single-valued
    /// request; client and server are likely out of sync.
    #[error("method requires a streamed response")]
    WantsStreamed,

    /// Returned by the server's start methods when it is shut down.
    #[error("server closed")]
    ServerClosed,

    /// The server returned a response that could not be converted to the
    /// requested type.
    #[error("received incompatible type as response: {received}, wants {wants}")]
    IncompatibleResponse { received: String, wants: String },

    /// A value could not be encoded (unsupported shape or a field plan
    /// that does not match the values produced for it).
    #[error("cannot encode: {0}")]
    Unsupported(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A managed error delivered over the wire.
    #[error(transparent)]
    Remote(#[from] RpcError),
}

/// One of the error kinds carried on the wire, encoded as an unsigned
/// integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorKind {
    /// An internal error prevented the server from performing the
    /// requested operation.
    #[default]
    InternalError,
    /// The server returned a user-defined error; consult the service's
    /// documentation along with the identifier and user data fields.
    ManagedError,
    /// The server timed out waiting for the client to transmit headers.
    RequestTimeout,
    /// The server does not implement the requested method.
    UnimplementedMethod,
    /// Client and server could not agree on a type for a request or
    /// response value.
    TypeMismatch,
    /// The server refused the operation due to lack of authorization.
    Unauthorized,
    /// The server refused the operation due to a problem with the request.
    BadRequest,
    /// A kind this implementation does not recognize; the raw code is
    /// preserved for round-tripping.
    Unrecognized(u64),
}

impl ErrorKind {
    /// The wire code for this kind.
    pub fn code(&self) -> u64 {
        match self {
            Self::InternalError => 0,
            Self::ManagedError => 1,
            Self::RequestTimeout => 2,
            Self::UnimplementedMethod => 3,
            Self::TypeMismatch => 4,
            Self::Unauthorized => 5,
            Self::BadRequest => 6,
            Self::Unrecognized(code) => *code,
        }
    }

    /// Maps a wire code back to an `ErrorKind`.
    pub fn from_code(code: u64) -> Self {
        match code {
            0 => Self::InternalError,
            1 => Self::ManagedError,
            2 => Self::RequestTimeout,
            3 => Self::UnimplementedMethod,
            4 => Self::TypeMismatch,
            5 => Self::Unauthorized,
            6 => Self::BadRequest,
            other => Self::Unrecognized(other),
        }
    }

    fn description(&self) -> &'static str {
        match self {
            Self::InternalError => "Internal Error",
            Self::ManagedError => "Managed Error",
            Self::RequestTimeout => "Request Timeout",
            Self::UnimplementedMethod => "Unimplemented Method",
            Self::TypeMismatch => "Type Mismatch",
            Self::Unauthorized => "Unauthorized",
            Self::BadRequest => "Bad Request",
            Self::Unrecognized(_) => "Invalid?",
        }
    }
}

/// A managed error from the server or an underlying component.
///
/// Carries a [`ErrorKind`], an optional set of headers, an optional
/// identifier provided by the service implementation, and an optional list
/// of user-data key-values with diagnostic detail. Handlers return
/// `RpcError` values; the server serializes them into error frames, and
/// clients surface them as [`YarpError::Remote`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RpcError {
    pub kind: ErrorKind,
    pub headers: Header,
    pub identifier: String,
    pub user_data: HashMap<String, String>,
}

impl RpcError {
    /// Creates an error of the given kind with empty payload.
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    /// Creates a managed error with an identifier.
    pub fn managed(identifier: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::ManagedError,
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Attaches a user-data key-value pair.
    pub fn with_user_data(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_data.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "yarp/Error: Code {} ({})",
            self.kind.code(),
            self.kind.description()
        )?;
        if !self.identifier.is_empty() {
            write!(f, " {}", self.identifier)?;
        }
        if !self.headers.is_empty() || !self.user_data.is_empty() {
            write!(f, " (")?;
            if !self.headers.is_empty() {
                let heads: Vec<String> = self
                    .headers
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                write!(f, "Headers: {}", heads.join(", "))?;
            }
            if !self.user_data.is_empty() {
                let ud: Vec<String> = self
                    .user_data
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                write!(f, "UserData: {}", ud.join(", "))?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for RpcError {}

impl YarpError {
    /// Converts this error into the managed error that should be written
    /// to the peer: managed errors pass through, anything else becomes an
    /// internal error with empty payload.
    pub fn into_rpc_error(self) -> RpcError {
        match self {
            Self::Remote(e) => e,
            _ => RpcError::new(ErrorKind::InternalError),
        }
    }
}
