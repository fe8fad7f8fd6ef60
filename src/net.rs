//! Endpoint addressing shared by client and server.

use std::fmt;

/// A parsed bind or dial target: `host:port` for TCP, or a filesystem
/// path given as `unix://<path>` for Unix domain sockets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp(String),
    Unix(String),
}

impl Endpoint {
    /// Parses an address, stripping the `unix://` prefix when present.
    pub fn parse(address: &str) -> Endpoint {
        match address.strip_prefix("unix://") {
            Some(path) => Endpoint::Unix(path.to_string()),
            None => Endpoint::Tcp(address.to_string()),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp(addr) => write!(f, "{addr}"),
            Self::Unix(path) => write!(f, "unix://{path}"),
        }
    }
}
