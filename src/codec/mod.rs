//! YARP binary encoding and decoding.
//!
//! Every encoded value begins with a leading byte whose top three bits
//! select the primary type; the remaining bits carry a varint head payload,
//! scalar sign and float width flags, or a container body size. Container
//! bodies are size-prefixed and decoded within exact windows.

pub mod array;
pub mod decode;
pub mod encode;
pub mod float;
pub mod map;
pub mod oneof;
pub mod string;
pub mod structs;
pub mod varint;

pub use decode::decode_value;
pub use encode::encode_value;
pub use structs::{struct_from_value, struct_to_value};

/// Ceiling on any declared body size. Chosen to detect faulty or malicious
/// messages before buffering them.
pub(crate) const SIZE_LIMIT: u64 = 2_000_000_000;
