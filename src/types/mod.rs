//! YARP value types.

pub mod convert;
pub mod header;
pub mod value;

pub use convert::{FromValue, IntoValue, MapKey};
pub use header::Header;
pub use value::{MapValue, OneOfValue, PrimaryType, RawStruct, YarpValue};
