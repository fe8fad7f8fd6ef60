//! The dynamically typed value tree produced by the decoder.

use std::fmt;

/// The primary types present in a YARP stream, selected by the top three
/// bits of a value's leading byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryType {
    /// An unknown or corrupt type.
    Invalid,
    /// A void (empty) value.
    Void,
    /// Signed and unsigned integers, along with booleans.
    Scalar,
    /// 32 and 64-bit float values.
    Float,
    /// A list of a single type.
    Array,
    /// A user-defined structure.
    Struct,
    /// A UTF-8 character array.
    String,
    /// An associative array between two types.
    Map,
    /// A field containing one of several possible types.
    OneOf,
}

impl PrimaryType {
    /// Determines the primary type declared by a leading byte.
    pub fn detect(b: u8) -> PrimaryType {
        match b >> 5 {
            0x0 => Self::Void,
            0x1 => Self::Scalar,
            0x2 => Self::Float,
            0x3 => Self::Array,
            0x4 => Self::Struct,
            0x5 => Self::String,
            0x6 => Self::Map,
            0x7 => Self::OneOf,
            _ => Self::Invalid,
        }
    }
}

impl fmt::Display for PrimaryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Invalid => "Invalid",
            Self::Void => "Void",
            Self::Scalar => "Scalar",
            Self::Float => "Float",
            Self::Array => "Array",
            Self::Struct => "Struct",
            Self::String => "String",
            Self::Map => "Map",
            Self::OneOf => "OneOf",
        };
        f.write_str(name)
    }
}

/// A decoded YARP value.
///
/// Values are self-describing on the wire, so the decoder produces this
/// tagged union; binding to concrete struct types is a separate pass
/// driven by registry metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum YarpValue {
    Void,
    /// A 64-bit magnitude plus a signedness flag. Booleans are a
    /// degenerate scalar: `true` is signed zero, `false` unsigned zero.
    Scalar { signed: bool, value: u64 },
    Float32(f32),
    Float64(f64),
    String(String),
    Array(Vec<YarpValue>),
    Map(MapValue),
    /// `None` denotes "no variant present".
    OneOf(Option<OneOfValue>),
    Struct(RawStruct),
}

/// A map that has not been transformed into a typed map. For each
/// `keys[n]`, the associated value is `values[n]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapValue {
    pub keys: Vec<YarpValue>,
    pub values: Vec<YarpValue>,
}

/// A oneof value that has not been applied to a struct field: the variant
/// index that should be set, and the value to apply to it.
#[derive(Debug, Clone, PartialEq)]
pub struct OneOfValue {
    pub index: u64,
    pub data: Box<YarpValue>,
}

/// A decoded structure that has not been bound to a concrete type: the
/// 64-bit type id and the positional field values with their declared
/// primary types.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStruct {
    pub id: u64,
    pub fields: Vec<(PrimaryType, YarpValue)>,
}

impl YarpValue {
    /// The primary type this value encodes as.
    pub fn primary_type(&self) -> PrimaryType {
        match self {
            Self::Void => PrimaryType::Void,
            Self::Scalar { .. } => PrimaryType::Scalar,
            Self::Float32(_) | Self::Float64(_) => PrimaryType::Float,
            Self::String(_) => PrimaryType::String,
            Self::Array(_) => PrimaryType::Array,
            Self::Map(_) => PrimaryType::Map,
            Self::OneOf(_) => PrimaryType::OneOf,
            Self::Struct(_) => PrimaryType::Struct,
        }
    }

    /// Shorthand for an unsigned scalar.
    pub fn uint(value: u64) -> Self {
        Self::Scalar {
            signed: false,
            value,
        }
    }

    /// Shorthand for a signed scalar (two's-complement magnitude).
    pub fn int(value: i64) -> Self {
        Self::Scalar {
            signed: true,
            value: value as u64,
        }
    }

    /// Shorthand for a boolean (signed means `true`).
    pub fn bool(value: bool) -> Self {
        Self::Scalar {
            signed: value,
            value: 0,
        }
    }

    /// Returns the value as a string reference, if it is a `String`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the scalar magnitude, if this is a `Scalar`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Scalar { value, .. } => Some(*value),
            _ => None,
        }
    }
}

impl fmt::Display for YarpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Void => write!(f, "void"),
            Self::Scalar { signed: true, value } => write!(f, "{}", *value as i64),
            Self::Scalar {
                signed: false,
                value,
            } => write!(f, "{value}"),
            Self::Float32(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "\"{s}\""),
            Self::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Map(m) => {
                write!(f, "{{")?;
                for (i, (k, v)) in m.keys.iter().zip(m.values.iter()).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
            Self::OneOf(None) => write!(f, "oneof(-)"),
            Self::OneOf(Some(oo)) => write!(f, "oneof({}: {})", oo.index, oo.data),
            Self::Struct(s) => write!(f, "struct(0x{:X}, {} fields)", s.id, s.fields.len()),
        }
    }
}
