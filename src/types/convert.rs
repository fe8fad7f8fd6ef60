//! Conversions between decoded values and concrete Rust types.
//!
//! These traits carry the conversions the struct binder tolerates:
//! numeric widening and narrowing, booleans from the scalar sign flag,
//! `Option` for pointer-shaped fields, element-wise projection of untyped
//! lists, and `MapValue` into typed maps.

use std::collections::HashMap;
use std::hash::Hash;

use crate::error::YarpError;
use crate::types::{Header, MapValue, YarpValue};

/// A type that can be converted into a YARP value for encoding.
pub trait IntoValue {
    fn to_value(&self) -> Result<YarpValue, YarpError>;
}

/// A type that can be produced from a decoded YARP value. Returns `None`
/// when the value's shape does not fit.
pub trait FromValue: Sized {
    fn from_value(v: &YarpValue) -> Option<Self>;
}

/// Marker for types permitted as map keys: integer widths and strings.
/// Booleans and floats are not permitted.
pub trait MapKey: IntoValue + FromValue {}

macro_rules! unsigned_value {
    ($($t:ty),*) => {$(
        impl IntoValue for $t {
            fn to_value(&self) -> Result<YarpValue, YarpError> {
                Ok(YarpValue::uint(*self as u64))
            }
        }
        impl FromValue for $t {
            fn from_value(v: &YarpValue) -> Option<Self> {
                match v {
                    YarpValue::Scalar { value, .. } => Some(*value as $t),
                    YarpValue::Float32(f) => Some(*f as $t),
                    YarpValue::Float64(f) => Some(*f as $t),
                    _ => None,
                }
            }
        }
        impl MapKey for $t {}
    )*};
}

macro_rules! signed_value {
    ($($t:ty),*) => {$(
        impl IntoValue for $t {
            fn to_value(&self) -> Result<YarpValue, YarpError> {
                Ok(YarpValue::int(*self as i64))
            }
        }
        impl FromValue for $t {
            fn from_value(v: &YarpValue) -> Option<Self> {
                match v {
                    YarpValue::Scalar { value, .. } => Some(*value as $t),
                    YarpValue::Float32(f) => Some(*f as $t),
                    YarpValue::Float64(f) => Some(*f as $t),
                    _ => None,
                }
            }
        }
        impl MapKey for $t {}
    )*};
}

unsigned_value!(u8, u16, u32, u64, usize);
signed_value!(i8, i16, i32, i64, isize);

impl IntoValue for bool {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(YarpValue::bool(*self))
    }
}

impl FromValue for bool {
    /// The sign flag alone decides: a signed scalar is `true`, an unsigned
    /// one `false`, regardless of magnitude.
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::Scalar { signed, .. } => Some(*signed),
            _ => None,
        }
    }
}

impl IntoValue for f32 {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(YarpValue::Float32(*self))
    }
}

impl FromValue for f32 {
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::Float32(f) => Some(*f),
            YarpValue::Float64(f) => Some(*f as f32),
            YarpValue::Scalar {
                signed: true,
                value,
            } => Some(*value as i64 as f32),
            YarpValue::Scalar { value, .. } => Some(*value as f32),
            _ => None,
        }
    }
}

impl IntoValue for f64 {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(YarpValue::Float64(*self))
    }
}

impl FromValue for f64 {
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::Float32(f) => Some(f64::from(*f)),
            YarpValue::Float64(f) => Some(*f),
            YarpValue::Scalar {
                signed: true,
                value,
            } => Some(*value as i64 as f64),
            YarpValue::Scalar { value, .. } => Some(*value as f64),
            _ => None,
        }
    }
}

impl IntoValue for String {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(YarpValue::String(self.clone()))
    }
}

impl IntoValue for &str {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(YarpValue::String((*self).to_string()))
    }
}

impl FromValue for String {
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::String(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl MapKey for String {}

impl IntoValue for () {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(YarpValue::Void)
    }
}

impl FromValue for () {
    /// Void handlers ignore whatever value arrived; any input converts.
    fn from_value(_: &YarpValue) -> Option<Self> {
        Some(())
    }
}

impl IntoValue for YarpValue {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        Ok(self.clone())
    }
}

impl FromValue for YarpValue {
    fn from_value(v: &YarpValue) -> Option<Self> {
        Some(v.clone())
    }
}

impl<T: IntoValue> IntoValue for Vec<T> {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        let items = self
            .iter()
            .map(IntoValue::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(YarpValue::Array(items))
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::Array(items) => items.iter().map(T::from_value).collect(),
            _ => None,
        }
    }
}

impl<T: IntoValue> IntoValue for Option<T> {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        match self {
            Some(inner) => inner.to_value(),
            None => Ok(YarpValue::Void),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::Void => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<K: MapKey + Eq + Hash, V: IntoValue> IntoValue for HashMap<K, V> {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        let mut m = MapValue::default();
        for (k, v) in self {
            m.keys.push(k.to_value()?);
            m.values.push(v.to_value()?);
        }
        Ok(YarpValue::Map(m))
    }
}

impl<K: FromValue + Eq + Hash, V: FromValue> FromValue for HashMap<K, V> {
    fn from_value(v: &YarpValue) -> Option<Self> {
        match v {
            YarpValue::Map(m) => {
                let mut out = HashMap::with_capacity(m.keys.len());
                for (k, v) in m.keys.iter().zip(m.values.iter()) {
                    out.insert(K::from_value(k)?, V::from_value(v)?);
                }
                Some(out)
            }
            _ => None,
        }
    }
}

impl IntoValue for Header {
    fn to_value(&self) -> Result<YarpValue, YarpError> {
        self.as_map().to_value()
    }
}

impl FromValue for Header {
    fn from_value(v: &YarpValue) -> Option<Self> {
        HashMap::<String, String>::from_value(v).map(Header::from)
    }
}
