//! Process-wide struct registry.
//!
//! Decoded struct values carry a 64-bit type id; the registry maps ids to
//! concrete types so self-describing streams can be materialized without
//! static knowledge of their content. Registration validates each type's
//! field plan and is expected to complete before the first decode;
//! concurrent modification during decoding is not supported.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{LazyLock, RwLock};

use crate::codec::structs::bind_raw;
use crate::error::YarpError;
use crate::structure::{FieldPlan, StructValuer};
use crate::types::RawStruct;

/// A materialized struct of a type known only at runtime. Downcast with
/// [`AnyStruct::as_any`] / [`AnyStruct::into_any`].
pub trait AnyStruct: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn wire_id(&self) -> u64;
    fn struct_name(&self) -> &'static str;
}

impl<T: StructValuer> AnyStruct for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
    fn wire_id(&self) -> u64 {
        <T as StructValuer>::yarp_id()
    }
    fn struct_name(&self) -> &'static str {
        <T as StructValuer>::yarp_struct_name()
    }
}

struct RegisteredStruct {
    package: &'static str,
    name: &'static str,
    materialize: fn(&RawStruct) -> Result<Box<dyn AnyStruct>, YarpError>,
}

static REGISTRY: LazyLock<RwLock<HashMap<u64, RegisteredStruct>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Validates a struct type's field plan and registers it for decoding.
pub fn try_register_struct_type<T: StructValuer>() -> Result<(), YarpError> {
    FieldPlan::parse(T::field_tags())?;
    REGISTRY.write().unwrap().insert(
        T::yarp_id(),
        RegisteredStruct {
            package: T::yarp_package(),
            name: T::yarp_struct_name(),
            materialize: materialize_as::<T>,
        },
    );
    Ok(())
}

/// Like [`try_register_struct_type`], but panics on a malformed field
/// plan. Intended for generated registration code running at startup.
pub fn register_struct_type<T: StructValuer>() {
    if let Err(e) = try_register_struct_type::<T>() {
        panic!("yarpr: cannot register {}: {e}", T::yarp_struct_name());
    }
}

/// Whether a type id is known to the registry.
pub fn contains(id: u64) -> bool {
    REGISTRY.read().unwrap().contains_key(&id)
}

/// The qualified `package.Name` of a registered type, if known.
pub fn qualified_name(id: u64) -> Option<String> {
    REGISTRY
        .read()
        .unwrap()
        .get(&id)
        .map(|r| format!("{}.{}", r.package, r.name))
}

/// Materializes a raw struct into its registered concrete type. Returns
/// [`YarpError::UnknownStructType`] when the id is not registered; the raw
/// value remains available to the caller for inspection.
pub fn materialize(raw: &RawStruct) -> Result<Box<dyn AnyStruct>, YarpError> {
    let registry = REGISTRY.read().unwrap();
    let entry = registry.get(&raw.id).ok_or(YarpError::UnknownStructType)?;
    (entry.materialize)(raw)
}

fn materialize_as<T: StructValuer>(raw: &RawStruct) -> Result<Box<dyn AnyStruct>, YarpError> {
    bind_raw::<T>(raw).map(|v| Box::new(v) as Box<dyn AnyStruct>)
}

/// Empties the registry. Test support only; production registries are
/// append-only over a program's lifetime.
#[cfg(test)]
pub(crate) fn reset() {
    REGISTRY.write().unwrap().clear();
}

/// Serializes tests that touch the global registry.
#[cfg(test)]
pub(crate) fn test_guard() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
    LOCK.lock().unwrap_or_else(|e| e.into_inner())
}
