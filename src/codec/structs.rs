//! Struct codec: a size-prefixed body carrying the 8-byte little-endian
//! type id followed by the fields encoded in ascending index order.
//!
//! Encoding validates the declared field plan on every operation; decoding
//! produces a raw positional value list, and binding to a concrete
//! [`StructValuer`] is a separate pass (driven by the registry when the
//! target type is not known statically).

use bytes::{Buf, BufMut, BytesMut};

use super::decode::{decode_value, read_body};
use super::encode::encode_value;
use super::{varint, SIZE_LIMIT};
use crate::error::YarpError;
use crate::structure::{FieldPlan, FieldValue, Structure, StructValuer, UnknownField};
use crate::types::{OneOfValue, RawStruct, YarpValue};

/// Converts a struct into its raw wire value, validating the field plan
/// and resolving oneof groups to their selected variants.
pub fn struct_to_value<T: StructValuer>(v: &T) -> Result<YarpValue, YarpError> {
    let plan = FieldPlan::parse(T::field_tags())?;
    let values = v.field_values()?;
    if values.len() != plan.len() {
        return Err(YarpError::Unsupported(format!(
            "{} produced {} field values for a plan of {}",
            T::yarp_struct_name(),
            values.len(),
            plan.len()
        )));
    }

    let mut fields = Vec::with_capacity(plan.len());
    for (slot, fv) in plan.slots().iter().zip(values) {
        let value = match (&slot.variants, fv) {
            (None, FieldValue::Plain(value)) => value,
            (Some(variants), FieldValue::Variant { index, value }) => {
                if !variants.contains(&index) {
                    return Err(YarpError::Unsupported(format!(
                        "{} selected undeclared variant {index} at field {}",
                        T::yarp_struct_name(),
                        slot.index
                    )));
                }
                YarpValue::OneOf(Some(OneOfValue {
                    index,
                    data: Box::new(value),
                }))
            }
            (Some(_), FieldValue::NoVariant) => YarpValue::OneOf(None),
            (slot_kind, fv) => {
                return Err(YarpError::Unsupported(format!(
                    "{} field {} produced {:?} for a {} slot",
                    T::yarp_struct_name(),
                    slot.index,
                    fv,
                    if slot_kind.is_some() { "oneof" } else { "plain" }
                )));
            }
        };
        fields.push((value.primary_type(), value));
    }

    Ok(YarpValue::Struct(RawStruct {
        id: T::yarp_id(),
        fields,
    }))
}

/// Encodes a struct directly into the buffer.
pub fn encode_struct<T: StructValuer>(buf: &mut BytesMut, v: &T) -> Result<(), YarpError> {
    encode_value(buf, &struct_to_value(v)?)
}

/// Encodes a raw struct value: fields in order, prefixed with the type id
/// and the outer size.
pub fn encode_raw_struct(buf: &mut BytesMut, raw: &RawStruct) -> Result<(), YarpError> {
    let mut body = BytesMut::new();
    for (_, value) in &raw.fields {
        encode_value(&mut body, value)?;
    }
    if body.len() as u64 + 8 >= SIZE_LIMIT {
        return Err(YarpError::SizeTooLarge);
    }
    let head = varint::encode_integer(buf, body.len() as u64 + 8);
    buf[head] |= 0x80;
    buf.put_u64_le(raw.id);
    buf.put_slice(&body);
    Ok(())
}

/// Decodes a struct given its leading byte into its raw form: the type id
/// and the positional values with their primary types.
pub fn decode_struct(head: u8, buf: &mut impl Buf) -> Result<RawStruct, YarpError> {
    let body = read_body(head, buf)?;
    let mut window = &body[..];
    if window.remaining() < 8 {
        return Err(YarpError::CorruptStream);
    }
    let id = window.get_u64_le();
    let mut fields = Vec::new();
    while window.has_remaining() {
        let value = decode_value(&mut window)?;
        fields.push((value.primary_type(), value));
    }
    Ok(RawStruct { id, fields })
}

/// Binds a raw struct's positional values to a concrete type.
///
/// Positions the type declares are offered to `set_field`/`set_variant`;
/// refused positions and positions beyond the declared plan are collected
/// into the `Structure` slot with their original primary type and data.
pub fn bind_raw<T: StructValuer>(raw: &RawStruct) -> Result<T, YarpError> {
    let plan = FieldPlan::parse(T::field_tags())?;
    let mut out = T::default();
    let mut unknown = Vec::new();

    for (i, (primary_type, value)) in raw.fields.iter().enumerate() {
        if i < plan.len() {
            let slot = &plan.slots()[i];
            if let Some(variants) = &slot.variants {
                if let YarpValue::OneOf(oo) = value {
                    match oo {
                        // No variant present; nothing to set.
                        None => continue,
                        Some(oo)
                            if variants.contains(&oo.index)
                                && out.set_variant(i as u32, oo.index, &oo.data) =>
                        {
                            continue;
                        }
                        Some(_) => {}
                    }
                }
            } else if out.set_field(i as u32, value) {
                continue;
            }
        }
        unknown.push(UnknownField {
            index: i,
            primary_type: *primary_type,
            data: value.clone(),
        });
    }

    *out.structure_mut() = Structure {
        unknown_fields: unknown,
    };
    Ok(out)
}

/// Converts a decoded value into a concrete struct type, checking the
/// carried type id against the target's.
pub fn struct_from_value<T: StructValuer>(v: &YarpValue) -> Result<T, YarpError> {
    let YarpValue::Struct(raw) = v else {
        return Err(YarpError::IncompatibleResponse {
            received: v.primary_type().to_string(),
            wants: T::yarp_struct_name().to_string(),
        });
    };
    if raw.id != T::yarp_id() {
        return Err(YarpError::IncompatibleResponse {
            received: format!("struct 0x{:X}", raw.id),
            wants: T::yarp_struct_name().to_string(),
        });
    }
    bind_raw(raw)
}
