//! The struct capability contract: field plans, the `StructValuer` trait,
//! and the `Structure` slot that collects unbound decoded fields.

use crate::error::YarpError;
use crate::types::{PrimaryType, YarpValue};

/// A field present in a stream but not handled by the known structure
/// type.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownField {
    pub index: usize,
    pub primary_type: PrimaryType,
    pub data: YarpValue,
}

/// The standard slot embedded in every YARP structure. Collects decoded
/// positional values that did not bind to any declared field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Structure {
    pub unknown_fields: Vec<UnknownField>,
}

/// A declarative field annotation: the index tag (`"0"`, or `"6,1"` for
/// variant 1 of the oneof group at outer index 6) and the field name.
#[derive(Debug, Clone, Copy)]
pub struct FieldTag {
    pub tag: &'static str,
    pub name: &'static str,
}

impl FieldTag {
    pub const fn new(tag: &'static str, name: &'static str) -> Self {
        Self { tag, name }
    }
}

/// The value a structure produces for one outer field index during
/// encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A plain field's encoded value.
    Plain(YarpValue),
    /// The selected variant of a oneof group.
    Variant { index: u64, value: YarpValue },
    /// A oneof group with no variant present.
    NoVariant,
}

/// A struct that can be carried in a YARP stream.
///
/// The contract is two capabilities: stable identity (`yarp_id`,
/// `yarp_package`, `yarp_struct_name` plus the declarative field tags) and
/// the embedded [`Structure`] slot reachable through `structure_mut`.
/// `field_values` yields one [`FieldValue`] per declared outer index in
/// ascending order; `set_field`/`set_variant` bind decoded values back,
/// returning `false` when a value does not fit (the decoder then records
/// it as an unknown field). Implementations with `Has<FieldName>`
/// companion booleans set them inside `set_variant`.
pub trait StructValuer: Default + Send + Sync + 'static {
    fn yarp_id() -> u64;
    fn yarp_package() -> &'static str;
    fn yarp_struct_name() -> &'static str;
    fn field_tags() -> &'static [FieldTag];

    fn field_values(&self) -> Result<Vec<FieldValue>, YarpError>;
    fn set_field(&mut self, index: u32, value: &YarpValue) -> bool;
    fn set_variant(&mut self, index: u32, variant: u64, value: &YarpValue) -> bool;
    fn structure_mut(&mut self) -> &mut Structure;
}

/// One outer field slot of a validated plan.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSlot {
    pub index: u32,
    /// Declared variant indices when this slot is a oneof group.
    pub variants: Option<Vec<u64>>,
}

impl FieldSlot {
    pub fn is_oneof(&self) -> bool {
        self.variants.is_some()
    }
}

/// A validated field plan: one slot per outer index, contiguous from zero.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldPlan {
    slots: Vec<FieldSlot>,
}

impl FieldPlan {
    /// Parses and validates a set of field tags.
    ///
    /// Indices must parse as numbers, be unique per plain field, start at
    /// zero, and be contiguous. Tags with two components join a oneof
    /// group at the first component's index.
    pub fn parse(tags: &[FieldTag]) -> Result<FieldPlan, YarpError> {
        let mut slots: Vec<Option<FieldSlot>> = Vec::new();
        let mut min_index: Option<i64> = None;
        let mut max_index: i64 = -1;

        for tag in tags {
            let (outer_tag, variant_tag) = match tag.tag.split_once(',') {
                Some((outer, variant)) => (outer, Some(variant)),
                None => (tag.tag, None),
            };
            let index: i64 = outer_tag.parse().map_err(|_| YarpError::InvalidTag)?;
            let variant: Option<u64> = match variant_tag {
                Some(v) => Some(v.parse().map_err(|_| YarpError::InvalidTag)?),
                None => None,
            };

            min_index = Some(min_index.map_or(index, |m| m.min(index)));
            max_index = max_index.max(index);
            if index < 0 {
                continue; // caught by the minimum-index check below
            }

            let index = index as usize;
            if slots.len() <= index {
                slots.resize(index + 1, None);
            }
            match (&mut slots[index], variant) {
                (
                    Some(FieldSlot {
                        variants: Some(group),
                        ..
                    }),
                    Some(v),
                ) => group.push(v),
                (Some(_), _) => return Err(YarpError::DuplicatedFieldIndex),
                (empty @ None, variant) => {
                    *empty = Some(FieldSlot {
                        index: index as u32,
                        variants: variant.map(|v| vec![v]),
                    });
                }
            }
        }

        if min_index != Some(0) {
            return Err(YarpError::MinFieldNotZero);
        }
        let mut plan = Vec::with_capacity(max_index as usize + 1);
        for slot in slots {
            plan.push(slot.ok_or(YarpError::FieldGap)?);
        }
        Ok(FieldPlan { slots: plan })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(specs: &'static [(&'static str, &'static str)]) -> Vec<FieldTag> {
        specs.iter().map(|(t, n)| FieldTag::new(t, n)).collect()
    }

    #[test]
    fn simple_plan() {
        let plan =
            FieldPlan::parse(&tags(&[("0", "id"), ("1", "name"), ("2", "email")])).unwrap();
        assert_eq!(plan.len(), 3);
        assert!(!plan.slots()[0].is_oneof());
    }

    #[test]
    fn oneof_group_merges() {
        let plan = FieldPlan::parse(&tags(&[
            ("0", "id"),
            ("1,0", "text"),
            ("1,1", "number"),
            ("1,2", "flag"),
        ]))
        .unwrap();
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.slots()[1].variants, Some(vec![0, 1, 2]));
    }

    #[test]
    fn declaration_order_does_not_matter() {
        let plan = FieldPlan::parse(&tags(&[("1", "b"), ("0", "a")])).unwrap();
        assert_eq!(plan.slots()[0].index, 0);
        assert_eq!(plan.slots()[1].index, 1);
    }

    #[test]
    fn invalid_tag() {
        assert!(matches!(
            FieldPlan::parse(&tags(&[("zero", "a")])),
            Err(YarpError::InvalidTag)
        ));
        assert!(matches!(
            FieldPlan::parse(&tags(&[("0,x", "a")])),
            Err(YarpError::InvalidTag)
        ));
    }

    #[test]
    fn duplicated_index() {
        assert!(matches!(
            FieldPlan::parse(&tags(&[("0", "a"), ("0", "b")])),
            Err(YarpError::DuplicatedFieldIndex)
        ));
        // A plain field clashing with a oneof group is also a duplicate.
        assert!(matches!(
            FieldPlan::parse(&tags(&[("0,0", "a"), ("0", "b")])),
            Err(YarpError::DuplicatedFieldIndex)
        ));
    }

    #[test]
    fn min_field_not_zero() {
        assert!(matches!(
            FieldPlan::parse(&tags(&[("1", "a"), ("2", "b")])),
            Err(YarpError::MinFieldNotZero)
        ));
        // No tagged fields at all fails the same way.
        assert!(matches!(
            FieldPlan::parse(&[]),
            Err(YarpError::MinFieldNotZero)
        ));
    }

    #[test]
    fn field_gap() {
        assert!(matches!(
            FieldPlan::parse(&tags(&[("0", "a"), ("2", "b")])),
            Err(YarpError::FieldGap)
        ));
    }

    #[test]
    fn negative_index_fails_minimum_check() {
        assert!(matches!(
            FieldPlan::parse(&tags(&[("-1", "a"), ("0", "b")])),
            Err(YarpError::MinFieldNotZero)
        ));
    }
}
