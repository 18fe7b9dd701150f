//! Two owned children.

use std::mem;

use tessera_core::{precondition, violation, AllocError, ValueType};

use crate::value::{check_world, Payload, Value};
use crate::world::World;

/// A left and a right child, each owned exclusively by the pair.
///
/// The declared types follow the children: replacing a side refreshes its
/// type.
pub struct Pair<'w> {
    left: Value<'w>,
    right: Value<'w>,
}

impl<'w> Pair<'w> {
    pub(crate) fn new(left: Value<'w>, right: Value<'w>) -> Self {
        Self { left, right }
    }

    pub(crate) fn try_clone(&self) -> Result<Self, AllocError> {
        Ok(Self {
            left: self.left.try_clone()?,
            right: self.right.try_clone()?,
        })
    }

    pub(crate) fn content_hash(&self) -> u64 {
        let world = self.left.world();
        let mut h = world.secret().hasher();
        h.update(&self.left.id_reasonable().to_le_bytes())
            .update(&self.right.id_reasonable().to_le_bytes());
        h.finish()
    }

    pub(crate) fn into_parts(self) -> (Value<'w>, Value<'w>) {
        (self.left, self.right)
    }

    /// The left child.
    pub fn left(&self) -> &Value<'w> {
        &self.left
    }

    /// The right child.
    pub fn right(&self) -> &Value<'w> {
        &self.right
    }

    /// Type of the left child.
    pub fn left_type(&self) -> ValueType {
        self.left.value_type()
    }

    /// Type of the right child.
    pub fn right_type(&self) -> ValueType {
        self.right.value_type()
    }

    /// Replace the left child, handing back the old one.
    pub fn set_left(&mut self, value: Value<'w>) -> Value<'w> {
        check_world(self.left.world(), &value);
        mem::replace(&mut self.left, value)
    }

    /// Replace the right child, handing back the old one.
    pub fn set_right(&mut self, value: Value<'w>) -> Value<'w> {
        check_world(self.right.world(), &value);
        mem::replace(&mut self.right, value)
    }
}

impl<'w> Value<'w> {
    /// A Pair owning `left` and `right`.
    pub fn new_pair(
        world: &'w World,
        left: Value<'w>,
        right: Value<'w>,
    ) -> Result<Self, AllocError> {
        check_world(world, &left);
        check_world(world, &right);
        Self::from_payload(world, Payload::Pair(Pair::new(left, right)))
    }

    /// A Pair copied from another Pair, or from the two items of a
    /// two-element List.
    pub fn new_pair_from(other: &Value<'w>) -> Result<Self, AllocError> {
        let world = other.world();
        match other.value_type() {
            ValueType::Pair => other.try_clone(),
            ValueType::List => {
                let list = other.as_list();
                let size = list.size();
                precondition!(size == 2, "a pair needs a two-element list, got {size}");
                let left = list.get_at(0).try_clone()?;
                let right = list.get_at(1).try_clone()?;
                Self::new_pair(world, left, right)
            }
            found => violation!("cannot build a pair from a {found} value"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use tessera_core::Integer;

    fn world() -> World {
        World::new(&WorldConfig::auto()).unwrap()
    }

    #[test]
    fn children_and_types() {
        let w = world();
        let p = Value::new_pair(
            &w,
            Value::new_str(&w, "k").unwrap(),
            Value::new_integer(&w, Integer::I32(7)).unwrap(),
        )
        .unwrap();
        let pair = p.as_pair();
        assert_eq!(pair.left_type(), ValueType::String);
        assert_eq!(pair.right_type(), ValueType::Integer);
        assert_eq!(pair.left().as_string().to_string(), "k");
        assert_eq!(pair.right().as_integer(), Integer::I32(7));
    }

    #[test]
    fn set_refreshes_type_and_returns_old() {
        let w = world();
        let mut p = Value::new_pair(
            &w,
            Value::new_boolean(&w, true).unwrap(),
            Value::new_boolean(&w, false).unwrap(),
        )
        .unwrap();
        let old = p.as_pair_mut().set_right(Value::new_str(&w, "x").unwrap());
        assert!(!old.as_boolean());
        assert_eq!(p.as_pair().right_type(), ValueType::String);
    }

    #[test]
    fn order_matters_for_structural_id() {
        let w = world();
        let a = || Value::new_integer(&w, Integer::U8(1)).unwrap();
        let b = || Value::new_integer(&w, Integer::U8(2)).unwrap();
        let ab = Value::new_pair(&w, a(), b()).unwrap();
        let ba = Value::new_pair(&w, b(), a()).unwrap();
        let ab2 = Value::new_pair(&w, a(), b()).unwrap();
        assert_ne!(ab.id_reasonable(), ba.id_reasonable());
        assert_eq!(ab.id_reasonable(), ab2.id_reasonable());
    }

    #[test]
    fn new_from_pair_is_deep() {
        let w = world();
        let src = Value::new_pair(
            &w,
            Value::new_str(&w, "a").unwrap(),
            Value::new_str(&w, "b").unwrap(),
        )
        .unwrap();
        let copy = Value::new_pair_from(&src).unwrap();
        assert!(!copy.as_pair().left().is_same(src.as_pair().left()));
        assert_eq!(copy.id_reasonable(), src.id_reasonable());
        drop(copy);
        assert_eq!(src.as_pair().right().as_string().to_string(), "b");
    }

    #[test]
    fn new_from_two_element_list() {
        let w = world();
        let list = Value::new_list(
            &w,
            ValueType::Integer,
            [
                Value::new_integer(&w, Integer::I64(1)).unwrap(),
                Value::new_integer(&w, Integer::I64(2)).unwrap(),
            ],
        )
        .unwrap();
        let p = Value::new_pair_from(&list).unwrap();
        assert_eq!(p.as_pair().left().as_integer(), Integer::I64(1));
        assert_eq!(p.as_pair().right().as_integer(), Integer::I64(2));
    }

    #[test]
    #[should_panic(expected = "cannot build a pair")]
    fn new_from_scalar_is_a_violation() {
        let w = world();
        let v = Value::new_boolean(&w, true).unwrap();
        let _ = Value::new_pair_from(&v);
    }

    #[test]
    #[should_panic(expected = "different world")]
    fn cross_world_child_is_a_violation() {
        let w1 = world();
        let w2 = world();
        let _ = Value::new_pair(
            &w1,
            Value::new_boolean(&w1, true).unwrap(),
            Value::new_boolean(&w2, true).unwrap(),
        );
    }

    #[test]
    #[should_panic(expected = "different world")]
    fn set_left_from_another_world_is_a_violation() {
        let w1 = world();
        let w2 = world();
        let mut p = Value::new_pair(
            &w1,
            Value::new_boolean(&w1, true).unwrap(),
            Value::new_boolean(&w1, false).unwrap(),
        )
        .unwrap();
        p.as_pair_mut().set_left(Value::new_boolean(&w2, true).unwrap());
    }

    #[test]
    #[should_panic(expected = "different world")]
    fn set_right_from_another_world_is_a_violation() {
        let w1 = world();
        let w2 = world();
        let mut p = Value::new_pair(
            &w1,
            Value::new_boolean(&w1, true).unwrap(),
            Value::new_boolean(&w1, false).unwrap(),
        )
        .unwrap();
        p.as_pair_mut().set_right(Value::new_str(&w2, "x").unwrap());
    }
}
