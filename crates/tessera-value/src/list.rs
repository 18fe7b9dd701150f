//! Homogeneous sequences of owned children.

use std::mem;
use std::slice;

use smallvec::SmallVec;
use tessera_core::{precondition, AllocError, ValueType};

use crate::raw::{RawBuf, Removed};
use crate::value::{check_world, Payload, Value};
use crate::world::World;

/// An ordered sequence of owned values sharing a declared item type.
///
/// Every item's type equals `item_type()`, unless that is
/// [`ValueType::Any`].
pub struct List<'w> {
    item_type: ValueType,
    items: RawBuf<'w, Value<'w>>,
}

/// The one type shared by every entry of `types`, or `Any`.
pub(crate) fn common_type(types: impl IntoIterator<Item = ValueType>) -> ValueType {
    let mut types = types.into_iter();
    let Some(first) = types.next() else {
        return ValueType::Any;
    };
    if types.all(|t| t == first) {
        first
    } else {
        ValueType::Any
    }
}

impl<'w> List<'w> {
    pub(crate) fn new(world: &'w World, item_type: ValueType) -> Self {
        Self {
            item_type,
            items: RawBuf::new(world),
        }
    }

    pub(crate) fn try_clone(&self) -> Result<Self, AllocError> {
        let mut items = RawBuf::with_capacity(self.items.world(), self.size())?;
        for item in self.iter() {
            items.push(item.try_clone()?)?;
        }
        Ok(Self {
            item_type: self.item_type,
            items,
        })
    }

    pub(crate) fn content_hash(&self) -> u64 {
        let mut h = self.items.world().secret().hasher();
        h.update(&[self.item_type.tag()]);
        for item in self.iter() {
            h.update(&item.id_reasonable().to_le_bytes());
        }
        h.finish()
    }

    pub(crate) fn world(&self) -> &'w World {
        self.items.world()
    }

    fn check_item(&self, item: &Value<'_>) {
        check_world(self.items.world(), item);
        let actual = item.value_type();
        precondition!(
            self.item_type.admits(actual),
            "list of {} cannot hold a {actual} value",
            self.item_type
        );
    }

    /// Declared item type.
    pub fn item_type(&self) -> ValueType {
        self.item_type
    }

    /// Number of items.
    pub fn size(&self) -> usize {
        self.items.len()
    }

    /// Allocated item slots.
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }

    /// Whether the list has no items.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The items as a slice.
    pub fn storage(&self) -> &[Value<'w>] {
        self.items.as_slice()
    }

    /// Pointer one past the last item.
    pub fn storage_end(&self) -> *const Value<'w> {
        self.items.as_ptr().wrapping_add(self.size())
    }

    /// Iterate over the items in order.
    pub fn iter(&self) -> slice::Iter<'_, Value<'w>> {
        self.storage().iter()
    }

    /// The item at `index`.
    pub fn get_at(&self, index: usize) -> &Value<'w> {
        let size = self.size();
        precondition!(index < size, "index {index} out of range for size {size}");
        &self.storage()[index]
    }

    /// Replace the item at `index`, handing back the old one.
    pub fn set_at(&mut self, index: usize, value: Value<'w>) -> Value<'w> {
        let size = self.size();
        precondition!(index < size, "index {index} out of range for size {size}");
        self.check_item(&value);
        mem::replace(&mut self.items.as_mut_slice()[index], value)
    }

    /// The first item of a non-empty list.
    pub fn first(&self) -> &Value<'w> {
        precondition!(!self.is_empty(), "first() of an empty list");
        &self.storage()[0]
    }

    /// The last item of a non-empty list.
    pub fn last(&self) -> &Value<'w> {
        precondition!(!self.is_empty(), "last() of an empty list");
        &self.storage()[self.size() - 1]
    }

    /// Position of `item` by object identity.
    pub fn index_of(&self, item: &Value<'_>) -> Option<usize> {
        self.iter().position(|v| v.is_same(item))
    }

    /// Grow the capacity to at least `capacity` slots.
    pub fn grow(&mut self, capacity: usize) -> Result<(), AllocError> {
        if capacity <= self.capacity() {
            return Ok(());
        }
        self.items.set_capacity(capacity)
    }

    /// Shrink the capacity to `capacity` slots, freeing any items past it.
    /// Zero releases the storage.
    pub fn shrink(&mut self, capacity: usize) -> Result<(), AllocError> {
        if capacity >= self.capacity() {
            return Ok(());
        }
        self.items.truncate(capacity);
        self.items.set_capacity(capacity)
    }

    /// Shrink the capacity to `size()`.
    pub fn fit(&mut self) -> Result<(), AllocError> {
        let size = self.size();
        self.items.set_capacity(size)
    }

    /// Free every item. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.items.truncate(0);
    }

    /// Insert `items` before the item at `index`.
    pub fn insert_at<I>(&mut self, index: usize, items: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = Value<'w>>,
    {
        let size = self.size();
        precondition!(index <= size, "insert index {index} out of range for size {size}");
        let items: SmallVec<[Value<'w>; 8]> = items.into_iter().collect();
        for item in &items {
            self.check_item(item);
        }
        self.items.insert_many(index, items)
    }

    /// Move `n` items starting at `index` out to the caller.
    pub fn remove_at(&mut self, index: usize, n: usize) -> Removed<Value<'w>> {
        self.items.remove_range(index, n)
    }

    /// Append `items`.
    pub fn push_back<I>(&mut self, items: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = Value<'w>>,
    {
        let size = self.size();
        self.insert_at(size, items)
    }

    /// Prepend `items`, keeping their order.
    pub fn push_front<I>(&mut self, items: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = Value<'w>>,
    {
        self.insert_at(0, items)
    }

    /// Move the last `n` items out, in list order.
    pub fn pop_back(&mut self, n: usize) -> Removed<Value<'w>> {
        let size = self.size();
        precondition!(n <= size, "cannot pop {n} items from size {size}");
        self.remove_at(size - n, n)
    }

    /// Move the first `n` items out, in list order.
    pub fn pop_front(&mut self, n: usize) -> Removed<Value<'w>> {
        self.remove_at(0, n)
    }

    /// Swap the items at `i` and `j`.
    pub fn swap(&mut self, i: usize, j: usize) {
        self.items.swap(i, j);
    }
}

impl<'a, 'w> IntoIterator for &'a List<'w> {
    type Item = &'a Value<'w>;
    type IntoIter = slice::Iter<'a, Value<'w>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'w> Value<'w> {
    /// A List of `item_type` holding `items`.
    pub fn new_list<I>(world: &'w World, item_type: ValueType, items: I) -> Result<Self, AllocError>
    where
        I: IntoIterator<Item = Value<'w>>,
    {
        let mut list = List::new(world, item_type);
        list.push_back(items)?;
        Self::from_payload(world, Payload::List(list))
    }

    /// A List built from any value:
    ///
    /// - a scalar gives a one-element list of a copy;
    /// - a String gives a list of one-unit Strings;
    /// - a Pair gives copies of its two sides, typed by their common type;
    /// - a List gives a deep copy;
    /// - a Dictionary gives copies of its `(key, value)` Pairs in insertion
    ///   order.
    pub fn new_list_from(other: &Value<'w>) -> Result<Self, AllocError> {
        let world = other.world();
        match other.value_type() {
            ValueType::List => other.try_clone(),
            ValueType::String => {
                let units = other.as_string().as_slice();
                let mut list = List::new(world, ValueType::String);
                list.items.set_capacity(units.len())?;
                for unit in units {
                    list.items.push(Value::new_string(world, slice::from_ref(unit))?)?;
                }
                Self::from_payload(world, Payload::List(list))
            }
            ValueType::Pair => {
                let pair = other.as_pair();
                let item_type = common_type([pair.left_type(), pair.right_type()]);
                let items = [pair.left().try_clone()?, pair.right().try_clone()?];
                Self::new_list(world, item_type, items)
            }
            ValueType::Dictionary => {
                let dict = other.as_dictionary();
                let mut list = List::new(world, ValueType::Pair);
                list.items.set_capacity(dict.len())?;
                for (key, value) in dict.iter() {
                    let pair = Value::new_pair(world, key.try_clone()?, value.try_clone()?)?;
                    list.items.push(pair)?;
                }
                Self::from_payload(world, Payload::List(list))
            }
            scalar => Self::new_list(world, scalar, [other.try_clone()?]),
        }
    }
}
