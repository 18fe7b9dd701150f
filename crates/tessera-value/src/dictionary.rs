//! Insertion-ordered maps stored as a List of Pair.
//!
//! Each entry is `Pair(hashed_key, Pair(key, value))`, where `hashed_key`
//! is an unsigned 64-bit Integer holding the key's structural id. Keys are
//! unique by that hash.

use tessera_core::{precondition, violation, AllocError, Integer, ValueType};

use crate::list::{common_type, List};
use crate::value::{check_world, Payload, Value};
use crate::world::World;

/// A map from `left_type` keys to `right_type` values.
pub struct Dictionary<'w> {
    left_type: ValueType,
    right_type: ValueType,
    entries: List<'w>,
}

fn hashed_key(entry: &Value<'_>) -> Integer {
    entry.as_pair().left().as_integer()
}

fn key_value<'a, 'w>(entry: &'a Value<'w>) -> (&'a Value<'w>, &'a Value<'w>) {
    let kv = entry.as_pair().right().as_pair();
    (kv.left(), kv.right())
}

impl<'w> Dictionary<'w> {
    pub(crate) fn new(world: &'w World, left_type: ValueType, right_type: ValueType) -> Self {
        Self {
            left_type,
            right_type,
            entries: List::new(world, ValueType::Pair),
        }
    }

    pub(crate) fn try_clone(&self) -> Result<Self, AllocError> {
        Ok(Self {
            left_type: self.left_type,
            right_type: self.right_type,
            entries: self.entries.try_clone()?,
        })
    }

    pub(crate) fn content_hash(&self) -> u64 {
        let world = self.world();
        let mut h = world.secret().hasher();
        h.update(&[self.left_type.tag(), self.right_type.tag()])
            .update(&self.entries.content_hash().to_le_bytes());
        h.finish()
    }

    fn world(&self) -> &'w World {
        self.entries.world()
    }

    /// Add `key -> value` after the existing entries.
    ///
    /// A key whose structural id matches an existing key is a precondition
    /// violation.
    pub fn insert(&mut self, key: Value<'w>, value: Value<'w>) -> Result<(), AllocError> {
        let world = self.world();
        check_world(world, &key);
        check_world(world, &value);
        let (kt, vt) = (key.value_type(), value.value_type());
        precondition!(
            self.left_type.admits(kt),
            "dictionary keys are {}, got a {kt} key",
            self.left_type
        );
        precondition!(
            self.right_type.admits(vt),
            "dictionary values are {}, got a {vt} value",
            self.right_type
        );
        let hash = Integer::U64(key.id_reasonable().0);
        precondition!(
            self.entries.iter().all(|e| hashed_key(e) != hash),
            "keys are unique by hash"
        );
        let hashed = Value::new_integer(world, hash)?;
        let kv = Value::new_pair(world, key, value)?;
        let entry = Value::new_pair(world, hashed, kv)?;
        self.entries.push_back([entry])
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.size()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Declared key type.
    pub fn left_type(&self) -> ValueType {
        self.left_type
    }

    /// Declared value type.
    pub fn right_type(&self) -> ValueType {
        self.right_type
    }

    /// `(key, value)` borrows in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&Value<'w>, &Value<'w>)> + '_ {
        self.entries.iter().map(key_value)
    }

    /// The internal List of `Pair(hashed_key, Pair(key, value))`.
    pub fn entries(&self) -> &List<'w> {
        &self.entries
    }
}

impl<'w> Value<'w> {
    /// A Dictionary from `entries`, each a `Pair(key, value)`.
    pub fn new_dictionary<I>(
        world: &'w World,
        left_type: ValueType,
        right_type: ValueType,
        entries: I,
    ) -> Result<Self, AllocError>
    where
        I: IntoIterator<Item = Value<'w>>,
    {
        let mut dict = Dictionary::new(world, left_type, right_type);
        for entry in entries {
            check_world(world, &entry);
            match entry.into_payload() {
                Payload::Pair(pair) => {
                    let (key, value) = pair.into_parts();
                    dict.insert(key, value)?;
                }
                other => violation!(
                    "dictionary entries are Pair values, got a {}",
                    other.value_type()
                ),
            }
        }
        Self::from_payload(world, Payload::Dictionary(dict))
    }

    /// A Dictionary built from another value:
    ///
    /// - a Pair gives a single entry;
    /// - a List of Pair gives one entry per item;
    /// - any other List is read as alternating keys and values and must
    ///   have an even size;
    /// - a Dictionary gives a deep copy.
    ///
    /// Key and value types are the common types of the copied keys and
    /// values, or `Any` when they differ or there are none.
    pub fn new_dictionary_from(other: &Value<'w>) -> Result<Self, AllocError> {
        let world = other.world();
        match other.value_type() {
            ValueType::Dictionary => other.try_clone(),
            ValueType::Pair => {
                let pair = other.as_pair();
                let entry = other.try_clone()?;
                Self::new_dictionary(world, pair.left_type(), pair.right_type(), [entry])
            }
            ValueType::List => {
                let list = other.as_list();
                let mut pairs: Vec<(&Value<'w>, &Value<'w>)> = Vec::with_capacity(list.size());
                if list.item_type() == ValueType::Pair {
                    pairs.extend(list.iter().map(|p| (p.as_pair().left(), p.as_pair().right())));
                } else {
                    let size = list.size();
                    precondition!(
                        size % 2 == 0,
                        "a dictionary needs an even number of items, got {size}"
                    );
                    let items = list.storage();
                    pairs.extend(items.chunks_exact(2).map(|kv| (&kv[0], &kv[1])));
                }
                let left_type = common_type(pairs.iter().map(|(k, _)| k.value_type()));
                let right_type = common_type(pairs.iter().map(|(_, v)| v.value_type()));
                let mut dict = Dictionary::new(world, left_type, right_type);
                for (key, value) in pairs {
                    dict.insert(key.try_clone()?, value.try_clone()?)?;
                }
                Self::from_payload(world, Payload::Dictionary(dict))
            }
            found => violation!("cannot build a dictionary from a {found} value"),
        }
    }
}
