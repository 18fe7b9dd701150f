//! Tagged values: construction, identity, deep copy and destruction.
//!
//! A [`Value`] is an owning handle to a node allocated from its world's
//! allocator. The node holds the payload; containers hold their children as
//! further `Value`s, so the ownership tree is acyclic and dropping a value
//! frees every descendant exactly once, children before parents.
//!
//! The node never moves while the value lives, so [`Value::id`] is stable
//! even when the handle itself is moved around.

#![allow(unsafe_code)]

use std::fmt;
use std::marker::PhantomData;
use std::mem::{self, ManuallyDrop};
use std::ptr::{self, NonNull};

use smallvec::SmallVec;
use tessera_core::{
    precondition, violation, AllocError, Floating, Integer, ValueId, ValueType,
};

use crate::dictionary::Dictionary;
use crate::list::List;
use crate::pair::Pair;
use crate::string::WideString;
use crate::world::World;

pub(crate) enum Payload<'w> {
    Boolean(bool),
    Integer(Integer),
    Floating(Floating),
    String(WideString<'w>),
    Pair(Pair<'w>),
    List(List<'w>),
    Dictionary(Dictionary<'w>),
}

impl Payload<'_> {
    pub(crate) fn value_type(&self) -> ValueType {
        match self {
            Self::Boolean(_) => ValueType::Boolean,
            Self::Integer(_) => ValueType::Integer,
            Self::Floating(_) => ValueType::Floating,
            Self::String(_) => ValueType::String,
            Self::Pair(_) => ValueType::Pair,
            Self::List(_) => ValueType::List,
            Self::Dictionary(_) => ValueType::Dictionary,
        }
    }
}

/// A dynamically typed value owned by a [`World`].
///
/// The type tag is fixed at construction. Accessors for the wrong variant
/// are precondition violations.
pub struct Value<'w> {
    world: &'w World,
    node: NonNull<Payload<'w>>,
    _owns: PhantomData<Payload<'w>>,
}

#[cold]
fn mismatch(expected: ValueType, found: ValueType) -> ! {
    violation!("expected a {expected} value, found {found}")
}

/// Require that `value` lives in `world`.
pub(crate) fn check_world(world: &World, value: &Value<'_>) {
    precondition!(
        ptr::eq(world, value.world),
        "value belongs to a different world"
    );
}

impl<'w> Value<'w> {
    pub(crate) fn from_payload(world: &'w World, payload: Payload<'w>) -> Result<Self, AllocError> {
        let node = world
            .alloc_raw(mem::align_of::<Payload<'w>>(), mem::size_of::<Payload<'w>>(), 1)?
            .cast::<Payload<'w>>();
        // SAFETY: the chunk is fresh, sized and aligned for one payload.
        unsafe { node.as_ptr().write(payload) };
        Ok(Self {
            world,
            node,
            _owns: PhantomData,
        })
    }

    fn payload(&self) -> &Payload<'w> {
        // SAFETY: the node is initialised for the life of the value.
        unsafe { self.node.as_ref() }
    }

    fn payload_mut(&mut self) -> &mut Payload<'w> {
        // SAFETY: as above; `&mut self` gives exclusive access.
        unsafe { self.node.as_mut() }
    }

    /// Take the payload out and free the node without dropping the payload.
    pub(crate) fn into_payload(self) -> Payload<'w> {
        let this = ManuallyDrop::new(self);
        // SAFETY: the node is initialised; it is read once and then freed
        // without running the payload's destructor a second time.
        unsafe {
            let payload = this.node.as_ptr().read();
            this.world.dealloc_raw(this.node.cast());
            payload
        }
    }

    /// A boolean.
    pub fn new_boolean(world: &'w World, value: bool) -> Result<Self, AllocError> {
        Self::from_payload(world, Payload::Boolean(value))
    }

    /// An integer of the payload's signedness and width.
    pub fn new_integer(world: &'w World, value: Integer) -> Result<Self, AllocError> {
        Self::from_payload(world, Payload::Integer(value))
    }

    /// A floating-point number of the payload's width.
    pub fn new_floating(world: &'w World, value: Floating) -> Result<Self, AllocError> {
        Self::from_payload(world, Payload::Floating(value))
    }

    /// A copy of a boolean value.
    pub fn new_boolean_from(other: &Value<'w>) -> Result<Self, AllocError> {
        Self::new_boolean(other.world, other.as_boolean())
    }

    /// A copy of an integer value.
    pub fn new_integer_from(other: &Value<'w>) -> Result<Self, AllocError> {
        Self::new_integer(other.world, other.as_integer())
    }

    /// A copy of a floating-point value.
    pub fn new_floating_from(other: &Value<'w>) -> Result<Self, AllocError> {
        Self::new_floating(other.world, other.as_floating())
    }

    /// The world this value lives in.
    pub fn world(&self) -> &'w World {
        self.world
    }

    /// The immutable type tag.
    pub fn value_type(&self) -> ValueType {
        self.payload().value_type()
    }

    /// Whether `self` and `other` are the same object.
    pub fn is_same(&self, other: &Value<'_>) -> bool {
        self.node.cast::<u8>() == other.node.cast::<u8>()
    }

    /// Per-object identity: the keyed hash of the type tag XOR the keyed
    /// hash of the node address.
    ///
    /// Stable while the value lives; differs between worlds and processes.
    pub fn id(&self) -> ValueId {
        let tag = self.world.hash64(&[self.value_type().tag()]);
        let addr = self.node.as_ptr() as usize;
        ValueId(tag ^ self.world.hash64(&addr.to_le_bytes()))
    }

    /// Structural identity: the keyed hash of the type tag XOR a keyed hash
    /// of the payload, recursing into children in order.
    ///
    /// Values with equal contents in the same world get equal ids.
    pub fn id_reasonable(&self) -> ValueId {
        let world = self.world;
        let tag = world.hash64(&[self.value_type().tag()]);
        let body = match self.payload() {
            Payload::Boolean(b) => world.hash64(&[u8::from(*b)]),
            Payload::Integer(i) => {
                let mut buf: SmallVec<[u8; 10]> = SmallVec::new();
                buf.push(i.signedness() as u8);
                buf.push(i.width().bits() as u8);
                buf.extend_from_slice(&i.to_bits().to_le_bytes());
                world.hash64(&buf)
            }
            Payload::Floating(x) => {
                let mut buf: SmallVec<[u8; 11]> = SmallVec::new();
                buf.push(x.width().bits() as u8);
                buf.extend_from_slice(&x.to_le_bytes());
                world.hash64(&buf)
            }
            Payload::String(s) => s.content_hash(),
            Payload::Pair(p) => p.content_hash(),
            Payload::List(l) => l.content_hash(),
            Payload::Dictionary(d) => d.content_hash(),
        };
        ValueId(tag ^ body)
    }

    /// A deep copy in the same world.
    pub fn try_clone(&self) -> Result<Value<'w>, AllocError> {
        let payload = match self.payload() {
            Payload::Boolean(b) => Payload::Boolean(*b),
            Payload::Integer(i) => Payload::Integer(*i),
            Payload::Floating(x) => Payload::Floating(*x),
            Payload::String(s) => Payload::String(s.try_clone()?),
            Payload::Pair(p) => Payload::Pair(p.try_clone()?),
            Payload::List(l) => Payload::List(l.try_clone()?),
            Payload::Dictionary(d) => Payload::Dictionary(d.try_clone()?),
        };
        Self::from_payload(self.world, payload)
    }

    /// The boolean payload.
    pub fn as_boolean(&self) -> bool {
        match self.payload() {
            Payload::Boolean(b) => *b,
            other => mismatch(ValueType::Boolean, other.value_type()),
        }
    }

    /// Replace the boolean payload.
    pub fn set_boolean(&mut self, value: bool) {
        match self.payload_mut() {
            Payload::Boolean(b) => *b = value,
            other => mismatch(ValueType::Boolean, other.value_type()),
        }
    }

    /// The integer payload.
    pub fn as_integer(&self) -> Integer {
        match self.payload() {
            Payload::Integer(i) => *i,
            other => mismatch(ValueType::Integer, other.value_type()),
        }
    }

    /// Replace the integer payload. The new payload must have the same
    /// signedness and width.
    pub fn set_integer(&mut self, value: Integer) {
        match self.payload_mut() {
            Payload::Integer(i) => {
                precondition!(
                    i.same_shape(value),
                    "integer {value:?} does not match declared {:?} {:?}",
                    i.signedness(),
                    i.width()
                );
                *i = value;
            }
            other => mismatch(ValueType::Integer, other.value_type()),
        }
    }

    /// The floating-point payload.
    pub fn as_floating(&self) -> Floating {
        match self.payload() {
            Payload::Floating(x) => *x,
            other => mismatch(ValueType::Floating, other.value_type()),
        }
    }

    /// Replace the floating-point payload. The new payload must have the
    /// same width.
    pub fn set_floating(&mut self, value: Floating) {
        match self.payload_mut() {
            Payload::Floating(x) => {
                precondition!(
                    x.width() == value.width(),
                    "floating {value:?} does not match declared width {:?}",
                    x.width()
                );
                *x = value;
            }
            other => mismatch(ValueType::Floating, other.value_type()),
        }
    }

    /// The string payload.
    pub fn as_string(&self) -> &WideString<'w> {
        match self.payload() {
            Payload::String(s) => s,
            other => mismatch(ValueType::String, other.value_type()),
        }
    }

    /// The string payload, mutably.
    pub fn as_string_mut(&mut self) -> &mut WideString<'w> {
        match self.payload_mut() {
            Payload::String(s) => s,
            other => mismatch(ValueType::String, other.value_type()),
        }
    }

    /// The pair payload.
    pub fn as_pair(&self) -> &Pair<'w> {
        match self.payload() {
            Payload::Pair(p) => p,
            other => mismatch(ValueType::Pair, other.value_type()),
        }
    }

    /// The pair payload, mutably.
    pub fn as_pair_mut(&mut self) -> &mut Pair<'w> {
        match self.payload_mut() {
            Payload::Pair(p) => p,
            other => mismatch(ValueType::Pair, other.value_type()),
        }
    }

    /// The list payload.
    pub fn as_list(&self) -> &List<'w> {
        match self.payload() {
            Payload::List(l) => l,
            other => mismatch(ValueType::List, other.value_type()),
        }
    }

    /// The list payload, mutably.
    pub fn as_list_mut(&mut self) -> &mut List<'w> {
        match self.payload_mut() {
            Payload::List(l) => l,
            other => mismatch(ValueType::List, other.value_type()),
        }
    }

    /// The dictionary payload.
    pub fn as_dictionary(&self) -> &Dictionary<'w> {
        match self.payload() {
            Payload::Dictionary(d) => d,
            other => mismatch(ValueType::Dictionary, other.value_type()),
        }
    }

    /// The dictionary payload, mutably.
    pub fn as_dictionary_mut(&mut self) -> &mut Dictionary<'w> {
        match self.payload_mut() {
            Payload::Dictionary(d) => d,
            other => mismatch(ValueType::Dictionary, other.value_type()),
        }
    }
}

impl Drop for Value<'_> {
    fn drop(&mut self) {
        // SAFETY: the payload is initialised and dropped exactly once here;
        // the node is then returned to the allocator it came from.
        unsafe {
            ptr::drop_in_place(self.node.as_ptr());
            self.world.dealloc_raw(self.node.cast());
        }
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.payload() {
            Payload::Boolean(b) => write!(f, "Boolean({b})"),
            Payload::Integer(i) => write!(f, "Integer({i})"),
            Payload::Floating(x) => write!(f, "Floating({x})"),
            Payload::String(s) => write!(f, "String({:?})", s.to_string_lossy()),
            Payload::Pair(p) => f.debug_tuple("Pair").field(p.left()).field(p.right()).finish(),
            Payload::List(l) => f.debug_list().entries(l.iter()).finish(),
            Payload::Dictionary(d) => f.debug_map().entries(d.iter()).finish(),
        }
    }
}
