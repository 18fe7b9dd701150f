//! Zero-terminated wide strings.
//!
//! The buffer always holds `size + 1` code units, the last being zero, so
//! `size < capacity` and `buffer[size] == 0` hold after every operation.

use std::cmp::Ordering;
use std::fmt;

use smallvec::SmallVec;
use tessera_core::{precondition, AllocError, ValueType, WideChar};

use crate::list::List;
use crate::raw::RawBuf;
use crate::value::{Payload, Value};
use crate::world::World;

/// A sequence of [`WideChar`] code units owned by a String value.
pub struct WideString<'w> {
    // Includes the terminator.
    buf: RawBuf<'w, WideChar>,
}

#[cfg(not(windows))]
fn encode(s: &str) -> SmallVec<[WideChar; 32]> {
    s.chars().map(WideChar::from).collect()
}

#[cfg(windows)]
fn encode(s: &str) -> SmallVec<[WideChar; 32]> {
    s.encode_utf16().collect()
}

#[cfg(not(windows))]
fn decode(units: &[WideChar]) -> String {
    units
        .iter()
        .map(|&u| char::from_u32(u).unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

#[cfg(windows)]
fn decode(units: &[WideChar]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|r| r.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

fn find_forward(hay: &[WideChar], needle: &[WideChar], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(start);
    }
    if needle.len() > hay.len() {
        return None;
    }
    (start..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()] == *needle)
}

fn find_backward(hay: &[WideChar], needle: &[WideChar], start: usize) -> Option<usize> {
    if needle.is_empty() {
        return Some(hay.len());
    }
    if needle.len() > hay.len() {
        return None;
    }
    (start..=hay.len() - needle.len())
        .rev()
        .find(|&i| hay[i..i + needle.len()] == *needle)
}

impl<'w> WideString<'w> {
    fn from_units(world: &'w World, units: &[WideChar]) -> Result<Self, AllocError> {
        let mut buf = RawBuf::with_capacity(world, units.len() + 1)?;
        buf.extend_from_slice(units)?;
        buf.push(0)?;
        Ok(Self { buf })
    }

    pub(crate) fn try_clone(&self) -> Result<Self, AllocError> {
        Self::from_units(self.buf.world(), self.as_slice())
    }

    pub(crate) fn content_hash(&self) -> u64 {
        let mut h = self.buf.world().secret().hasher();
        for unit in self.as_slice() {
            h.update(&unit.to_le_bytes());
        }
        h.finish()
    }

    /// The code units, without the terminator.
    pub fn as_slice(&self) -> &[WideChar] {
        let units = self.buf.as_slice();
        &units[..units.len() - 1]
    }

    fn as_mut_slice(&mut self) -> &mut [WideChar] {
        let units = self.buf.as_mut_slice();
        let size = units.len() - 1;
        &mut units[..size]
    }

    /// Number of code units, excluding the terminator.
    pub fn size(&self) -> usize {
        self.buf.len() - 1
    }

    /// Allocated code units, terminator slot included. Always `> size()`.
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    /// Whether the string has no code units.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// The code unit at `index`.
    pub fn get_at(&self, index: usize) -> WideChar {
        let size = self.size();
        precondition!(index < size, "index {index} out of range for size {size}");
        self.as_slice()[index]
    }

    /// The first code unit of a non-empty string.
    pub fn first(&self) -> WideChar {
        precondition!(!self.is_empty(), "first() of an empty string");
        self.as_slice()[0]
    }

    /// The last code unit of a non-empty string.
    pub fn last(&self) -> WideChar {
        precondition!(!self.is_empty(), "last() of an empty string");
        self.as_slice()[self.size() - 1]
    }

    /// Pointer to the first code unit.
    pub fn storage(&self) -> *const WideChar {
        self.buf.as_ptr()
    }

    /// Pointer to the terminator.
    pub fn storage_end(&self) -> *const WideChar {
        self.buf.as_ptr().wrapping_add(self.size())
    }

    /// Grow the capacity to at least `capacity` code units.
    pub fn grow(&mut self, capacity: usize) -> Result<(), AllocError> {
        if capacity <= self.capacity() {
            return Ok(());
        }
        self.buf.set_capacity(capacity)
    }

    /// Shrink the capacity to `capacity` code units, truncating the string
    /// to `capacity - 1` units if it is longer.
    pub fn shrink(&mut self, capacity: usize) -> Result<(), AllocError> {
        precondition!(capacity >= 1, "a string needs room for its terminator");
        if capacity >= self.capacity() {
            return Ok(());
        }
        if self.size() >= capacity {
            self.buf.truncate(capacity - 1);
            self.buf.push(0)?;
        }
        self.buf.set_capacity(capacity)
    }

    /// Shrink the capacity to `size() + 1`.
    pub fn fit(&mut self) -> Result<(), AllocError> {
        let len = self.buf.len();
        self.buf.set_capacity(len)
    }

    /// Zero the whole buffer and set the size to 0. Capacity is unchanged.
    pub fn clear(&mut self) {
        self.buf.truncate(1);
        self.buf.as_mut_slice().fill(0);
        self.buf.fill_spare(0);
    }

    /// Insert `other` before the code unit at `index`.
    pub fn insert_at(&mut self, index: usize, other: impl AsRef<[WideChar]>) -> Result<(), AllocError> {
        let size = self.size();
        precondition!(index <= size, "insert index {index} out of range for size {size}");
        self.buf.insert_many(index, other.as_ref().iter().copied())
    }

    /// Remove `n` code units starting at `index`.
    pub fn remove_at(&mut self, index: usize, n: usize) {
        let size = self.size();
        precondition!(
            index.checked_add(n).is_some_and(|end| end <= size),
            "range {index}+{n} out of range for size {size}"
        );
        self.buf.remove_range(index, n);
    }

    /// Append `other`.
    pub fn push_back(&mut self, other: impl AsRef<[WideChar]>) -> Result<(), AllocError> {
        let size = self.size();
        self.insert_at(size, other)
    }

    /// Prepend `other`.
    pub fn push_front(&mut self, other: impl AsRef<[WideChar]>) -> Result<(), AllocError> {
        self.insert_at(0, other)
    }

    /// Remove the last `n` code units.
    pub fn pop_back(&mut self, n: usize) {
        let size = self.size();
        precondition!(n <= size, "cannot pop {n} units from size {size}");
        self.remove_at(size - n, n);
    }

    /// Remove the first `n` code units.
    pub fn pop_front(&mut self, n: usize) {
        self.remove_at(0, n);
    }

    /// Index of the first occurrence of `needle` at or after `start`.
    pub fn find_first(&self, needle: impl AsRef<[WideChar]>, start: usize) -> Option<usize> {
        let size = self.size();
        precondition!(start <= size, "start {start} out of range for size {size}");
        find_forward(self.as_slice(), needle.as_ref(), start)
    }

    /// Index of the last occurrence of `needle` starting at or after `start`.
    pub fn find_last(&self, needle: impl AsRef<[WideChar]>, start: usize) -> Option<usize> {
        let size = self.size();
        precondition!(start <= size, "start {start} out of range for size {size}");
        find_backward(self.as_slice(), needle.as_ref(), start)
    }

    /// Replace the first occurrence of `what` with `with`.
    ///
    /// Returns whether an occurrence was found.
    pub fn replace(
        &mut self,
        what: impl AsRef<[WideChar]>,
        with: impl AsRef<[WideChar]>,
    ) -> Result<bool, AllocError> {
        let what = what.as_ref();
        let with = with.as_ref();
        precondition!(!what.is_empty(), "cannot replace an empty pattern");
        let Some(at) = find_forward(self.as_slice(), what, 0) else {
            return Ok(false);
        };
        if what == with {
            return Ok(true);
        }
        self.buf.reserve(with.len().saturating_sub(what.len()))?;
        self.buf.remove_range(at, what.len());
        self.buf.insert_many(at, with.iter().copied())?;
        Ok(true)
    }

    /// Shortlex order: shorter strings first, then code-unit order.
    pub fn compare(&self, other: impl AsRef<[WideChar]>) -> Ordering {
        let a = self.as_slice();
        let b = other.as_ref();
        a.len().cmp(&b.len()).then_with(|| a.cmp(b))
    }

    /// Whether the string begins with `prefix`.
    pub fn starts_with(&self, prefix: impl AsRef<[WideChar]>) -> bool {
        self.as_slice().starts_with(prefix.as_ref())
    }

    /// Whether the string ends with `suffix`.
    pub fn ends_with(&self, suffix: impl AsRef<[WideChar]>) -> bool {
        self.as_slice().ends_with(suffix.as_ref())
    }

    /// Whether `needle` occurs anywhere.
    pub fn contains(&self, needle: impl AsRef<[WideChar]>) -> bool {
        find_forward(self.as_slice(), needle.as_ref(), 0).is_some()
    }

    /// A new String value holding the units in `[start, end)`.
    pub fn substring(&self, start: usize, end: usize) -> Result<Value<'w>, AllocError> {
        let size = self.size();
        precondition!(
            start <= end && end <= size,
            "substring {start}..{end} out of range for size {size}"
        );
        Value::new_string(self.buf.world(), &self.as_slice()[start..end])
    }

    /// A List of the non-empty segments between occurrences of `sep`.
    ///
    /// A string that never contains `sep` yields a one-element list holding
    /// a copy of the whole string.
    pub fn split(&self, sep: impl AsRef<[WideChar]>) -> Result<Value<'w>, AllocError> {
        let sep = sep.as_ref();
        precondition!(!sep.is_empty(), "cannot split on an empty separator");
        let world = self.buf.world();
        let hay = self.as_slice();
        let mut list = List::new(world, ValueType::String);
        let mut from = 0;
        let mut found = false;
        while let Some(at) = find_forward(hay, sep, from) {
            found = true;
            if at > from {
                list.push_back([Value::new_string(world, &hay[from..at])?])?;
            }
            from = at + sep.len();
        }
        if !found {
            list.push_back([Value::new_string(world, hay)?])?;
        } else if from < hay.len() {
            list.push_back([Value::new_string(world, &hay[from..])?])?;
        }
        Value::from_payload(world, Payload::List(list))
    }

    /// Swap the code units at `i` and `j`.
    pub fn swap(&mut self, i: usize, j: usize) {
        let size = self.size();
        precondition!(
            i < size && j < size,
            "swap indices {i}, {j} out of range for size {size}"
        );
        self.as_mut_slice().swap(i, j);
    }

    /// Decode to a Rust string, replacing invalid code units.
    pub fn to_string_lossy(&self) -> String {
        decode(self.as_slice())
    }
}

impl AsRef<[WideChar]> for WideString<'_> {
    fn as_ref(&self) -> &[WideChar] {
        self.as_slice()
    }
}

impl fmt::Display for WideString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl fmt::Debug for WideString<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.to_string_lossy(), f)
    }
}

/// Encode a Rust string as wide code units.
pub fn wide(s: &str) -> SmallVec<[WideChar; 32]> {
    encode(s)
}

impl<'w> Value<'w> {
    /// A String value copying `units`; capacity is `units.len() + 1`.
    pub fn new_string(world: &'w World, units: &[WideChar]) -> Result<Self, AllocError> {
        let s = WideString::from_units(world, units)?;
        Self::from_payload(world, Payload::String(s))
    }

    /// A String value encoding `s`.
    pub fn new_str(world: &'w World, s: &str) -> Result<Self, AllocError> {
        Self::new_string(world, &encode(s))
    }

    /// A deep copy of a String value.
    pub fn new_string_from(other: &Value<'w>) -> Result<Self, AllocError> {
        Self::new_string(other.world(), other.as_string().as_slice())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;

    fn world() -> World {
        World::new(&WorldConfig::auto()).unwrap()
    }

    fn check_terminated(s: &WideString<'_>) {
        assert!(s.size() < s.capacity());
        assert_eq!(s.buf.as_slice().last(), Some(&0));
    }

    #[test]
    fn new_sets_exact_capacity() {
        let w = world();
        let v = Value::new_str(&w, "hello").unwrap();
        let s = v.as_string();
        assert_eq!(s.size(), 5);
        assert_eq!(s.capacity(), 6);
        assert_eq!(s.to_string(), "hello");
        assert_eq!(s.first(), 'h' as WideChar);
        assert_eq!(s.last(), 'o' as WideChar);
        assert_eq!(s.get_at(1), 'e' as WideChar);
        check_terminated(s);
    }

    #[test]
    fn empty_string_has_room_for_terminator() {
        let w = world();
        let v = Value::new_str(&w, "").unwrap();
        assert!(v.as_string().is_empty());
        assert_eq!(v.as_string().capacity(), 1);
        check_terminated(v.as_string());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn get_at_past_end_is_a_violation() {
        let w = world();
        let v = Value::new_str(&w, "ab").unwrap();
        v.as_string().get_at(2);
    }

    #[test]
    fn replace_first_occurrence_only() {
        let w = world();
        let mut v = Value::new_str(&w, "hello world world").unwrap();
        let s = v.as_string_mut();
        assert!(s.replace(wide("world"), wide("friend")).unwrap());
        assert_eq!(s.to_string(), "hello friend world");
        assert!(!s.replace(wide("zzz"), wide("y")).unwrap());
        check_terminated(s);
    }

    #[test]
    fn replace_with_itself_is_a_no_op() {
        let w = world();
        let mut v = Value::new_str(&w, "abcabc").unwrap();
        let s = v.as_string_mut();
        let cap = s.capacity();
        assert!(s.replace(wide("bc"), wide("bc")).unwrap());
        assert_eq!(s.to_string(), "abcabc");
        assert_eq!(s.capacity(), cap);
    }

    #[test]
    fn insert_remove_push_pop() {
        let w = world();
        let mut v = Value::new_str(&w, "ace").unwrap();
        let s = v.as_string_mut();
        s.insert_at(1, wide("b")).unwrap();
        s.insert_at(3, wide("d")).unwrap();
        assert_eq!(s.to_string(), "abcde");
        s.push_back(wide("fg")).unwrap();
        s.push_front(wide(">")).unwrap();
        assert_eq!(s.to_string(), ">abcdefg");
        s.pop_back(2);
        s.pop_front(1);
        assert_eq!(s.to_string(), "abcde");
        s.remove_at(1, 3);
        assert_eq!(s.to_string(), "ae");
        check_terminated(s);
    }

    #[test]
    fn find_first_and_last() {
        let w = world();
        let v = Value::new_str(&w, "abcabcabc").unwrap();
        let s = v.as_string();
        assert_eq!(s.find_first(wide("bc"), 0), Some(1));
        assert_eq!(s.find_first(wide("bc"), 2), Some(4));
        assert_eq!(s.find_last(wide("bc"), 0), Some(7));
        assert_eq!(s.find_last(wide("abc"), 4), Some(6));
        assert_eq!(s.find_last(wide("abc"), 7), None);
        assert_eq!(s.find_first(wide("x"), 0), None);
        assert_eq!(s.find_first(wide(""), 3), Some(3));
        assert_eq!(s.find_last(wide(""), 3), Some(9));
    }

    #[test]
    fn compare_is_shortlex() {
        let w = world();
        let v = Value::new_str(&w, "b").unwrap();
        let s = v.as_string();
        assert_eq!(s.compare(wide("aa")), Ordering::Less);
        assert_eq!(s.compare(wide("a")), Ordering::Greater);
        assert_eq!(s.compare(wide("b")), Ordering::Equal);
        assert_eq!(s.compare(wide("c")), Ordering::Less);
    }

    #[test]
    fn prefix_suffix_contains() {
        let w = world();
        let v = Value::new_str(&w, "tessera").unwrap();
        let s = v.as_string();
        assert!(s.starts_with(wide("tes")));
        assert!(s.ends_with(wide("era")));
        assert!(s.contains(wide("sse")));
        assert!(!s.contains(wide("xyz")));
    }

    #[test]
    fn substring_copies_range() {
        let w = world();
        let v = Value::new_str(&w, "hello world").unwrap();
        let sub = v.as_string().substring(6, 11).unwrap();
        assert_eq!(sub.as_string().to_string(), "world");
        assert_eq!(sub.as_string().capacity(), 6);
    }

    #[test]
    fn split_omits_empty_segments() {
        let w = world();
        let v = Value::new_str(&w, "a,b,,c").unwrap();
        let parts = v.as_string().split(wide(",")).unwrap();
        let list = parts.as_list();
        assert_eq!(list.item_type(), ValueType::String);
        let got: Vec<String> = list.iter().map(|p| p.as_string().to_string()).collect();
        assert_eq!(got, ["a", "b", "c"]);
    }

    #[test]
    fn split_without_separator_yields_copy() {
        let w = world();
        let v = Value::new_str(&w, "abc").unwrap();
        let parts = v.as_string().split(wide(";")).unwrap();
        assert_eq!(parts.as_list().size(), 1);
        assert_eq!(parts.as_list().get_at(0).as_string().to_string(), "abc");
    }

    #[test]
    fn split_of_only_separators_is_empty() {
        let w = world();
        let v = Value::new_str(&w, ",,,").unwrap();
        let parts = v.as_string().split(wide(",")).unwrap();
        assert!(parts.as_list().is_empty());
    }

    #[test]
    fn grow_fit_shrink() {
        let w = world();
        let mut v = Value::new_str(&w, "abcdef").unwrap();
        let s = v.as_string_mut();
        s.grow(32).unwrap();
        assert_eq!(s.capacity(), 32);
        s.grow(8).unwrap();
        assert_eq!(s.capacity(), 32);
        s.fit().unwrap();
        assert_eq!(s.capacity(), 7);
        s.shrink(4).unwrap();
        assert_eq!(s.to_string(), "abc");
        assert_eq!(s.capacity(), 4);
        check_terminated(s);
    }

    #[test]
    fn clear_keeps_capacity() {
        let w = world();
        let mut v = Value::new_str(&w, "abc").unwrap();
        let s = v.as_string_mut();
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.capacity(), 4);
        check_terminated(s);
    }

    #[test]
    #[allow(unsafe_code)]
    fn clear_zeroes_every_slot_up_to_capacity() {
        let w = world();
        let mut v = Value::new_str(&w, "abcdef").unwrap();
        let s = v.as_string_mut();
        s.pop_back(3);
        s.clear();
        let cap = s.capacity();
        assert_eq!(cap, 7);
        // SAFETY: clear initialises the whole buffer.
        let units: Vec<WideChar> = (0..cap).map(|i| unsafe { *s.buf.as_ptr().add(i) }).collect();
        assert_eq!(units, vec![0; cap]);
    }

    #[test]
    fn swap_units() {
        let w = world();
        let mut v = Value::new_str(&w, "ab").unwrap();
        v.as_string_mut().swap(0, 1);
        assert_eq!(v.as_string().to_string(), "ba");
    }

    #[test]
    fn new_from_is_deep() {
        let w = world();
        let a = Value::new_str(&w, "xyz").unwrap();
        let mut b = Value::new_string_from(&a).unwrap();
        b.as_string_mut().push_back(wide("!")).unwrap();
        assert_eq!(a.as_string().to_string(), "xyz");
        assert_eq!(b.as_string().to_string(), "xyz!");
        assert_ne!(a.id_reasonable(), b.id_reasonable());
        b.as_string_mut().pop_back(1);
        assert_eq!(a.id_reasonable(), b.id_reasonable());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Push(String),
            PushFront(String),
            Insert(usize, String),
            Remove(usize, usize),
            PopBack(usize),
            Replace(String, String),
            Shrink(usize),
            Grow(usize),
            Fit,
            Clear,
        }

        fn op() -> impl Strategy<Value = Op> {
            let s = "[a-c]{0,4}";
            prop_oneof![
                s.prop_map(Op::Push),
                s.prop_map(Op::PushFront),
                (any::<usize>(), s).prop_map(|(i, t)| Op::Insert(i, t)),
                (any::<usize>(), 0usize..4).prop_map(|(i, n)| Op::Remove(i, n)),
                (0usize..4).prop_map(Op::PopBack),
                ("[a-c]{1,2}", s).prop_map(|(a, b)| Op::Replace(a, b)),
                (1usize..12).prop_map(Op::Shrink),
                (0usize..40).prop_map(Op::Grow),
                Just(Op::Fit),
                Just(Op::Clear),
            ]
        }

        proptest! {
            #[test]
            fn terminator_and_model_hold(ops in prop::collection::vec(op(), 1..40)) {
                let w = world();
                let mut v = Value::new_str(&w, "").unwrap();
                let mut model = String::new();
                for op in ops {
                    let s = v.as_string_mut();
                    match op {
                        Op::Push(t) => { s.push_back(wide(&t)).unwrap(); model.push_str(&t); }
                        Op::PushFront(t) => { s.push_front(wide(&t)).unwrap(); model.insert_str(0, &t); }
                        Op::Insert(i, t) => {
                            let i = i % (model.len() + 1);
                            s.insert_at(i, wide(&t)).unwrap();
                            model.insert_str(i, &t);
                        }
                        Op::Remove(i, n) => {
                            if model.is_empty() { continue; }
                            let i = i % model.len();
                            let n = n.min(model.len() - i);
                            s.remove_at(i, n);
                            model.replace_range(i..i + n, "");
                        }
                        Op::PopBack(n) => {
                            let n = n.min(model.len());
                            s.pop_back(n);
                            model.truncate(model.len() - n);
                        }
                        Op::Replace(a, b) => {
                            s.replace(wide(&a), wide(&b)).unwrap();
                            model = model.replacen(&a, &b, 1);
                        }
                        Op::Shrink(n) => {
                            let before = s.capacity();
                            s.shrink(n).unwrap();
                            if n < before && model.len() >= n {
                                model.truncate(n - 1);
                            }
                        }
                        Op::Grow(n) => s.grow(n).unwrap(),
                        Op::Fit => {
                            s.fit().unwrap();
                            prop_assert_eq!(s.capacity(), s.size() + 1);
                        }
                        Op::Clear => { s.clear(); model.clear(); }
                    }
                    let s = v.as_string();
                    prop_assert!(s.size() < s.capacity());
                    prop_assert_eq!(s.buf.as_slice().last(), Some(&0));
                    prop_assert_eq!(s.to_string(), model.clone());
                }
            }
        }
    }
}
