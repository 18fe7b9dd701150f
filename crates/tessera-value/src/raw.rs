//! Growable buffers whose storage comes from a world's allocator.

#![allow(unsafe_code)]

use std::marker::PhantomData;
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;

use smallvec::SmallVec;
use tessera_core::{precondition, AllocError};

use crate::world::World;

/// Items removed from a buffer in one call.
pub type Removed<T> = SmallVec<[T; 4]>;

/// A contiguous, growable array of `T` allocated from a [`World`].
///
/// Like `Vec<T>`, but capacity changes go through the world's allocator, so
/// growing the most recent buffer of an arena world happens in place.
pub(crate) struct RawBuf<'w, T> {
    world: &'w World,
    ptr: Option<NonNull<T>>,
    len: usize,
    cap: usize,
    _owns: PhantomData<T>,
}

impl<'w, T> RawBuf<'w, T> {
    pub(crate) fn new(world: &'w World) -> Self {
        debug_assert!(mem::size_of::<T>() > 0);
        Self {
            world,
            ptr: None,
            len: 0,
            cap: 0,
            _owns: PhantomData,
        }
    }

    pub(crate) fn with_capacity(world: &'w World, cap: usize) -> Result<Self, AllocError> {
        let mut buf = Self::new(world);
        buf.set_capacity(cap)?;
        Ok(buf)
    }

    pub(crate) fn world(&self) -> &'w World {
        self.world
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn capacity(&self) -> usize {
        self.cap
    }

    pub(crate) fn as_ptr(&self) -> *const T {
        match self.ptr {
            Some(p) => p.as_ptr(),
            None => NonNull::dangling().as_ptr(),
        }
    }

    fn as_mut_ptr(&mut self) -> *mut T {
        match self.ptr {
            Some(p) => p.as_ptr(),
            None => NonNull::dangling().as_ptr(),
        }
    }

    pub(crate) fn as_slice(&self) -> &[T] {
        // SAFETY: the first `len` slots are initialised; a dangling pointer
        // is valid for an empty slice.
        unsafe { slice::from_raw_parts(self.as_ptr(), self.len) }
    }

    pub(crate) fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as for `as_slice`, and we hold `&mut self`.
        unsafe { slice::from_raw_parts_mut(self.as_mut_ptr(), self.len) }
    }

    /// Write `value` into every slot past the length, up to capacity.
    pub(crate) fn fill_spare(&mut self, value: T)
    where
        T: Copy,
    {
        let (len, cap) = (self.len, self.cap);
        let base = self.as_mut_ptr();
        for i in len..cap {
            // SAFETY: i < cap, so the slot lies inside our chunk; T is Copy,
            // so overwriting an old item needs no drop.
            unsafe { base.add(i).write(value) };
        }
    }

    /// Set the capacity to exactly `cap` slots. Zero frees the storage.
    pub(crate) fn set_capacity(&mut self, cap: usize) -> Result<(), AllocError> {
        precondition!(
            cap >= self.len,
            "capacity {cap} below length {}",
            self.len
        );
        if cap == self.cap {
            return Ok(());
        }
        let align = mem::align_of::<T>();
        let size = mem::size_of::<T>();
        self.ptr = match (self.ptr, cap) {
            (None, _) => Some(self.world.alloc_raw(align, size, cap)?.cast()),
            (Some(p), 0) => {
                // SAFETY: p is our live chunk and holds no initialised items.
                unsafe { self.world.dealloc_raw(p.cast()) };
                None
            }
            (Some(p), _) => {
                // SAFETY: p is our live chunk; the allocator copies the
                // initialised prefix.
                let q = unsafe { self.world.realloc_raw(p.cast(), align, size, cap)? };
                Some(q.cast())
            }
        };
        self.cap = cap;
        Ok(())
    }

    /// Make room for `additional` more items, at least doubling on growth.
    pub(crate) fn reserve(&mut self, additional: usize) -> Result<(), AllocError> {
        let needed = self.len.checked_add(additional).ok_or(AllocError::Exhausted {
            requested: usize::MAX,
            available: 0,
        })?;
        if needed <= self.cap {
            return Ok(());
        }
        let grown = self.cap.saturating_mul(2).max(needed).max(4);
        self.set_capacity(grown)
    }

    /// Insert `items` at `index`, shifting later items up.
    ///
    /// On allocation failure the items are dropped and the buffer is
    /// unchanged.
    pub(crate) fn insert_many<I>(&mut self, index: usize, items: I) -> Result<(), AllocError>
    where
        I: IntoIterator<Item = T>,
    {
        precondition!(
            index <= self.len,
            "insert index {index} out of range for length {}",
            self.len
        );
        let items: SmallVec<[T; 8]> = items.into_iter().collect();
        let n = items.len();
        if n == 0 {
            return Ok(());
        }
        self.reserve(n)?;
        let base = self.as_mut_ptr();
        // SAFETY: capacity covers len + n; the tail move stays inside it and
        // every vacated slot is written before len is raised.
        unsafe {
            ptr::copy(base.add(index), base.add(index + n), self.len - index);
            for (k, item) in items.into_iter().enumerate() {
                base.add(index + k).write(item);
            }
        }
        self.len += n;
        Ok(())
    }

    /// Append one item.
    pub(crate) fn push(&mut self, item: T) -> Result<(), AllocError> {
        self.reserve(1)?;
        let len = self.len;
        // SAFETY: reserve guaranteed a free slot at `len`.
        unsafe { self.as_mut_ptr().add(len).write(item) };
        self.len += 1;
        Ok(())
    }

    /// Move `n` items starting at `index` out of the buffer.
    pub(crate) fn remove_range(&mut self, index: usize, n: usize) -> Removed<T> {
        precondition!(
            index.checked_add(n).is_some_and(|end| end <= self.len),
            "range {index}+{n} out of bounds for length {}",
            self.len
        );
        let base = self.as_mut_ptr();
        let mut out = Removed::with_capacity(n);
        // SAFETY: [index, index + n) is initialised; each item is read
        // exactly once and the tail is shifted over the holes.
        unsafe {
            for k in 0..n {
                out.push(base.add(index + k).read());
            }
            ptr::copy(base.add(index + n), base.add(index), self.len - index - n);
        }
        self.len -= n;
        out
    }

    /// Drop every item from `new_len` on.
    pub(crate) fn truncate(&mut self, new_len: usize) {
        if new_len >= self.len {
            return;
        }
        let tail = self.len - new_len;
        self.len = new_len;
        // SAFETY: the dropped items were initialised and are now past len.
        unsafe {
            ptr::drop_in_place(slice::from_raw_parts_mut(
                self.as_mut_ptr().add(new_len),
                tail,
            ))
        };
    }

    pub(crate) fn swap(&mut self, i: usize, j: usize) {
        let len = self.len;
        precondition!(
            i < len && j < len,
            "swap indices {i}, {j} out of range for length {len}"
        );
        self.as_mut_slice().swap(i, j);
    }
}

impl<T: Copy> RawBuf<'_, T> {
    /// Append copies of `items`.
    pub(crate) fn extend_from_slice(&mut self, items: &[T]) -> Result<(), AllocError> {
        self.reserve(items.len())?;
        let len = self.len;
        // SAFETY: reserve made room for items.len() more slots; `items`
        // cannot alias our storage because we hold `&mut self`.
        unsafe {
            ptr::copy_nonoverlapping(items.as_ptr(), self.as_mut_ptr().add(len), items.len())
        };
        self.len += items.len();
        Ok(())
    }
}

impl<T> Drop for RawBuf<'_, T> {
    fn drop(&mut self) {
        self.truncate(0);
        if let Some(p) = self.ptr.take() {
            // SAFETY: p is our live chunk and is not used again.
            unsafe { self.world.dealloc_raw(p.cast()) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorldConfig;
    use std::cell::Cell;
    use std::rc::Rc;

    fn worlds() -> Vec<World> {
        vec![
            World::new(&WorldConfig::auto()).unwrap(),
            World::new(&WorldConfig::arena(1 << 20)).unwrap(),
        ]
    }

    #[test]
    fn push_and_grow() {
        for world in worlds() {
            let mut buf = RawBuf::new(&world);
            for i in 0..100u32 {
                buf.push(i).unwrap();
            }
            assert_eq!(buf.len(), 100);
            assert!(buf.capacity() >= 100);
            assert_eq!(buf.as_slice()[99], 99);
            drop(buf);
            assert_eq!(world.live_bytes(), 0);
        }
    }

    #[test]
    fn insert_and_remove_shift_items() {
        let world = World::new(&WorldConfig::auto()).unwrap();
        let mut buf = RawBuf::new(&world);
        buf.extend_from_slice(&[1u32, 5]).unwrap();
        buf.insert_many(1, [2, 3, 4]).unwrap();
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4, 5]);
        let out = buf.remove_range(1, 2);
        assert_eq!(out.as_slice(), &[2, 3]);
        assert_eq!(buf.as_slice(), &[1, 4, 5]);
    }

    #[test]
    fn capacity_zero_frees_storage() {
        for world in worlds() {
            let mut buf: RawBuf<'_, u64> = RawBuf::with_capacity(&world, 8).unwrap();
            assert!(world.live_bytes() > 0);
            buf.set_capacity(0).unwrap();
            assert_eq!(world.live_bytes(), 0);
            assert_eq!(buf.as_slice(), &[] as &[u64]);
        }
    }

    #[test]
    #[should_panic(expected = "below length")]
    fn capacity_below_length_is_a_violation() {
        let world = World::new(&WorldConfig::auto()).unwrap();
        let mut buf = RawBuf::new(&world);
        buf.extend_from_slice(&[1u8, 2, 3]).unwrap();
        buf.set_capacity(2).unwrap();
    }

    #[test]
    fn fill_spare_covers_slots_past_the_length() {
        let world = World::new(&WorldConfig::auto()).unwrap();
        let mut buf: RawBuf<'_, u16> = RawBuf::with_capacity(&world, 6).unwrap();
        buf.extend_from_slice(&[7, 7, 7, 7]).unwrap();
        buf.truncate(1);
        buf.fill_spare(0);
        assert_eq!(buf.as_slice(), &[7]);
        // SAFETY: fill_spare initialised every slot up to capacity.
        let spare: Vec<u16> = (1..6).map(|i| unsafe { *buf.as_ptr().add(i) }).collect();
        assert_eq!(spare, [0; 5]);
    }

    struct Tracked(Rc<Cell<usize>>);

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn truncate_and_drop_run_destructors_once() {
        let world = World::new(&WorldConfig::auto()).unwrap();
        let drops = Rc::new(Cell::new(0));
        let mut buf = RawBuf::new(&world);
        for _ in 0..5 {
            buf.push(Tracked(drops.clone())).unwrap();
        }
        buf.truncate(3);
        assert_eq!(drops.get(), 2);
        let removed = buf.remove_range(0, 1);
        assert_eq!(drops.get(), 2);
        drop(removed);
        assert_eq!(drops.get(), 3);
        drop(buf);
        assert_eq!(drops.get(), 5);
    }

    #[test]
    fn tail_growth_in_arena_stays_in_place() {
        let world = World::new(&WorldConfig::arena(1 << 20)).unwrap();
        let mut buf = RawBuf::with_capacity(&world, 4).unwrap();
        buf.extend_from_slice(&[1u32, 2, 3, 4]).unwrap();
        let before = buf.as_ptr();
        buf.set_capacity(64).unwrap();
        assert_eq!(buf.as_ptr(), before);
        assert_eq!(buf.as_slice(), &[1, 2, 3, 4]);
    }
}
