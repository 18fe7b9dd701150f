//! The allocator seam and its two-variant dispatcher.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::NonNull;

use tessera_core::{AllocError, VmemError, WorldError};

use crate::arena::Arena;
use crate::config::AllocatorConfig;
use crate::sys::SysAlloc;
use crate::vmem::{PlatformVmem, VirtualMemory};

/// Typed, aligned allocation with header-tracked chunks.
///
/// Implemented by [`Arena`], [`SysAlloc`] and the dispatching [`Allocator`].
/// Every returned chunk is zeroed and aligned to at least 8 bytes.
pub trait RawAllocator {
    /// Allocate `size * count` bytes aligned to `align` (0 means 8).
    fn allocate(&mut self, align: usize, size: usize, count: usize)
        -> Result<NonNull<u8>, AllocError>;

    /// Resize a chunk, possibly moving it.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk from this allocator. On success the old
    /// pointer must not be used again unless it equals the returned one.
    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError>;

    /// Free a chunk.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk from this allocator and is dead afterwards.
    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError>;

    /// Bytes held by live chunks, headers included.
    fn live_bytes(&self) -> usize;
}

impl RawAllocator for Arena {
    fn allocate(
        &mut self,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        Arena::allocate(self, align, size, count)
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { Arena::reallocate(self, ptr, align, size, count) }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { Arena::deallocate(self, ptr) }
    }

    fn live_bytes(&self) -> usize {
        Arena::live_bytes(self)
    }
}

impl RawAllocator for SysAlloc {
    fn allocate(
        &mut self,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        SysAlloc::allocate(self, align, size, count)
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { SysAlloc::reallocate(self, ptr, align, size, count) }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { SysAlloc::deallocate(self, ptr) }
    }

    fn live_bytes(&self) -> usize {
        SysAlloc::live_bytes(self)
    }
}

/// Which backend an [`Allocator`] dispatches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AllocatorKind {
    /// Host allocator.
    Auto,
    /// Reserve/commit arena.
    Arena,
}

impl fmt::Display for AllocatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Arena => f.write_str("arena"),
        }
    }
}

/// An allocator fixed at construction to one backend.
#[derive(Debug)]
pub enum Allocator {
    /// Host allocator.
    Auto(SysAlloc),
    /// Reserve/commit arena.
    Arena(Arena),
}

impl Allocator {
    /// Build the allocator a config describes, on the host OS.
    pub fn new(config: &AllocatorConfig) -> Result<Self, WorldError> {
        Self::with_vmem(config, Box::new(PlatformVmem))
    }

    /// Build the allocator a config describes; an arena goes through `vmem`.
    pub fn with_vmem(
        config: &AllocatorConfig,
        vmem: Box<dyn VirtualMemory>,
    ) -> Result<Self, WorldError> {
        match config {
            AllocatorConfig::Auto => Ok(Self::Auto(SysAlloc::new())),
            AllocatorConfig::Arena(arena) => Ok(Self::Arena(Arena::with_vmem(arena, vmem)?)),
        }
    }

    /// The active backend.
    pub fn kind(&self) -> AllocatorKind {
        match self {
            Self::Auto(_) => AllocatorKind::Auto,
            Self::Arena(_) => AllocatorKind::Arena,
        }
    }

    /// The arena, when this allocator is one.
    pub fn as_arena(&self) -> Option<&Arena> {
        match self {
            Self::Arena(arena) => Some(arena),
            Self::Auto(_) => None,
        }
    }

    /// Release everything the allocator holds in bulk.
    ///
    /// Releases the reservation of an arena; a no-op for the host allocator.
    pub fn release(&mut self) -> Result<(), VmemError> {
        match self {
            Self::Auto(_) => Ok(()),
            Self::Arena(arena) => arena.release(),
        }
    }
}

impl RawAllocator for Allocator {
    fn allocate(
        &mut self,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        match self {
            Self::Auto(sys) => sys.allocate(align, size, count),
            Self::Arena(arena) => arena.allocate(align, size, count),
        }
    }

    unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe {
            match self {
                Self::Auto(sys) => sys.reallocate(ptr, align, size, count),
                Self::Arena(arena) => arena.reallocate(ptr, align, size, count),
            }
        }
    }

    unsafe fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe {
            match self {
                Self::Auto(sys) => sys.deallocate(ptr),
                Self::Arena(arena) => arena.deallocate(ptr),
            }
        }
    }

    fn live_bytes(&self) -> usize {
        match self {
            Self::Auto(sys) => sys.live_bytes(),
            Self::Arena(arena) => arena.live_bytes(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ArenaConfig;
    use crate::vmem::os_page_size;

    fn both() -> Vec<Allocator> {
        let page = os_page_size();
        vec![
            Allocator::new(&AllocatorConfig::Auto).unwrap(),
            Allocator::new(&AllocatorConfig::Arena(
                ArenaConfig::new(16 * page).with_page_size(page),
            ))
            .unwrap(),
        ]
    }

    #[test]
    fn kinds_match_config() {
        let kinds: Vec<_> = both().iter().map(Allocator::kind).collect();
        assert_eq!(kinds, [AllocatorKind::Auto, AllocatorKind::Arena]);
        assert_eq!(AllocatorKind::Arena.to_string(), "arena");
    }

    #[test]
    fn dispatch_round_trip() {
        for mut alloc in both() {
            let p = alloc.allocate(16, 4, 10).unwrap();
            assert_eq!(p.as_ptr() as usize % 16, 0);
            let q = unsafe { alloc.reallocate(p, 16, 4, 20) }.unwrap();
            assert_eq!(alloc.live_bytes(), crate::chunk::HEADER_SIZE + 80);
            unsafe { alloc.deallocate(q) }.unwrap();
            assert_eq!(alloc.live_bytes(), 0);
            alloc.release().unwrap();
        }
    }

    #[test]
    fn only_arena_exposes_arena() {
        let all = both();
        assert!(all[0].as_arena().is_none());
        assert!(all[1].as_arena().is_some());
    }

    #[test]
    fn bad_arena_config_is_reported() {
        let err = Allocator::new(&AllocatorConfig::Arena(ArenaConfig::new(0))).unwrap_err();
        assert!(matches!(err, WorldError::Config(_)));
    }
}
