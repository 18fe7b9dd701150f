//! The lifecycle root that owns an allocator and a hashing secret.

#![allow(unsafe_code)]

use std::cell::{Cell, RefCell};
use std::ptr::NonNull;

use tessera_arena::{Allocator, AllocatorKind, RawAllocator, VirtualMemory};
use tessera_core::{AllocError, KeyedHash64, Secret, VmemError, WorldError};
use tracing::{debug, error};

use crate::config::WorldConfig;

/// Snapshot of an arena world's bookkeeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaUsage {
    /// Bytes held by live chunks, headers included.
    pub live: usize,
    /// Bytes below the bump pointer.
    pub used: usize,
    /// Bytes committed.
    pub committed: usize,
    /// Bytes reserved.
    pub reserved: usize,
}

/// Owns one [`Allocator`] and one [`Secret`]; every value is rooted in a
/// world and borrows it for its whole life.
///
/// A world is single-threaded. Its allocator sits behind a `RefCell`, so a
/// world is never `Sync`.
///
/// In arena mode, destroying the world releases the whole reservation.
/// Values must be gone by then, which the borrow checker enforces; values
/// that should not be freed one by one can be passed to
/// [`std::mem::forget`] and are reclaimed with the reservation.
#[derive(Debug)]
pub struct World {
    allocator: RefCell<Allocator>,
    secret: Secret,
    released: Cell<bool>,
}

impl World {
    /// Create a world on the host OS with a fresh secret.
    pub fn new(config: &WorldConfig) -> Result<Self, WorldError> {
        let allocator = Allocator::new(&config.allocator)?;
        Ok(Self::from_parts(allocator, Secret::generate()))
    }

    /// Create a world whose arena (if any) goes through `vmem`.
    pub fn with_vmem(
        config: &WorldConfig,
        vmem: Box<dyn VirtualMemory>,
    ) -> Result<Self, WorldError> {
        let allocator = Allocator::with_vmem(&config.allocator, vmem)?;
        Ok(Self::from_parts(allocator, Secret::generate()))
    }

    /// Assemble a world from an allocator and a secret.
    pub fn from_parts(allocator: Allocator, secret: Secret) -> Self {
        debug!(allocator = %allocator.kind(), "world created");
        Self {
            allocator: RefCell::new(allocator),
            secret,
            released: Cell::new(false),
        }
    }

    /// Destroy the world, releasing its allocator.
    pub fn destroy(self) -> Result<(), VmemError> {
        self.release()
    }

    /// The allocator backend.
    pub fn allocator_kind(&self) -> AllocatorKind {
        self.allocator.borrow().kind()
    }

    /// Bytes held by live chunks, headers included.
    pub fn live_bytes(&self) -> usize {
        self.allocator.borrow().live_bytes()
    }

    /// Arena bookkeeping, or `None` in auto mode.
    pub fn arena_usage(&self) -> Option<ArenaUsage> {
        self.allocator.borrow().as_arena().map(|arena| ArenaUsage {
            live: arena.live_bytes(),
            used: arena.used_bytes(),
            committed: arena.committed_bytes(),
            reserved: arena.reserved_bytes(),
        })
    }

    /// The hashing secret.
    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub(crate) fn hash64(&self, data: &[u8]) -> u64 {
        self.secret.hash64(data)
    }

    pub(crate) fn alloc_raw(
        &self,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.allocator.borrow_mut().allocate(align, size, count)
    }

    /// # Safety
    ///
    /// `ptr` must be a live chunk of this world's allocator.
    pub(crate) unsafe fn realloc_raw(
        &self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe {
            self.allocator
                .borrow_mut()
                .reallocate(ptr, align, size, count)
        }
    }

    /// Free a chunk. Failures cannot be returned from the drop paths that
    /// call this, so they are logged.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk of this world's allocator and dead after.
    pub(crate) unsafe fn dealloc_raw(&self, ptr: NonNull<u8>) {
        // SAFETY: forwarded under the caller's contract.
        let result = unsafe { self.allocator.borrow_mut().deallocate(ptr) };
        if let Err(e) = result {
            error!(error = %e, "deallocation failed");
        }
    }

    fn release(&self) -> Result<(), VmemError> {
        if self.released.get() {
            return Ok(());
        }
        let mut allocator = self.allocator.borrow_mut();
        let live = allocator.live_bytes();
        allocator.release()?;
        self.released.set(true);
        debug!(allocator = %allocator.kind(), live_bytes = live, "world destroyed");
        Ok(())
    }
}

impl Drop for World {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(error = %e, "world release failed during drop");
        }
    }
}
