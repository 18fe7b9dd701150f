#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tessera_arena::{PlatformVmem, VirtualMemory};
use tessera_core::VmemError;

/// Call and byte counters shared between a [`RecordingVmem`] and the test.
#[derive(Debug, Default)]
pub struct VmemCounts {
    pub reserves: AtomicUsize,
    pub commits: AtomicUsize,
    pub decommits: AtomicUsize,
    pub releases: AtomicUsize,
    pub committed_bytes: AtomicUsize,
    pub decommitted_bytes: AtomicUsize,
}

impl VmemCounts {
    pub fn reserves(&self) -> usize {
        self.reserves.load(Ordering::Relaxed)
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }

    pub fn decommits(&self) -> usize {
        self.decommits.load(Ordering::Relaxed)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::Relaxed)
    }

    pub fn committed_bytes(&self) -> usize {
        self.committed_bytes.load(Ordering::Relaxed)
    }

    pub fn decommitted_bytes(&self) -> usize {
        self.decommitted_bytes.load(Ordering::Relaxed)
    }
}

/// [`PlatformVmem`] with every call counted.
#[derive(Debug, Default)]
pub struct RecordingVmem {
    counts: Arc<VmemCounts>,
}

impl RecordingVmem {
    /// A recorder and a handle to its counters.
    pub fn new() -> (Self, Arc<VmemCounts>) {
        let counts = Arc::new(VmemCounts::default());
        (
            Self {
                counts: counts.clone(),
            },
            counts,
        )
    }

    /// Boxed, ready for `World::with_vmem` or `Arena::with_vmem`.
    pub fn boxed() -> (Box<dyn VirtualMemory>, Arc<VmemCounts>) {
        let (vmem, counts) = Self::new();
        (Box::new(vmem), counts)
    }
}

impl VirtualMemory for RecordingVmem {
    fn page_size(&self) -> usize {
        PlatformVmem.page_size()
    }

    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>, VmemError> {
        self.counts.reserves.fetch_add(1, Ordering::Relaxed);
        PlatformVmem.reserve(bytes)
    }

    unsafe fn commit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        self.counts.commits.fetch_add(1, Ordering::Relaxed);
        self.counts.committed_bytes.fetch_add(bytes, Ordering::Relaxed);
        // SAFETY: forwarded under the caller's contract.
        unsafe { PlatformVmem.commit(base, bytes) }
    }

    unsafe fn decommit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        self.counts.decommits.fetch_add(1, Ordering::Relaxed);
        self.counts
            .decommitted_bytes
            .fetch_add(bytes, Ordering::Relaxed);
        // SAFETY: forwarded under the caller's contract.
        unsafe { PlatformVmem.decommit(base, bytes) }
    }

    unsafe fn release(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        self.counts.releases.fetch_add(1, Ordering::Relaxed);
        // SAFETY: forwarded under the caller's contract.
        unsafe { PlatformVmem.release(base, bytes) }
    }
}
