//! The OS virtual-memory capability.
//!
//! [`VirtualMemory`] is the seam between the arena and the operating system:
//! reserve an inaccessible range, commit pages inside it, decommit them, and
//! release the range. [`PlatformVmem`] is the real implementation; tests
//! substitute wrappers that record calls.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::OnceLock;

use tessera_core::VmemError;

/// Reserve / commit / decommit / release of page-aligned address ranges.
///
/// Every `bytes` argument passed by the arena is a multiple of its page size
/// and every `base` is page-aligned.
pub trait VirtualMemory {
    /// The OS page size in bytes.
    fn page_size(&self) -> usize;

    /// Reserve `bytes` of address space with no access rights.
    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>, VmemError>;

    /// Make `[base, base + bytes)` readable and writable.
    ///
    /// # Safety
    ///
    /// The range must lie inside a live reservation returned by
    /// [`reserve`](Self::reserve) on this object.
    unsafe fn commit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError>;

    /// Drop the physical backing of `[base, base + bytes)` and remove access.
    ///
    /// # Safety
    ///
    /// The range must lie inside a live reservation, and no live reference
    /// may point into it.
    unsafe fn decommit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError>;

    /// Release a whole reservation.
    ///
    /// # Safety
    ///
    /// `base` and `bytes` must be exactly those of a live reservation; the
    /// range must not be used afterwards.
    unsafe fn release(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError>;
}

impl<V: VirtualMemory + ?Sized> VirtualMemory for Box<V> {
    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>, VmemError> {
        (**self).reserve(bytes)
    }

    unsafe fn commit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { (**self).commit(base, bytes) }
    }

    unsafe fn decommit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { (**self).decommit(base, bytes) }
    }

    unsafe fn release(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: forwarded under the caller's contract.
        unsafe { (**self).release(base, bytes) }
    }
}

/// The host operating system's virtual memory.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlatformVmem;

/// The OS page size, queried once.
pub fn os_page_size() -> usize {
    static CACHED: OnceLock<usize> = OnceLock::new();
    *CACHED.get_or_init(imp::query_page_size)
}

impl VirtualMemory for PlatformVmem {
    fn page_size(&self) -> usize {
        os_page_size()
    }

    fn reserve(&self, bytes: usize) -> Result<NonNull<u8>, VmemError> {
        imp::reserve(bytes)
    }

    unsafe fn commit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: the caller guarantees the range is inside a reservation.
        unsafe { imp::commit(base, bytes) }
    }

    unsafe fn decommit(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: the caller guarantees the range is inside a reservation.
        unsafe { imp::decommit(base, bytes) }
    }

    unsafe fn release(&self, base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: the caller passes an exact live reservation.
        unsafe { imp::release(base, bytes) }
    }
}

#[cfg(all(unix, not(miri)))]
mod imp {
    use std::io;
    use std::ptr::NonNull;

    use tessera_core::VmemError;

    pub(super) fn query_page_size() -> usize {
        // SAFETY: sysconf has no memory-safety preconditions.
        let raw = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if raw > 0 {
            raw as usize
        } else {
            4096
        }
    }

    pub(super) fn reserve(bytes: usize) -> Result<NonNull<u8>, VmemError> {
        // SAFETY: anonymous private mapping at a kernel-chosen address.
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                bytes,
                libc::PROT_NONE,
                libc::MAP_PRIVATE | libc::MAP_ANON,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            return Err(VmemError::Reserve {
                bytes,
                source: io::Error::last_os_error(),
            });
        }
        NonNull::new(ptr.cast::<u8>()).ok_or_else(|| VmemError::Reserve {
            bytes,
            source: io::Error::other("mmap returned null"),
        })
    }

    pub(super) unsafe fn commit(base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: the range is inside one of our mappings.
        let rc = unsafe {
            libc::mprotect(
                base.as_ptr().cast::<libc::c_void>(),
                bytes,
                libc::PROT_READ | libc::PROT_WRITE,
            )
        };
        if rc != 0 {
            return Err(VmemError::Commit {
                bytes,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    pub(super) unsafe fn decommit(base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // Drop the pages, then make stray accesses fault.
        // SAFETY: the range is inside one of our mappings and unreferenced.
        let rc = unsafe {
            libc::madvise(
                base.as_ptr().cast::<libc::c_void>(),
                bytes,
                libc::MADV_DONTNEED,
            )
        };
        if rc != 0 {
            return Err(VmemError::Decommit {
                bytes,
                source: io::Error::last_os_error(),
            });
        }
        // SAFETY: as above.
        let rc = unsafe {
            libc::mprotect(base.as_ptr().cast::<libc::c_void>(), bytes, libc::PROT_NONE)
        };
        if rc != 0 {
            return Err(VmemError::Decommit {
                bytes,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }

    pub(super) unsafe fn release(base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: base/bytes describe exactly one mapping made by `reserve`.
        if unsafe { libc::munmap(base.as_ptr().cast::<libc::c_void>(), bytes) } != 0 {
            return Err(VmemError::Release {
                bytes,
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

// Heap-backed stand-in for targets without mmap (and for Miri): the whole
// reservation is one zeroed heap block that is always accessible.
#[cfg(any(not(unix), miri))]
mod imp {
    use std::alloc::{self, Layout};
    use std::io;
    use std::ptr::NonNull;

    use tessera_core::VmemError;

    const FALLBACK_PAGE: usize = 4096;

    pub(super) fn query_page_size() -> usize {
        FALLBACK_PAGE
    }

    fn layout(bytes: usize) -> Result<Layout, io::Error> {
        if bytes == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "zero-size reservation",
            ));
        }
        Layout::from_size_align(bytes, FALLBACK_PAGE).map_err(io::Error::other)
    }

    pub(super) fn reserve(bytes: usize) -> Result<NonNull<u8>, VmemError> {
        let layout = layout(bytes).map_err(|source| VmemError::Reserve { bytes, source })?;
        // SAFETY: layout has non-zero size.
        let ptr = unsafe { alloc::alloc_zeroed(layout) };
        NonNull::new(ptr).ok_or_else(|| VmemError::Reserve {
            bytes,
            source: io::Error::new(io::ErrorKind::OutOfMemory, "alloc returned null"),
        })
    }

    pub(super) unsafe fn commit(_base: NonNull<u8>, _bytes: usize) -> Result<(), VmemError> {
        Ok(())
    }

    pub(super) unsafe fn decommit(base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        // SAFETY: the range is inside the block and unreferenced.
        unsafe { std::ptr::write_bytes(base.as_ptr(), 0, bytes) };
        Ok(())
    }

    pub(super) unsafe fn release(base: NonNull<u8>, bytes: usize) -> Result<(), VmemError> {
        let layout = layout(bytes).map_err(|source| VmemError::Release { bytes, source })?;
        // SAFETY: base was allocated by `reserve` with this layout.
        unsafe { alloc::dealloc(base.as_ptr(), layout) };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_power_of_two() {
        assert!(os_page_size().is_power_of_two());
        assert_eq!(PlatformVmem.page_size(), os_page_size());
    }

    #[test]
    fn reserve_commit_write_release() {
        let vm = PlatformVmem;
        let size = vm.page_size() * 4;
        let base = vm.reserve(size).unwrap();
        unsafe {
            vm.commit(base, size).unwrap();
            let slice = std::slice::from_raw_parts_mut(base.as_ptr(), size);
            slice[0] = 42;
            slice[size - 1] = 7;
            assert_eq!(slice[0], 42);
            vm.release(base, size).unwrap();
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn decommit_then_recommit_reads_zero() {
        let vm = PlatformVmem;
        let size = vm.page_size();
        let base = vm.reserve(size).unwrap();
        unsafe {
            vm.commit(base, size).unwrap();
            *base.as_ptr() = 99;
            vm.decommit(base, size).unwrap();
            vm.commit(base, size).unwrap();
            assert_eq!(*base.as_ptr(), 0);
            vm.release(base, size).unwrap();
        }
    }

    #[test]
    fn reserve_zero_bytes_fails() {
        assert!(matches!(
            PlatformVmem.reserve(0),
            Err(VmemError::Reserve { bytes: 0, .. })
        ));
    }

    #[test]
    fn boxed_vmem_forwards() {
        let vm: Box<dyn VirtualMemory> = Box::new(PlatformVmem);
        let size = vm.page_size();
        let base = vm.reserve(size).unwrap();
        unsafe { vm.release(base, size).unwrap() };
    }
}
