//! Reserve-on-create, commit-on-demand bump arena.
//!
//! An [`Arena`] reserves one contiguous range of address space up front and
//! commits it a page at a time as the bump pointer advances. All positions
//! are kept as byte offsets from the reservation base:
//!
//! ```text
//! base                bump         committed              reserved
//!  |--[hdr|payload]...--|-------------|-----------------------|
//!       live chunks      committed,     reserved, no access
//!                        unused
//! ```
//!
//! `0 <= bump <= committed <= reserved`, and `committed` and `reserved` are
//! multiples of the page size. The chunk ending exactly at `bump` is the
//! tail: it can grow, shrink and be freed in place. Other chunks are freed
//! by zeroing them; their space is not reused until the arena is released.

#![allow(unsafe_code)]

use std::fmt;
use std::ptr::{self, NonNull};

use tessera_core::{precondition, AllocError, VmemError, WorldError};
use tracing::{debug, error};

use crate::chunk::{align_up, normalize_align, payload_bytes, ChunkHeader, HEADER_SIZE};
use crate::config::ArenaConfig;
use crate::vmem::{PlatformVmem, VirtualMemory};

/// A bump allocator over a reserved virtual-memory range.
pub struct Arena {
    vmem: Box<dyn VirtualMemory>,
    base: NonNull<u8>,
    page_size: usize,
    reserved: usize,
    committed: usize,
    bump: usize,
    live_bytes: usize,
    released: bool,
}

impl Arena {
    /// Reserve an arena from the host OS.
    pub fn new(config: &ArenaConfig) -> Result<Self, WorldError> {
        Self::with_vmem(config, Box::new(PlatformVmem))
    }

    /// Reserve an arena through a caller-supplied virtual-memory layer.
    pub fn with_vmem(
        config: &ArenaConfig,
        vmem: Box<dyn VirtualMemory>,
    ) -> Result<Self, WorldError> {
        let reserved = config.validate(vmem.page_size())?;
        let base = vmem.reserve(reserved)?;
        debug!(
            reserved,
            page_size = config.page_size,
            base = ?base,
            "arena reserved"
        );
        Ok(Self {
            vmem,
            base,
            page_size: config.page_size,
            reserved,
            committed: 0,
            bump: 0,
            live_bytes: 0,
            released: false,
        })
    }

    /// Allocate `size * count` zeroed bytes aligned to `align`.
    ///
    /// `align` of zero means 8; smaller alignments are raised to 8.
    pub fn allocate(
        &mut self,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.check_live();
        let align = normalize_align(align);
        let payload = payload_bytes(size, count).ok_or_else(|| self.exhausted(usize::MAX))?;
        let (payload_off, end) = self.place(self.bump, align, payload)?;
        self.ensure_committed(end)?;

        let ptr = self.ptr_at(payload_off);
        // SAFETY: [payload_off - HEADER_SIZE, end) is committed and unused.
        unsafe {
            ChunkHeader {
                size: payload,
                alignment: align,
            }
            .write(ptr);
            ptr::write_bytes(ptr.as_ptr(), 0, payload);
        }
        self.bump = end;
        self.live_bytes += HEADER_SIZE + payload;
        Ok(ptr)
    }

    /// Resize the chunk at `ptr` to `size * count` bytes aligned to `align`.
    ///
    /// The tail chunk is resized in place when its address already satisfies
    /// `align`. Any other chunk is copied into a fresh allocation; the old
    /// chunk becomes dead space.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk returned by this arena.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        self.check_live();
        let off = self.offset_of(ptr);
        // SAFETY: ptr is a chunk of this arena.
        let header = unsafe { ChunkHeader::read(ptr) };
        precondition!(header.is_live(), "reallocating a freed chunk");
        let align = normalize_align(align);
        let payload = payload_bytes(size, count).ok_or_else(|| self.exhausted(usize::MAX))?;

        let old_end = off + header.size;
        let is_tail = old_end == self.bump;
        if is_tail && (ptr.as_ptr() as usize) % align == 0 {
            let new_end = match off.checked_add(payload) {
                Some(end) if end <= self.reserved => end,
                _ => {
                    return Err(AllocError::Exhausted {
                        requested: payload.saturating_sub(header.size),
                        available: self.reserved - self.bump,
                    })
                }
            };
            self.ensure_committed(new_end)?;
            // SAFETY: both ranges lie inside the committed region and belong
            // to the tail chunk or the unused space after it.
            unsafe {
                if new_end > old_end {
                    ptr::write_bytes(self.ptr_at(old_end).as_ptr(), 0, new_end - old_end);
                } else {
                    ptr::write_bytes(self.ptr_at(new_end).as_ptr(), 0, old_end - new_end);
                }
                ChunkHeader {
                    size: payload,
                    alignment: align,
                }
                .write(ptr);
            }
            self.live_bytes = self.live_bytes - header.size + payload;
            self.bump = new_end;
            return Ok(ptr);
        }

        let fresh = self.allocate(align, size, count)?;
        // SAFETY: distinct live chunks never overlap; both hold at least the
        // copied length.
        unsafe {
            ptr::copy_nonoverlapping(ptr.as_ptr(), fresh.as_ptr(), header.size.min(payload));
            ChunkHeader::clear(ptr);
        }
        self.live_bytes -= header.total();
        Ok(fresh)
    }

    /// Free the chunk at `ptr`.
    ///
    /// The chunk is zeroed. Freeing the tail chunk also moves `bump` back to
    /// its header and decommits every whole page above the new `bump`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk returned by this arena and must not be
    /// used afterwards.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        self.check_live();
        let off = self.offset_of(ptr);
        // SAFETY: ptr is a chunk of this arena.
        let header = unsafe { ChunkHeader::read(ptr) };
        precondition!(header.is_live(), "freeing a chunk twice");

        let header_off = off - HEADER_SIZE;
        // SAFETY: the header and payload are committed and owned by the
        // caller, who gives them up here.
        unsafe { ptr::write_bytes(self.ptr_at(header_off).as_ptr(), 0, header.total()) };
        self.live_bytes -= header.total();

        if off + header.size == self.bump {
            self.bump = header_off;
            self.decommit_above_bump()?;
        }
        Ok(())
    }

    /// Release the whole reservation. Every chunk becomes invalid.
    ///
    /// Idempotent; a second call does nothing.
    pub fn release(&mut self) -> Result<(), VmemError> {
        if self.released {
            return Ok(());
        }
        // SAFETY: base/reserved are exactly the reservation made in
        // `with_vmem`; after this no chunk may be used, which callers
        // guarantee by releasing only when the owning world goes away.
        unsafe { self.vmem.release(self.base, self.reserved)? };
        debug!(
            reserved = self.reserved,
            live_bytes = self.live_bytes,
            "arena released"
        );
        self.released = true;
        self.reserved = 0;
        self.committed = 0;
        self.bump = 0;
        self.live_bytes = 0;
        Ok(())
    }

    /// Bytes held by live chunks, headers included.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// Bytes between the base and the bump pointer.
    pub fn used_bytes(&self) -> usize {
        self.bump
    }

    /// Bytes currently committed.
    pub fn committed_bytes(&self) -> usize {
        self.committed
    }

    /// Size of the reservation; zero once released.
    pub fn reserved_bytes(&self) -> usize {
        self.reserved
    }

    /// Commit granularity.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Whether [`release`](Self::release) has run.
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Whether `ptr` points into the used part of this arena.
    pub fn contains(&self, ptr: NonNull<u8>) -> bool {
        let addr = ptr.as_ptr() as usize;
        let base = self.base.as_ptr() as usize;
        !self.released && addr >= base + HEADER_SIZE && addr <= base + self.bump
    }

    fn check_live(&self) {
        precondition!(!self.released, "arena used after release");
    }

    fn offset_of(&self, ptr: NonNull<u8>) -> usize {
        precondition!(
            self.contains(ptr),
            "pointer {ptr:?} does not belong to this arena"
        );
        ptr.as_ptr() as usize - self.base.as_ptr() as usize
    }

    fn ptr_at(&self, off: usize) -> NonNull<u8> {
        debug_assert!(off <= self.reserved);
        // SAFETY: off is within the reservation, so the result is in bounds
        // of the same mapping and non-null.
        unsafe { self.base.add(off) }
    }

    fn exhausted(&self, requested: usize) -> AllocError {
        AllocError::Exhausted {
            requested,
            available: self.reserved - self.bump,
        }
    }

    /// Where a chunk of `payload` bytes aligned to `align` would go if
    /// placed at `from`: (payload offset, end offset).
    fn place(
        &self,
        from: usize,
        align: usize,
        payload: usize,
    ) -> Result<(usize, usize), AllocError> {
        let base = self.base.as_ptr() as usize;
        let placed = (base + from)
            .checked_add(HEADER_SIZE)
            .and_then(|start| align_up(start, align))
            .map(|aligned| aligned - base);
        let end = placed.and_then(|p| p.checked_add(payload).map(|end| (p, end)));
        match end {
            Some((payload_off, end)) if end <= self.reserved => Ok((payload_off, end)),
            Some((_, end)) => Err(self.exhausted(end - from)),
            None => Err(self.exhausted(usize::MAX)),
        }
    }

    fn ensure_committed(&mut self, end: usize) -> Result<(), AllocError> {
        if end <= self.committed {
            return Ok(());
        }
        // `reserved` is a page multiple, so the rounded target never passes it.
        let target = align_up(end, self.page_size).unwrap_or(self.reserved);
        let bytes = target - self.committed;
        // SAFETY: [committed, target) lies inside the reservation.
        unsafe { self.vmem.commit(self.ptr_at(self.committed), bytes)? };
        debug!(from = self.committed, to = target, bytes, "arena commit");
        self.committed = target;
        Ok(())
    }

    fn decommit_above_bump(&mut self) -> Result<(), AllocError> {
        let from = align_up(self.bump, self.page_size).unwrap_or(self.reserved);
        if from >= self.committed {
            return Ok(());
        }
        let bytes = self.committed - from;
        // SAFETY: [from, committed) is committed and holds no live chunk,
        // since every chunk ends at or below bump.
        unsafe { self.vmem.decommit(self.ptr_at(from), bytes)? };
        debug!(from, to = self.committed, bytes, "arena decommit");
        self.committed = from;
        Ok(())
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(error = %e, "arena release failed during drop");
        }
    }
}

impl fmt::Debug for Arena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("base", &self.base)
            .field("page_size", &self.page_size)
            .field("reserved", &self.reserved)
            .field("committed", &self.committed)
            .field("bump", &self.bump)
            .field("live_bytes", &self.live_bytes)
            .field("released", &self.released)
            .finish()
    }
}
