//! System-allocator backend with the arena's chunk layout.
//!
//! Chunks carry the same [`ChunkHeader`] as arena chunks so the `Layout`
//! needed by `dealloc` and `realloc` can be recovered from the payload
//! address alone. The header sits at the end of a prefix that is a multiple
//! of the chunk alignment:
//!
//! ```text
//! block                      payload
//!  |--[pad][size|alignment]--|-------...
//!   <-------- prefix -------->
//! ```

#![allow(unsafe_code)]

use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use tessera_core::{precondition, AllocError};

use crate::chunk::{normalize_align, payload_bytes, ChunkHeader, HEADER_SIZE};

/// Allocator backed by the host's `malloc` family.
///
/// Nothing is released in bulk: every chunk must be freed individually.
#[derive(Debug, Default)]
pub struct SysAlloc {
    live_bytes: usize,
}

fn prefix(align: usize) -> usize {
    HEADER_SIZE.max(align)
}

fn layout(align: usize, payload: usize) -> Result<Layout, AllocError> {
    prefix(align)
        .checked_add(payload)
        .and_then(|size| Layout::from_size_align(size, align).ok())
        .ok_or(AllocError::AllocFailed {
            size: usize::MAX,
            align,
        })
}

impl SysAlloc {
    /// A fresh allocator with nothing live.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate `size * count` zeroed bytes aligned to `align`.
    pub fn allocate(
        &mut self,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let align = normalize_align(align);
        let payload = payload_bytes(size, count).ok_or(AllocError::AllocFailed {
            size: usize::MAX,
            align,
        })?;
        let layout = layout(align, payload)?;
        // SAFETY: layout has non-zero size (the prefix is at least a header).
        let block = unsafe { alloc::alloc_zeroed(layout) };
        let block = NonNull::new(block).ok_or(AllocError::AllocFailed {
            size: layout.size(),
            align,
        })?;
        // SAFETY: prefix(align) < layout.size(), so the payload is in bounds.
        let ptr = unsafe { block.add(prefix(align)) };
        // SAFETY: the header fits in the prefix just before the payload.
        unsafe {
            ChunkHeader {
                size: payload,
                alignment: align,
            }
            .write(ptr)
        };
        self.live_bytes += HEADER_SIZE + payload;
        Ok(ptr)
    }

    /// Resize the chunk at `ptr`.
    ///
    /// Uses `realloc` when the alignment is unchanged, otherwise allocates,
    /// copies and frees. Grown bytes are zeroed.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk returned by this allocator.
    pub unsafe fn reallocate(
        &mut self,
        ptr: NonNull<u8>,
        align: usize,
        size: usize,
        count: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        // SAFETY: ptr is a live chunk of ours.
        let header = unsafe { ChunkHeader::read(ptr) };
        precondition!(header.is_live(), "reallocating a freed chunk");
        let align = normalize_align(align);

        if align != header.alignment {
            let fresh = self.allocate(align, size, count)?;
            // SAFETY: distinct blocks; both hold the copied length.
            unsafe {
                ptr::copy_nonoverlapping(
                    ptr.as_ptr(),
                    fresh.as_ptr(),
                    header.size.min(size.saturating_mul(count)),
                );
                self.deallocate(ptr)?;
            }
            return Ok(fresh);
        }

        let payload = payload_bytes(size, count).ok_or(AllocError::AllocFailed {
            size: usize::MAX,
            align,
        })?;
        let old_layout = layout(align, header.size)?;
        let new_layout = layout(align, payload)?;
        // SAFETY: the block was allocated with `old_layout`; the new size is
        // non-zero and valid for this alignment.
        let block = unsafe {
            alloc::realloc(
                ptr.as_ptr().sub(prefix(align)),
                old_layout,
                new_layout.size(),
            )
        };
        let block = NonNull::new(block).ok_or(AllocError::AllocFailed {
            size: new_layout.size(),
            align,
        })?;
        // SAFETY: the payload and any grown tail are inside the new block.
        let fresh = unsafe {
            let fresh = block.add(prefix(align));
            if payload > header.size {
                ptr::write_bytes(fresh.as_ptr().add(header.size), 0, payload - header.size);
            }
            ChunkHeader {
                size: payload,
                alignment: align,
            }
            .write(fresh);
            fresh
        };
        self.live_bytes = self.live_bytes - header.size + payload;
        Ok(fresh)
    }

    /// Free the chunk at `ptr`.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live chunk returned by this allocator and must not be
    /// used afterwards.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) -> Result<(), AllocError> {
        // SAFETY: ptr is a live chunk of ours.
        let header = unsafe { ChunkHeader::read(ptr) };
        precondition!(header.is_live(), "freeing a chunk with a cleared header");
        let layout = layout(header.alignment, header.size)?;
        // SAFETY: the block starts `prefix` bytes before the payload and was
        // allocated with exactly this layout.
        unsafe {
            ChunkHeader::clear(ptr);
            alloc::dealloc(ptr.as_ptr().sub(prefix(header.alignment)), layout);
        }
        self.live_bytes -= header.total();
        Ok(())
    }

    /// Bytes held by live chunks, headers included.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }
}
