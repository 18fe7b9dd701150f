//! Chunk headers and alignment arithmetic shared by both allocators.
//!
//! Every chunk handed out is preceded by a [`ChunkHeader`] recording the
//! payload size and the alignment that was honoured, so reallocation and
//! deallocation need only the payload address.

#![allow(unsafe_code)]

use std::mem;
use std::ptr::NonNull;

use tessera_core::precondition;

/// Bookkeeping stored immediately before each payload.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[repr(C)]
pub struct ChunkHeader {
    /// Payload bytes.
    pub size: usize,
    /// Alignment of the payload. Zero marks a cleared (dead) header.
    pub alignment: usize,
}

/// Size of a chunk header in bytes.
pub const HEADER_SIZE: usize = mem::size_of::<ChunkHeader>();

/// Smallest alignment any chunk gets.
pub const MIN_ALIGN: usize = 8;

impl ChunkHeader {
    /// Header plus payload bytes.
    pub fn total(&self) -> usize {
        HEADER_SIZE + self.size
    }

    /// Whether this header describes a live chunk.
    pub fn is_live(&self) -> bool {
        self.alignment != 0
    }

    /// Read the header in front of `payload`.
    ///
    /// # Safety
    ///
    /// `payload` must have been returned by one of this crate's allocators
    /// and its storage must still be mapped.
    pub unsafe fn read(payload: NonNull<u8>) -> Self {
        // SAFETY: the header sits HEADER_SIZE bytes before every payload and
        // is aligned to MIN_ALIGN, which satisfies align_of::<ChunkHeader>().
        unsafe { header_ptr(payload).read() }
    }

    /// Write this header in front of `payload`.
    ///
    /// # Safety
    ///
    /// As for [`read`](Self::read), and the caller must own the chunk.
    pub unsafe fn write(self, payload: NonNull<u8>) {
        // SAFETY: see `read`.
        unsafe { header_ptr(payload).write(self) }
    }

    /// Zero the header in front of `payload`.
    ///
    /// # Safety
    ///
    /// As for [`write`](Self::write).
    pub unsafe fn clear(payload: NonNull<u8>) {
        // SAFETY: see `read`.
        unsafe { header_ptr(payload).write(ChunkHeader::default()) }
    }
}

unsafe fn header_ptr(payload: NonNull<u8>) -> *mut ChunkHeader {
    // SAFETY: the caller guarantees a header precedes the payload.
    unsafe { payload.as_ptr().sub(HEADER_SIZE).cast::<ChunkHeader>() }
}

/// Raise `align` to at least [`MIN_ALIGN`]; zero means the default.
///
/// A non-power-of-two alignment is a precondition violation.
pub fn normalize_align(align: usize) -> usize {
    if align == 0 {
        return MIN_ALIGN;
    }
    precondition!(
        align.is_power_of_two(),
        "alignment {align} is not a power of two"
    );
    align.max(MIN_ALIGN)
}

/// Round `value` up to a multiple of the power of two `align`.
///
/// Returns `None` on overflow.
pub fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    value.checked_add(align - 1).map(|v| v & !(align - 1))
}

/// `size * count`, the payload of an allocation request.
///
/// Zero `size` or `count` is a precondition violation. Returns `None` on
/// overflow.
pub fn payload_bytes(size: usize, count: usize) -> Option<usize> {
    precondition!(size > 0, "allocation size must be non-zero");
    precondition!(count > 0, "allocation count must be non-zero");
    size.checked_mul(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_two_words() {
        assert_eq!(HEADER_SIZE, 2 * mem::size_of::<usize>());
        assert_eq!(HEADER_SIZE % MIN_ALIGN, 0);
    }

    #[test]
    fn zero_alignment_defaults_to_eight() {
        assert_eq!(normalize_align(0), 8);
    }

    #[test]
    fn small_alignment_is_raised() {
        assert_eq!(normalize_align(1), 8);
        assert_eq!(normalize_align(4), 8);
        assert_eq!(normalize_align(64), 64);
    }

    #[test]
    #[should_panic(expected = "not a power of two")]
    fn odd_alignment_is_a_violation() {
        normalize_align(24);
    }

    #[test]
    fn align_up_rounds() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(16, 16), Some(16));
        assert_eq!(align_up(usize::MAX, 8), None);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn zero_count_is_a_violation() {
        payload_bytes(8, 0);
    }

    #[test]
    fn payload_overflow_is_none() {
        assert_eq!(payload_bytes(usize::MAX, 2), None);
        assert_eq!(payload_bytes(16, 4), Some(64));
    }

    #[test]
    fn header_roundtrips_through_memory() {
        let mut buf = [0u64; 4];
        let payload = NonNull::new(unsafe { buf.as_mut_ptr().cast::<u8>().add(HEADER_SIZE) })
            .unwrap();
        let h = ChunkHeader {
            size: 24,
            alignment: 8,
        };
        unsafe {
            h.write(payload);
            assert_eq!(ChunkHeader::read(payload), h);
            ChunkHeader::clear(payload);
            assert!(!ChunkHeader::read(payload).is_live());
        }
    }
}
