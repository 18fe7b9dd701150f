//! Allocators for Tessera worlds.
//!
//! Two backends share one chunk layout and one interface
//! ([`RawAllocator`]):
//!
//! ```text
//! Allocator (fixed per world)
//! ├── Auto(SysAlloc)   host malloc; chunks freed one by one
//! └── Arena(Arena)     reserve once, commit on demand, release in bulk
//!     └── VirtualMemory (PlatformVmem: mmap / mprotect / madvise / munmap)
//! ```
//!
//! Each chunk is preceded by a [`ChunkHeader`] holding the payload size and
//! honoured alignment. Chunks are zeroed on allocation and aligned to at
//! least 8 bytes.
//!
//! Unsafe code is confined to the modules that touch raw memory; each of
//! them opts in explicitly.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod allocator;
pub mod arena;
pub mod chunk;
pub mod config;
pub mod sys;
pub mod vmem;

pub use allocator::{Allocator, AllocatorKind, RawAllocator};
pub use arena::Arena;
pub use chunk::{ChunkHeader, HEADER_SIZE, MIN_ALIGN};
pub use config::{AllocatorConfig, ArenaConfig};
pub use sys::SysAlloc;
pub use vmem::{os_page_size, PlatformVmem, VirtualMemory};
