//! Error types for Tessera worlds, organised by subsystem.
//!
//! Recoverable failures are returned as values: OS virtual-memory failures
//! ([`VmemError`]), allocator failures ([`AllocError`]), configuration
//! problems ([`ConfigError`]) and world construction failures
//! ([`WorldError`]). Precondition violations are not represented here; they
//! are fatal and go through [`crate::diagnostics`].

use std::io;

use thiserror::Error;

/// Failures reported by the OS virtual-memory layer.
#[derive(Debug, Error)]
pub enum VmemError {
    /// Reserving an address range failed.
    #[error("could not reserve {bytes} bytes of address space: {source}")]
    Reserve {
        /// Size of the requested reservation.
        bytes: usize,
        /// The OS error.
        #[source]
        source: io::Error,
    },
    /// Committing pages inside a reservation failed.
    #[error("could not commit {bytes} bytes of memory: {source}")]
    Commit {
        /// Number of bytes the commit covered.
        bytes: usize,
        /// The OS error.
        #[source]
        source: io::Error,
    },
    /// Decommitting pages inside a reservation failed.
    #[error("could not decommit {bytes} bytes of memory: {source}")]
    Decommit {
        /// Number of bytes the decommit covered.
        bytes: usize,
        /// The OS error.
        #[source]
        source: io::Error,
    },
    /// Releasing a reservation failed.
    #[error("could not release {bytes} bytes of address space: {source}")]
    Release {
        /// Size of the reservation being released.
        bytes: usize,
        /// The OS error.
        #[source]
        source: io::Error,
    },
}

/// Failures returned by an allocator.
#[derive(Debug, Error)]
pub enum AllocError {
    /// The arena reservation cannot grow far enough to satisfy the request.
    #[error("arena exhausted: requested {requested} bytes, {available} bytes left in reservation")]
    Exhausted {
        /// Bytes the request needed, including header and padding.
        requested: usize,
        /// Bytes left between the bump pointer and the end of the reservation.
        available: usize,
    },
    /// The system allocator returned no memory.
    #[error("system allocation of {size} bytes aligned to {align} failed")]
    AllocFailed {
        /// Total chunk size requested from the system allocator.
        size: usize,
        /// Alignment requested from the system allocator.
        align: usize,
    },
    /// The OS refused a commit, decommit or release.
    #[error(transparent)]
    Vmem(#[from] VmemError),
}

/// Invalid allocator or world configuration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// Arena page size is not a power of two.
    #[error("arena page size {page_size} is not a power of two")]
    PageSizeNotPowerOfTwo {
        /// The configured page size.
        page_size: usize,
    },
    /// Arena page size is smaller than the OS page size.
    #[error("arena page size {page_size} is below the OS page size {os_page_size}")]
    PageSizeBelowOs {
        /// The configured page size.
        page_size: usize,
        /// The OS page size.
        os_page_size: usize,
    },
    /// Arena capacity is zero.
    #[error("arena capacity must be non-zero")]
    ZeroCapacity,
    /// Rounding the capacity up to a whole page overflowed.
    #[error("arena capacity {capacity} overflows when rounded up to page size {page_size}")]
    CapacityOverflow {
        /// The configured capacity.
        capacity: usize,
        /// The configured page size.
        page_size: usize,
    },
    /// An environment variable held an unusable value.
    #[error("invalid value {value:?} for {key}")]
    InvalidEnv {
        /// Name of the variable.
        key: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Failures while creating a world.
#[derive(Debug, Error)]
pub enum WorldError {
    /// The configuration was rejected before any memory was touched.
    #[error("world config: {0}")]
    Config(#[from] ConfigError),
    /// The allocator could not be created.
    #[error("world allocator: {0}")]
    Alloc(#[from] AllocError),
}

impl From<VmemError> for WorldError {
    fn from(e: VmemError) -> Self {
        Self::Alloc(AllocError::Vmem(e))
    }
}
