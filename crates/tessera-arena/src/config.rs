//! Allocator configuration parameters.

use tessera_core::ConfigError;

/// Configuration for an [`Arena`](crate::Arena).
///
/// Validated at arena construction; immutable afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Requested reservation size in bytes. Rounded up to a whole number of
    /// pages when the arena is created.
    pub capacity: usize,

    /// Commit granularity in bytes.
    ///
    /// Default: 64 MiB, which keeps commit calls rare. Must be a power of two
    /// and at least the OS page size.
    pub page_size: usize,
}

impl ArenaConfig {
    /// Default commit granularity: 64 MiB.
    pub const DEFAULT_PAGE_SIZE: usize = 64 * 1024 * 1024;

    /// Default reservation: 256 MiB of address space.
    pub const DEFAULT_CAPACITY: usize = 256 * 1024 * 1024;

    /// Create a config reserving `capacity` bytes with the default page size.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    /// Replace the page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Check the config against the OS page size and return the size of the
    /// reservation it describes (capacity rounded up to a page multiple).
    pub fn validate(&self, os_page_size: usize) -> Result<usize, ConfigError> {
        if !self.page_size.is_power_of_two() {
            return Err(ConfigError::PageSizeNotPowerOfTwo {
                page_size: self.page_size,
            });
        }
        if self.page_size < os_page_size {
            return Err(ConfigError::PageSizeBelowOs {
                page_size: self.page_size,
                os_page_size,
            });
        }
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        self.capacity
            .checked_next_multiple_of(self.page_size)
            .ok_or(ConfigError::CapacityOverflow {
                capacity: self.capacity,
                page_size: self.page_size,
            })
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

/// Which allocator a world uses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum AllocatorConfig {
    /// Host allocator; every value must be freed individually.
    #[default]
    Auto,
    /// Reserve/commit arena; released in bulk with the world.
    Arena(ArenaConfig),
}
