//! World configuration and its environment overrides.

use tessera_arena::{AllocatorConfig, ArenaConfig};
use tessera_core::ConfigError;

/// Selects `auto` or `arena`.
pub const ENV_ALLOCATOR: &str = "TESSERA_ALLOCATOR";
/// Arena reservation size in bytes; `k`, `m` and `g` suffixes accepted.
pub const ENV_ARENA_CAPACITY: &str = "TESSERA_ARENA_CAPACITY";
/// Arena page size in bytes; `k`, `m` and `g` suffixes accepted.
pub const ENV_ARENA_PAGE_SIZE: &str = "TESSERA_ARENA_PAGE_SIZE";

/// Configuration for a [`World`](crate::World).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WorldConfig {
    /// Allocator backend. Fixed for the world's lifetime.
    pub allocator: AllocatorConfig,
}

impl WorldConfig {
    /// Use the host allocator.
    pub fn auto() -> Self {
        Self {
            allocator: AllocatorConfig::Auto,
        }
    }

    /// Use an arena reserving `capacity` bytes with the default page size.
    pub fn arena(capacity: usize) -> Self {
        Self::with_arena(ArenaConfig::new(capacity))
    }

    /// Use an arena with explicit parameters.
    pub fn with_arena(config: ArenaConfig) -> Self {
        Self {
            allocator: AllocatorConfig::Arena(config),
        }
    }

    /// Read the configuration from the process environment.
    ///
    /// Unset variables fall back to defaults: the host allocator, and for an
    /// arena [`ArenaConfig::DEFAULT_CAPACITY`] and
    /// [`ArenaConfig::DEFAULT_PAGE_SIZE`].
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env) with a caller-supplied lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let kind = lookup(ENV_ALLOCATOR);
        match kind.as_deref().map(str::trim) {
            None | Some("") => Ok(Self::auto()),
            Some(s) if s.eq_ignore_ascii_case("auto") => Ok(Self::auto()),
            Some(s) if s.eq_ignore_ascii_case("arena") => {
                let mut config = ArenaConfig::default();
                if let Some(raw) = lookup(ENV_ARENA_CAPACITY) {
                    config.capacity = parse_size(ENV_ARENA_CAPACITY, &raw)?;
                }
                if let Some(raw) = lookup(ENV_ARENA_PAGE_SIZE) {
                    config.page_size = parse_size(ENV_ARENA_PAGE_SIZE, &raw)?;
                }
                Ok(Self::with_arena(config))
            }
            Some(other) => Err(ConfigError::InvalidEnv {
                key: ENV_ALLOCATOR,
                value: other.to_string(),
            }),
        }
    }
}

/// Parse a byte count such as `4096`, `64k`, `64M` or `1g`.
pub fn parse_size(key: &'static str, raw: &str) -> Result<usize, ConfigError> {
    let invalid = || ConfigError::InvalidEnv {
        key,
        value: raw.to_string(),
    };
    let s = raw.trim();
    let (digits, shift) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 10),
        Some((i, 'm' | 'M')) => (&s[..i], 20),
        Some((i, 'g' | 'G')) => (&s[..i], 30),
        Some(_) => (s, 0),
        None => return Err(invalid()),
    };
    let n: usize = digits.trim().parse().map_err(|_| invalid())?;
    n.checked_mul(1usize << shift).ok_or_else(invalid)
}
