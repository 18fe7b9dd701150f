//! Benchmark profiles for Tessera.
//!
//! - [`arena_profile`]: an arena world sized for the benches
//! - [`word_list`]: a deterministic comma-separated text for string benches

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use tessera_arena::ArenaConfig;
use tessera_core::WorldError;
use tessera_value::{World, WorldConfig};

/// Arena reservation used by every bench world.
pub const BENCH_ARENA_CAPACITY: usize = 256 << 20;

/// Commit granularity used by every bench world.
pub const BENCH_PAGE_SIZE: usize = 1 << 20;

/// An arena world reserving [`BENCH_ARENA_CAPACITY`] bytes.
pub fn arena_profile() -> Result<World, WorldError> {
    World::new(&WorldConfig::with_arena(
        ArenaConfig::new(BENCH_ARENA_CAPACITY).with_page_size(BENCH_PAGE_SIZE),
    ))
}

/// `count` short words joined by commas, with an empty segment every
/// seventh word.
pub fn word_list(count: usize) -> String {
    let mut out = String::new();
    for i in 0..count {
        if i > 0 {
            out.push(',');
        }
        if i % 7 != 6 {
            out.push_str(&format!("w{i}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_list_shape() {
        assert_eq!(word_list(3), "w0,w1,w2");
        assert_eq!(word_list(8).split(',').filter(|s| s.is_empty()).count(), 1);
    }

    #[test]
    fn arena_profile_builds() {
        let world = arena_profile().unwrap();
        assert_eq!(world.arena_usage().unwrap().reserved, BENCH_ARENA_CAPACITY);
    }
}
