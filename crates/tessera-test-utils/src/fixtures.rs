//! Worlds and values shared by test suites.
//!
//! - [`auto_world`] / [`arena_world`] / [`recorded_arena_world`] build
//!   worlds for each backend.
//! - [`int64`], [`string`] and [`entry`] build common values.
//! - [`strings`] and [`ints`] read list contents back.

use std::sync::Arc;

use tessera_arena::ArenaConfig;
use tessera_core::{Integer, ValueType};
use tessera_value::{Dictionary, List, Value, World, WorldConfig};

use crate::vmem::{RecordingVmem, VmemCounts};

/// A world on the host allocator.
pub fn auto_world() -> World {
    World::new(&WorldConfig::auto()).expect("auto world")
}

/// An arena world reserving `capacity` bytes with the default page size.
pub fn arena_world(capacity: usize) -> World {
    World::new(&WorldConfig::arena(capacity)).expect("arena world")
}

/// An arena world whose OS calls are counted.
pub fn recorded_arena_world(config: ArenaConfig) -> (World, Arc<VmemCounts>) {
    let (vmem, counts) = RecordingVmem::boxed();
    let world = World::with_vmem(&WorldConfig::with_arena(config), vmem).expect("arena world");
    (world, counts)
}

/// A signed 64-bit Integer.
pub fn int64(world: &World, n: i64) -> Value<'_> {
    Value::new_integer(world, Integer::I64(n)).expect("integer")
}

/// A String.
pub fn string<'w>(world: &'w World, s: &str) -> Value<'w> {
    Value::new_str(world, s).expect("string")
}

/// A `Pair(String, Integer)` dictionary entry.
pub fn entry<'w>(world: &'w World, key: &str, n: i64) -> Value<'w> {
    Value::new_pair(world, string(world, key), int64(world, n)).expect("pair")
}

/// A List of signed 64-bit Integers.
pub fn int_list<'w>(world: &'w World, items: &[i64]) -> Value<'w> {
    Value::new_list(
        world,
        ValueType::Integer,
        items.iter().map(|&n| int64(world, n)),
    )
    .expect("list")
}

/// The decoded Strings of a list.
pub fn strings(list: &List<'_>) -> Vec<String> {
    list.iter().map(|v| v.as_string().to_string()).collect()
}

/// The Integers of a list, widened.
pub fn ints(list: &List<'_>) -> Vec<i128> {
    list.iter().map(|v| v.as_integer().to_i128()).collect()
}

/// `(String key, Integer value)` entries in iteration order.
pub fn string_int_entries(dict: &Dictionary<'_>) -> Vec<(String, i128)> {
    dict.iter()
        .map(|(k, v)| (k.as_string().to_string(), v.as_integer().to_i128()))
        .collect()
}
