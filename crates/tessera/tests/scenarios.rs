//! End-to-end scenarios across the allocator and value layers.

use std::panic::AssertUnwindSafe;

use tessera::alloc::{Allocator, RawAllocator, HEADER_SIZE};
use tessera::prelude::*;
use tessera::types::Secret;
use tessera_test_utils::fixtures::{
    arena_world, auto_world, entry, int64, recorded_arena_world, string, string_int_entries,
    strings,
};
use tessera_test_utils::{expect_violation, init_tracing, RecordingVmem};

const MIB: usize = 1 << 20;

#[test]
fn arena_world_accounts_every_chunk_and_releases_once() {
    init_tracing();
    let (vmem, counts) = RecordingVmem::boxed();
    let config = AllocatorConfig::Arena(ArenaConfig::new(MIB));
    let mut allocator = Allocator::with_vmem(&config, vmem).unwrap();
    for _ in 0..10_000 {
        allocator.allocate(0, 256, 1).unwrap();
    }
    let world = World::from_parts(allocator, Secret::generate());
    assert_eq!(world.live_bytes(), 10_000 * (256 + HEADER_SIZE));
    world.destroy().unwrap();
    assert_eq!(counts.reserves(), 1);
    assert_eq!(counts.releases(), 1);
}

#[test]
fn replace_first_occurrence() {
    let world = auto_world();
    let mut s = string(&world, "hello world");
    assert!(s
        .as_string_mut()
        .replace(wide("world"), wide("friend"))
        .unwrap());
    assert_eq!(s.as_string().to_string(), "hello friend");
    assert_eq!(s.as_string().size(), 12);
}

#[test]
fn split_omits_empty_segments() {
    let world = arena_world(MIB);
    let s = string(&world, "a,b,,c");
    let parts = s.as_string().split(wide(",")).unwrap();
    assert_eq!(parts.as_list().item_type(), ValueType::String);
    assert_eq!(strings(parts.as_list()), ["a", "b", "c"]);
}

#[test]
fn integer_list_pop_front() {
    let world = arena_world(MIB);
    let mut list = Value::new_list(&world, ValueType::Integer, []).unwrap();
    for n in 1..=3 {
        list.as_list_mut().push_back([int64(&world, n)]).unwrap();
    }
    let popped = list.as_list_mut().pop_front(1);
    assert_eq!(popped[0].as_integer(), Integer::I64(1));
    let l = list.as_list();
    assert_eq!(l.size(), 2);
    assert_eq!(l.first().as_integer(), Integer::I64(2));
    assert_eq!(l.get_at(1).as_integer(), Integer::I64(3));
}

#[test]
fn dictionary_iterates_in_insertion_order() {
    let world = auto_world();
    let dict = Value::new_dictionary(
        &world,
        ValueType::String,
        ValueType::Integer,
        [entry(&world, "x", 1), entry(&world, "y", 2)],
    )
    .unwrap();
    assert_eq!(
        string_int_entries(dict.as_dictionary()),
        [("x".to_string(), 1), ("y".to_string(), 2)]
    );
}

#[test]
fn freeing_the_tail_chunk_rewinds_and_decommits() {
    init_tracing();
    let (vmem, counts) = RecordingVmem::boxed();
    let config = ArenaConfig::new(16 * MIB).with_page_size(MIB);
    let mut arena = tessera::alloc::Arena::with_vmem(&config, vmem).unwrap();
    let mut chunks = Vec::new();
    for _ in 0..10 {
        chunks.push(arena.allocate(0, MIB, 1).unwrap());
    }
    let used = arena.used_bytes();
    let committed = arena.committed_bytes();
    assert_eq!(used, 10 * (MIB + HEADER_SIZE));
    assert_eq!(committed, 11 * MIB);

    let tail = chunks.pop().unwrap();
    unsafe { arena.deallocate(tail).unwrap() };

    assert_eq!(arena.used_bytes(), 9 * (MIB + HEADER_SIZE));
    assert!(counts.decommits() >= 1);
    assert!(counts.decommitted_bytes() >= MIB);
    assert!(arena.committed_bytes() < committed);
    assert!(arena.committed_bytes() >= arena.used_bytes());
    arena.release().unwrap();
    assert_eq!(counts.releases(), 1);
}

#[test]
fn arena_values_share_one_reservation() {
    let (world, counts) = recorded_arena_world(ArenaConfig::new(MIB).with_page_size(64 << 10));
    {
        let s = string(&world, "tessera");
        let list = Value::new_list_from(&s).unwrap();
        assert_eq!(list.as_list().size(), 7);
        let usage = world.arena_usage().unwrap();
        assert_eq!(usage.live, world.live_bytes());
        assert!(usage.used >= usage.live);
    }
    assert_eq!(world.live_bytes(), 0);
    world.destroy().unwrap();
    assert_eq!(counts.reserves(), 1);
    assert_eq!(counts.releases(), 1);
}

#[test]
fn exhausted_arena_reports_an_error() {
    let page = 64 << 10;
    let world = World::new(&WorldConfig::with_arena(
        ArenaConfig::new(page).with_page_size(page),
    ))
    .unwrap();
    let mut s = string(&world, "");
    let err = s.as_string_mut().grow(page).unwrap_err();
    assert!(matches!(err, AllocError::Exhausted { .. }));
    assert_eq!(s.as_string().capacity(), 1);
}

#[test]
fn values_forgotten_in_an_arena_are_reclaimed_in_bulk() {
    let (world, counts) = recorded_arena_world(ArenaConfig::new(MIB).with_page_size(64 << 10));
    std::mem::forget(string(&world, "left behind"));
    assert!(world.live_bytes() > 0);
    world.destroy().unwrap();
    assert_eq!(counts.releases(), 1);
}

#[test]
fn cross_world_insertion_is_a_violation() {
    let a = auto_world();
    let b = auto_world();
    let mut list = Value::new_list(&a, ValueType::Integer, []).unwrap();
    let report = expect_violation(AssertUnwindSafe(|| {
        let _ = list.as_list_mut().push_back([int64(&b, 1)]);
    }));
    assert!(report.contains("different world"), "{report}");
}

#[test]
fn out_of_range_index_is_a_violation() {
    let world = auto_world();
    let s = string(&world, "abc");
    let report = expect_violation(AssertUnwindSafe(|| s.as_string().get_at(3)));
    assert!(report.contains("out of range"), "{report}");
}
