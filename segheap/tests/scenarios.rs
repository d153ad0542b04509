//! End-to-end scenarios from spec.md §8, run against the `VecRegion` test
//! harness in `tests/common`.

mod common;

use common::VecRegion;
use segheap::Allocator;

fn fresh() -> Allocator<VecRegion> {
    Allocator::init(VecRegion::new()).expect("init over a fresh VecRegion never fails")
}

#[test]
fn exact_fit_reuse() {
    let mut heap = fresh();

    let a = heap.allocate(24).unwrap();
    heap.free(a);
    let b = heap.allocate(24).unwrap();

    assert_eq!(b, a, "an exact-size free block should be reused as-is");
}

#[test]
fn split_on_oversize() {
    let mut heap = fresh();

    let a = heap.allocate(128).unwrap();
    heap.free(a);
    let b = heap.allocate(32).unwrap();

    assert_eq!(b, a);
    let remainder_ptr = a + 32 + 16;
    let (size, allocated) = unsafe { heap.block_tag_at(remainder_ptr) };
    assert!(!allocated);
    assert_eq!(size, 128 - 32 - 16);
}

#[test]
fn coalesce_three_way() {
    let mut heap = fresh();

    let a = heap.allocate(32).unwrap();
    let b = heap.allocate(32).unwrap();
    let c = heap.allocate(32).unwrap();

    heap.free(a);
    heap.free(c);
    heap.free(b);

    let (size, allocated) = unsafe { heap.block_tag_at(a) };
    assert!(!allocated);
    assert_eq!(size, 32 * 3 + 16 * 2);
}

#[test]
fn realloc_shrink_splits() {
    let mut heap = fresh();

    let a = heap.allocate(128).unwrap();
    let r = heap.reallocate(Some(a), 32).unwrap();

    assert_eq!(r, a);
    let (size, allocated) = unsafe { heap.block_tag_at(a + 32 + 16) };
    assert!(!allocated);
    assert_eq!(size, 80);
}

#[test]
fn realloc_tail_extend() {
    let mut heap = fresh();

    let a = heap.allocate(64).unwrap();
    let r = heap.reallocate(Some(a), 128).unwrap();

    assert_eq!(r, a);
    let (size, allocated) = unsafe { heap.block_tag_at(a) };
    assert!(allocated);
    assert_eq!(size, 128);
}

#[test]
fn realloc_with_backward_coalesce() {
    let mut heap = fresh();

    let a = heap.allocate(48).unwrap();
    let b = heap.allocate(48).unwrap();

    let pattern: Vec<u8> = (0..48u8).collect();
    unsafe { core::ptr::copy_nonoverlapping(pattern.as_ptr(), b as *mut u8, pattern.len()) };

    heap.free(a);
    let r = heap.reallocate(Some(b), 96).unwrap();

    assert_eq!(r, a, "growth should shift the base backward into the freed predecessor");
    let preserved = unsafe { core::slice::from_raw_parts(r as *const u8, 48) };
    assert_eq!(preserved, &pattern[..]);
}

#[cfg(feature = "check")]
#[test]
fn every_scenario_leaves_a_consistent_heap() {
    let mut heap = fresh();
    let a = heap.allocate(128).unwrap();
    let b = heap.allocate(48).unwrap();
    heap.free(a);
    let _ = heap.reallocate(Some(b), 96);
    assert!(heap.check());
}
