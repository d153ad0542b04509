//! Consistency-checker regression tests (spec.md §4.9), compiled only under
//! the default-on `check` feature.
#![cfg(feature = "check")]

mod common;

use common::VecRegion;
use segheap::Allocator;

fn fresh() -> Allocator<VecRegion> {
    Allocator::init(VecRegion::new()).unwrap()
}

#[test]
fn empty_heap_checks_out() {
    let heap = fresh();
    assert!(heap.check());
}

#[test]
fn heap_survives_a_mixed_workload() {
    let mut heap = fresh();

    let mut live = Vec::new();
    for size in [16, 32, 64, 128, 24, 48, 96] {
        live.push(heap.allocate(size).unwrap());
    }
    // Free every other allocation to exercise both the allocated-neighbor
    // and free-neighbor coalescing paths.
    for (i, p) in live.iter().enumerate() {
        if i % 2 == 0 {
            heap.free(*p);
        }
    }
    assert!(heap.check());

    for size in [8, 256, 40] {
        heap.allocate(size);
    }
    assert!(heap.check());
}

#[test]
fn realloc_heavy_workload_stays_consistent() {
    let mut heap = fresh();

    let mut p = heap.allocate(16).unwrap();
    for size in [32, 8, 128, 64, 256, 16] {
        p = heap.reallocate(Some(p), size).unwrap();
        assert!(heap.check());
    }
}

#[test]
fn small_block_primer_bursts_preserve_consistency() {
    let mut heap = fresh();

    // Enough small requests to trigger both the <=32 and <=80 footprint
    // priming tiers (spec.md §4.4 step 2) several times over.
    let mut live = Vec::new();
    for _ in 0..20 {
        live.push(heap.allocate(8).unwrap());
        live.push(heap.allocate(48).unwrap());
    }
    assert!(heap.check());

    for p in live {
        heap.free(p);
    }
    assert!(heap.check());
}
