//! The 22-bucket segregated free-list index (spec.md §3, §4.3).
//!
//! Every free block carries two 4-byte fields overlaid on the first eight
//! payload bytes: a "prev" field holding the address of the predecessor
//! entry's *next slot* (or, for the first entry in a bucket, the address of
//! the bucket-head cell itself), and a "next" field holding the address of
//! the successor entry's next slot (or `0` if this is the last entry).
//!
//! Storing *slot addresses* rather than block addresses is the trick that
//! makes [`Allocator::remove_free`] branch-free: a predecessor update always
//! writes through the "prev" field's target, and that target is either
//! another block's next slot or a bucket-head cell — the write is identical
//! either way.

use crate::block;
use crate::engine::Allocator;
use crate::region::HeapRegion;
use crate::tags::TAG_SIZE;

/// Number of size-class buckets in the index.
pub const NUM_BUCKETS: usize = 22;

/// Bytes reserved at the start of the region for the 22 bucket-head cells.
pub const INDEX_ZONE_SIZE: usize = NUM_BUCKETS * TAG_SIZE;

/// Selects the bucket for a payload size.
///
/// Bucket `i` holds blocks with `floor(log2(size)) == i + 3`, clamped into
/// `[0, NUM_BUCKETS - 1]` so that both very small and very large requests
/// land in a valid bucket rather than panicking.
pub fn bucket_of(size: u32) -> usize {
    debug_assert!(size > 0, "size 0 has no valid free-list bucket");
    let highest_bit = 31 - size.leading_zeros();
    let idx = highest_bit as i32 - 3;
    idx.clamp(0, NUM_BUCKETS as i32 - 1) as usize
}

impl<R: HeapRegion> Allocator<R> {
    /// Reads the value stored at a next-slot (or bucket-head cell) address,
    /// decoding it into the absolute address of the successor's next slot.
    ///
    /// Returns `None` when the stored value is the null sentinel `0`.
    pub(crate) fn freelist_next(&self, next_slot_or_head: usize) -> Option<usize> {
        let raw = unsafe { self.read_u32(next_slot_or_head) };
        if raw == 0 {
            None
        } else {
            Some(self.decode_addr(raw))
        }
    }

    /// Inserts a just-freed block at the head of the bucket matching `size`
    /// (spec.md §4.3 "Insert").
    pub(crate) fn insert_free(&mut self, user_ptr: usize, size: u32) {
        let idx = bucket_of(size);
        let head_addr = self.bucket_head_addr(idx);
        let new_next_slot = block::next_slot_addr(user_ptr);
        let new_prev_slot = block::prev_slot_addr(user_ptr);

        let old_head_raw = unsafe { self.read_u32(head_addr) };
        unsafe {
            self.write_u32(new_next_slot, old_head_raw);
            self.write_u32(new_prev_slot, self.encode_addr(head_addr));
        }

        if old_head_raw != 0 {
            let old_first_next_slot = self.decode_addr(old_head_raw);
            let old_first_prev_slot = old_first_next_slot - TAG_SIZE;
            unsafe { self.write_u32(old_first_prev_slot, self.encode_addr(new_next_slot)) };
        }

        unsafe { self.write_u32(head_addr, self.encode_addr(new_next_slot)) };
    }

    /// Removes a free block from whichever bucket currently holds it
    /// (spec.md §4.3 "Remove").
    pub(crate) fn remove_free(&mut self, user_ptr: usize) {
        let next_slot = block::next_slot_addr(user_ptr);
        let prev_slot = block::prev_slot_addr(user_ptr);

        let succ_raw = unsafe { self.read_u32(next_slot) };
        let prev_raw = unsafe { self.read_u32(prev_slot) };

        if succ_raw != 0 {
            let succ_next_slot = self.decode_addr(succ_raw);
            let succ_prev_slot = succ_next_slot - TAG_SIZE;
            unsafe { self.write_u32(succ_prev_slot, prev_raw) };
        }

        // `prev_raw` addresses either another block's next slot or a
        // bucket-head cell (see module docs) — the write is the same. The
        // only thing distinguishing the two cases is whether `target` falls
        // below the user zone (an index-zone head cell) or above it (an
        // in-block next slot); either way it must still be a real address
        // within memory this allocator owns.
        let target = self.decode_addr(prev_raw);
        debug_assert!(
            target < self.heap_high_abs(),
            "removal target {target:#x} falls outside the heap (high={:#x})",
            self.heap_high_abs()
        );
        unsafe { self.write_u32(target, succ_raw) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_boundaries_match_floor_log2_minus_three() {
        assert_eq!(bucket_of(8), 0);
        assert_eq!(bucket_of(15), 0);
        assert_eq!(bucket_of(16), 1);
        assert_eq!(bucket_of(32), 2);
        assert_eq!(bucket_of(64), 3);
        assert_eq!(bucket_of(1 << 24), NUM_BUCKETS - 1);
    }

    #[test]
    fn bucket_clamps_at_the_top() {
        assert_eq!(bucket_of(u32::MAX), NUM_BUCKETS - 1);
    }
}
