//! The consistency checker: an address walk and a free-list walk over the
//! whole heap (spec.md §4.9). Compiled only under the `check` feature so a
//! minimal build can shave it out, the way the teacher's `kernel` crate
//! gates subsystems behind explicit feature opt-in.

use crate::block;
use crate::freelist::{self, NUM_BUCKETS};
use crate::region::HeapRegion;
use crate::tags::{is_allocated, size_of, TAG_SIZE};
use crate::Allocator;

impl<R: HeapRegion> Allocator<R> {
    /// Runs both passes and returns whether the heap is internally
    /// consistent. Never mutates the heap; failures are logged via
    /// `log::warn!` before returning `false`.
    pub fn check(&self) -> bool {
        let address_ok = self.address_walk();
        let list_ok = self.list_walk();
        address_ok && list_ok
    }

    /// Walks every block from the user-zone low-water to the heap high,
    /// verifying header/footer agreement, the no-two-adjacent-free-blocks
    /// invariant, and that every free block is reachable through its
    /// bucket.
    fn address_walk(&self) -> bool {
        let mut ok = true;
        let heap_high = self.heap_high_abs();
        let mut user_ptr = self.user_zone_low_abs() + 2 * TAG_SIZE;
        let mut prev_was_free = false;

        while block::header_addr(user_ptr) < heap_high {
            let header = self.read_header(user_ptr);
            let size = size_of(header);
            let footer = unsafe { self.read_u32(block::footer_addr(user_ptr, size)) };

            if header != footer {
                log::warn!("segheap: check: header/footer mismatch at {user_ptr:#x}");
                ok = false;
            }

            let is_free = !is_allocated(header);
            if is_free {
                if prev_was_free {
                    log::warn!("segheap: check: two adjacent free blocks, second at {user_ptr:#x}");
                    ok = false;
                }
                // A size-0 remainder from a zero-slack split is tagged free
                // but deliberately left out of every bucket (see
                // `engine::split_and_allocate`) — it has no bucket to be
                // reachable from.
                if size > 0 && !self.free_block_reachable(user_ptr, size) {
                    log::warn!("segheap: check: free block at {user_ptr:#x} not reachable via its bucket");
                    ok = false;
                }
            }

            prev_was_free = is_free;
            user_ptr = block::next_block_header(user_ptr, size) + TAG_SIZE;
        }
        ok
    }

    fn free_block_reachable(&self, user_ptr: usize, size: u32) -> bool {
        let idx = freelist::bucket_of(size);
        let mut cursor = self.bucket_first(idx);
        while let Some(next_slot) = cursor {
            if block::user_ptr_from_next_slot(next_slot) == user_ptr {
                return true;
            }
            cursor = self.freelist_next(next_slot);
        }
        false
    }

    /// Walks every bucket, verifying each entry's alloc bit is clear.
    fn list_walk(&self) -> bool {
        let mut ok = true;
        for idx in 0..NUM_BUCKETS {
            let mut cursor = self.bucket_first(idx);
            while let Some(next_slot) = cursor {
                let user_ptr = block::user_ptr_from_next_slot(next_slot);
                let tag = self.read_header(user_ptr);
                if is_allocated(tag) {
                    log::warn!(
                        "segheap: check: block at {user_ptr:#x} in bucket {idx} has its alloc bit set"
                    );
                    ok = false;
                }
                cursor = self.freelist_next(next_slot);
            }
        }
        ok
    }
}
