//! Eager coalescing of a just-freed block with its free neighbors
//! (spec.md §4.6).

use crate::block;
use crate::region::HeapRegion;
use crate::tags::{is_allocated, size_of, TAG_SIZE};
use crate::Allocator;

impl<R: HeapRegion> Allocator<R> {
    /// Merges the just-freed block at `user_ptr` with any adjacent free
    /// blocks, then reinserts the (possibly larger) result into the free
    /// list index.
    ///
    /// `user_ptr`'s header/footer must already carry free tags (spec.md
    /// §4.5 step 2 clears the alloc bit before calling in).
    pub(crate) fn coalesce(&mut self, user_ptr: usize) {
        let mut total = size_of(self.read_header(user_ptr)) as usize;
        let user_zone_low = self.user_zone_low_abs();

        // Backward sweep: absorb consecutive free predecessors.
        let mut low_user_ptr = user_ptr;
        let mut back_cursor = block::prev_block_footer(low_user_ptr);
        while back_cursor >= user_zone_low {
            let footer_tag = unsafe { self.read_u32(back_cursor) };
            if is_allocated(footer_tag) {
                break;
            }
            let pred_size = size_of(footer_tag) as usize;
            let pred_user_ptr = back_cursor - pred_size - TAG_SIZE;
            self.remove_free(pred_user_ptr);
            total += pred_size + crate::tags::OVERHEAD;
            low_user_ptr = pred_user_ptr;
            back_cursor = block::prev_block_footer(low_user_ptr);
        }

        // Forward sweep: absorb consecutive free successors.
        let heap_high = self.heap_high_abs();
        let mut forward_cursor = block::next_block_header(user_ptr, size_of(self.read_header(user_ptr)));
        while forward_cursor < heap_high {
            let header_tag = unsafe { self.read_u32(forward_cursor) };
            if is_allocated(header_tag) {
                break;
            }
            let succ_size = size_of(header_tag) as usize;
            let succ_user_ptr = forward_cursor + TAG_SIZE;
            self.remove_free(succ_user_ptr);
            total += succ_size + crate::tags::OVERHEAD;
            forward_cursor = block::next_block_header(succ_user_ptr, succ_size as u32);
        }

        self.set_info_free(low_user_ptr, total as u32);
        self.insert_free(low_user_ptr, total as u32);
    }
}
