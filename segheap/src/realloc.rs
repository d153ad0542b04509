//! The realloc engine: equal-size no-op, shrink-with-split, tail-extend,
//! symmetric in-place coalesce, and copying fallback (spec.md §4.8).

use crate::block;
use crate::region::HeapRegion;
use crate::tags::{align_up, is_allocated, size_of, OVERHEAD, TAG_SIZE};
use crate::Allocator;

impl<R: HeapRegion> Allocator<R> {
    /// Resizes the block at `user_ptr` to hold `requested` bytes, or
    /// allocates/frees when `user_ptr`/`requested` take their special null
    /// values (spec.md §4.8).
    ///
    /// Returns `None` exactly when the caller should treat the heap as
    /// having been freed (a `requested == 0` call) or exhausted (a growth
    /// path whose [`HeapRegion::extend`] failed).
    pub fn reallocate(&mut self, user_ptr: Option<usize>, requested: usize) -> Option<usize> {
        let Some(p) = user_ptr else {
            return self.allocate(requested);
        };
        if requested == 0 {
            self.free(p);
            return None;
        }

        let old = size_of(self.read_header(p)) as usize;
        let new = align_up(requested);

        if old == new {
            return Some(p);
        }

        if old >= new + OVERHEAD {
            return Some(self.realloc_shrink(p, new, old));
        }

        if old > new {
            // Shrinking, but the leftover is smaller than OVERHEAD and
            // can't be split into a block of its own — keep it as padding
            // inside the still-allocated block.
            return Some(p);
        }

        if old < new && self.is_last_block(p, old as u32) {
            return self.realloc_tail_extend(p, old, new);
        }

        if let Some(result) = self.try_symmetric_coalesce(p, old, new) {
            return Some(result);
        }

        self.realloc_fallback(p, old, new)
    }

    /// `old >= new + 16`: keep the low `new` bytes, split the tail off as a
    /// fresh free block.
    fn realloc_shrink(&mut self, p: usize, new: usize, old: usize) -> usize {
        let tail_ptr = p + new + OVERHEAD;
        let tail_size = old - new - OVERHEAD;
        self.set_info_free(tail_ptr, tail_size as u32);
        self.insert_free(tail_ptr, tail_size as u32);
        self.finalize_allocated(p, new as u32);
        p
    }

    /// `p` is the last block in the heap: grow the region by the shortfall
    /// and rewrite `p`'s tags in place.
    fn realloc_tail_extend(&mut self, p: usize, old: usize, new: usize) -> Option<usize> {
        let diff = new - old;
        match self.grow_region(diff) {
            Ok(_base) => {
                self.finalize_allocated(p, new as u32);
                Some(p)
            }
            Err(err) => {
                log::warn!("segheap: reallocate tail-extend by {diff} bytes failed: {err}");
                None
            }
        }
    }

    /// Tries to satisfy a growing request by consuming free neighbors on
    /// either side of `p`, without moving the payload more than necessary.
    ///
    /// Backward neighbors are tried first; if they alone don't reach `new`,
    /// the walk continues forward from where the backward walk left off,
    /// exactly as spec.md §4.8 step 4 describes (the combined total carries
    /// across both walks).
    fn try_symmetric_coalesce(&mut self, p: usize, old: usize, new: usize) -> Option<usize> {
        let (low_user_ptr, high_end_cursor, total) = self.plan_symmetric_coalesce(p, old, new)?;

        // Remove every traversed backward neighbor, working from `p` down
        // to (but not including) `low_user_ptr` itself.
        let mut cursor = p;
        while cursor != low_user_ptr {
            let footer = block::prev_block_footer(cursor);
            let footer_tag = unsafe { self.read_u32(footer) };
            let size = size_of(footer_tag) as usize;
            let pred_user_ptr = footer - size - TAG_SIZE;
            self.remove_free(pred_user_ptr);
            cursor = pred_user_ptr;
        }

        // Remove every traversed forward neighbor, from p's immediate
        // successor up to (but not including) `high_end_cursor`.
        let mut forward = block::next_block_header(p, old as u32);
        while forward < high_end_cursor {
            let header_tag = unsafe { self.read_u32(forward) };
            let size = size_of(header_tag) as usize;
            let succ_user_ptr = forward + TAG_SIZE;
            self.remove_free(succ_user_ptr);
            forward = block::next_block_header(succ_user_ptr, size as u32);
        }

        if low_user_ptr != p {
            // New base precedes `p`: copy payload before any tag gets
            // written, since tags may overlap the swallowed predecessors'
            // metadata. `ptr::copy` tolerates the resulting overlap.
            unsafe { self.copy_payload_bytes(p, low_user_ptr, old.min(new)) };
        }

        if total > new {
            let tail_ptr = low_user_ptr + new + OVERHEAD;
            let tail_size = total - new - OVERHEAD;
            // A zero-size remainder (`total == new + OVERHEAD` exactly) gets
            // free tags but no bucket of its own, same as the zero-slack
            // split in `engine::split_and_allocate` — size 0 has no valid
            // free-list bucket (spec.md §4.3), so inserting would panic the
            // bucket_of debug_assert (or misfile into bucket 0 in release).
            self.set_info_free(tail_ptr, tail_size as u32);
            if tail_size > 0 {
                self.insert_free(tail_ptr, tail_size as u32);
            }
        }

        self.finalize_allocated(low_user_ptr, new as u32);
        Some(low_user_ptr)
    }

    /// Read-only dry run of the backward-then-forward walk: computes the
    /// earliest backward cursor, the furthest forward cursor, and the
    /// accumulated size, without mutating anything. Returns `None` if
    /// neither walk (combined) reaches `new`.
    fn plan_symmetric_coalesce(
        &self,
        p: usize,
        old: usize,
        new: usize,
    ) -> Option<(usize, usize, usize)> {
        let satisfies = |total: usize| total == new || total >= new + OVERHEAD;
        let user_zone_low = self.user_zone_low_abs();
        let heap_high = self.heap_high_abs();

        let mut total = old;
        let mut low_user_ptr = p;
        let mut satisfied = false;

        let mut back_cursor = block::prev_block_footer(low_user_ptr);
        while back_cursor >= user_zone_low {
            let footer_tag = unsafe { self.read_u32(back_cursor) };
            if is_allocated(footer_tag) {
                break;
            }
            let pred_size = size_of(footer_tag) as usize;
            let pred_user_ptr = back_cursor - pred_size - TAG_SIZE;
            total += pred_size + OVERHEAD;
            low_user_ptr = pred_user_ptr;
            if satisfies(total) {
                satisfied = true;
                break;
            }
            back_cursor = block::prev_block_footer(low_user_ptr);
        }

        let mut high_end_cursor = block::next_block_header(p, old as u32);
        if !satisfied {
            while high_end_cursor < heap_high {
                let header_tag = unsafe { self.read_u32(high_end_cursor) };
                if is_allocated(header_tag) {
                    break;
                }
                let succ_size = size_of(header_tag) as usize;
                let succ_user_ptr = high_end_cursor + TAG_SIZE;
                total += succ_size + OVERHEAD;
                high_end_cursor = block::next_block_header(succ_user_ptr, succ_size as u32);
                if satisfies(total) {
                    satisfied = true;
                    break;
                }
            }
        }

        satisfied.then_some((low_user_ptr, high_end_cursor, total))
    }

    /// Last resort: allocate a fresh block elsewhere, copy, free the
    /// original.
    fn realloc_fallback(&mut self, p: usize, old: usize, new: usize) -> Option<usize> {
        let fresh = self.allocate(new)?;
        unsafe { self.copy_payload_bytes(p, fresh, old.min(new)) };
        self.free(p);
        Some(fresh)
    }
}

#[cfg(test)]
mod tests {
    use crate::tests_support::VecRegion;
    use crate::Allocator;

    #[test]
    fn realloc_equal_size_is_a_no_op() {
        let mut alloc = Allocator::init(VecRegion::new()).unwrap();
        let a = alloc.allocate(32).unwrap();
        assert_eq!(alloc.reallocate(Some(a), 32), Some(a));
    }

    #[test]
    fn realloc_shrink_splits_tail_free_block() {
        let mut alloc = Allocator::init(VecRegion::new()).unwrap();
        let a = alloc.allocate(128).unwrap();
        let r = alloc.reallocate(Some(a), 32).unwrap();
        assert_eq!(r, a);

        let tail = a + 32 + crate::tags::OVERHEAD;
        let tail_tag = alloc.read_header(tail);
        assert!(!crate::tags::is_allocated(tail_tag));
        assert_eq!(crate::tags::size_of(tail_tag), 80);
    }

    #[test]
    fn realloc_tail_extend_grows_heap_without_moving() {
        let mut alloc = Allocator::init(VecRegion::new()).unwrap();
        let a = alloc.allocate(64).unwrap();
        let before_high = alloc.heap_high_abs();
        let r = alloc.reallocate(Some(a), 128).unwrap();
        assert_eq!(r, a);
        assert_eq!(alloc.heap_high_abs(), before_high + 64);
    }

    #[test]
    fn realloc_backward_coalesce_shifts_base() {
        let mut alloc = Allocator::init(VecRegion::new()).unwrap();
        let a = alloc.allocate(48).unwrap();
        let b = alloc.allocate(48).unwrap();
        alloc.free(a);

        let r = alloc.reallocate(Some(b), 96).unwrap();
        assert_eq!(r, a);
    }

    #[test]
    fn realloc_null_pointer_behaves_like_allocate() {
        let mut alloc = Allocator::init(VecRegion::new()).unwrap();
        let a = alloc.reallocate(None, 32);
        assert!(a.is_some());
    }

    #[test]
    fn realloc_zero_size_frees_and_returns_none() {
        let mut alloc = Allocator::init(VecRegion::new()).unwrap();
        let a = alloc.allocate(32).unwrap();
        assert_eq!(alloc.reallocate(Some(a), 0), None);
    }
}
