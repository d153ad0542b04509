//! The allocator handle: initialization, raw memory access, the placement
//! engine, and the small-block primer (spec.md §4.4).

use crate::block;
use crate::error::{AllocError, InitError};
use crate::freelist::{self, NUM_BUCKETS};
use crate::region::HeapRegion;
use crate::tags::{self, align_up, is_allocated, make_allocated, make_free, size_of, OVERHEAD};

/// A segregated free-list allocator over a caller-supplied [`HeapRegion`].
///
/// `Allocator` owns no memory of its own beyond a handful of bookkeeping
/// fields; every byte it manages lives in `R`. It is not `Sync` — see
/// [`crate::sync::LockedAllocator`] for a `GlobalAlloc` adapter that adds
/// locking on top.
pub struct Allocator<R: HeapRegion> {
    region: R,
    region_base: usize,
    heap_high: usize,
    /// Counts small requests since the last priming burst (`mm.c`'s `m_count`).
    small_block_count: u32,
}

impl<R: HeapRegion> Allocator<R> {
    /// Brings up the allocator over `region`, reserving the free-list index
    /// zone (22 bucket-head cells) at the very start of the region.
    pub fn init(mut region: R) -> Result<Self, InitError> {
        let region_base = region.low();
        region.extend(freelist::INDEX_ZONE_SIZE)?;
        let heap_high = region.high();

        let mut this = Self {
            region,
            region_base,
            heap_high,
            small_block_count: 0,
        };
        for idx in 0..NUM_BUCKETS {
            let head = this.bucket_head_addr(idx);
            unsafe { this.write_u32(head, 0) };
        }
        log::debug!(
            "segheap: initialized, region_base={region_base:#x}, user_zone_low={:#x}",
            this.user_zone_low_abs()
        );
        Ok(this)
    }

    /// Lowest address at which a real block (as opposed to a bucket-head
    /// cell) can ever start.
    pub(crate) fn user_zone_low_abs(&self) -> usize {
        self.region_base + freelist::INDEX_ZONE_SIZE
    }

    pub(crate) fn heap_high_abs(&self) -> usize {
        self.heap_high
    }

    pub(crate) fn bucket_head_addr(&self, idx: usize) -> usize {
        self.region_base + idx * tags::TAG_SIZE
    }

    /// Converts an absolute address into the `u32` relative offset stored in
    /// a free-list pointer field.
    ///
    /// Every in-block tag and free-list field is fixed at 4 bytes (spec.md
    /// §4.1/§4.3), so pointers embedded in memory are stored as offsets from
    /// `region_base` rather than raw pointers — this caps a single region at
    /// 4 GiB, a deliberate reading of "pointer-size" recorded in DESIGN.md.
    pub(crate) fn encode_addr(&self, addr: usize) -> u32 {
        u32::try_from(addr - self.region_base)
            .expect("heap region exceeds the 4 GiB this allocator's 4-byte slots can address")
    }

    pub(crate) fn decode_addr(&self, offset: u32) -> usize {
        self.region_base + offset as usize
    }

    /// Reads a 4-byte tag or free-list field.
    ///
    /// # Safety
    /// `addr` must be a 4-byte-aligned address of a live tag or free-list
    /// field within `[region_base, heap_high]`, i.e. memory this allocator
    /// exclusively owns.
    pub(crate) unsafe fn read_u32(&self, addr: usize) -> u32 {
        core::ptr::read(addr as *const u32)
    }

    /// Writes a 4-byte tag or free-list field.
    ///
    /// # Safety
    /// Same preconditions as [`read_u32`](Self::read_u32).
    pub(crate) unsafe fn write_u32(&self, addr: usize, value: u32) {
        core::ptr::write(addr as *mut u32, value);
    }

    pub(crate) fn read_header(&self, user_ptr: usize) -> u32 {
        unsafe { self.read_u32(block::header_addr(user_ptr)) }
    }

    pub(crate) fn write_header(&self, user_ptr: usize, tag: u32) {
        unsafe { self.write_u32(block::header_addr(user_ptr), tag) };
    }

    pub(crate) fn write_footer(&self, user_ptr: usize, payload: u32, tag: u32) {
        unsafe { self.write_u32(block::footer_addr(user_ptr, payload), tag) };
    }

    /// Writes matching free header/footer tags for a block (spec.md §4.7).
    pub(crate) fn set_info_free(&self, user_ptr: usize, payload: u32) {
        let tag = make_free(payload);
        self.write_header(user_ptr, tag);
        self.write_footer(user_ptr, payload, tag);
    }

    /// Writes matching allocated header/footer tags for a block.
    pub(crate) fn finalize_allocated(&self, user_ptr: usize, payload: u32) {
        let tag = make_allocated(payload);
        self.write_header(user_ptr, tag);
        self.write_footer(user_ptr, payload, tag);
    }

    /// Copies `len` payload bytes from one block to another, tolerating
    /// overlap (a backward symmetric coalesce in `realloc.rs` always has
    /// `src_user_ptr > dst_user_ptr`, but we don't lean on that to pick a
    /// cheaper copy primitive).
    ///
    /// # Safety
    /// `[src_user_ptr, src_user_ptr + len)` and
    /// `[dst_user_ptr, dst_user_ptr + len)` must both lie within memory this
    /// allocator owns.
    pub(crate) unsafe fn copy_payload_bytes(
        &self,
        src_user_ptr: usize,
        dst_user_ptr: usize,
        len: usize,
    ) {
        core::ptr::copy(src_user_ptr as *const u8, dst_user_ptr as *mut u8, len);
    }

    /// True when the block at `user_ptr` is the last block in the heap,
    /// i.e. nothing has been allocated past its footer.
    pub(crate) fn is_last_block(&self, user_ptr: usize, payload: u32) -> bool {
        block::next_block_header(user_ptr, payload) > self.heap_high_abs()
    }

    /// Services one allocation request, returning a user pointer or `None`
    /// if the backing region could not be grown (spec.md §4.4).
    pub fn allocate(&mut self, requested: usize) -> Option<usize> {
        let payload = align_up(requested.max(1));
        self.run_small_block_primer(payload);

        if let Some(user_ptr) = self.find_fit(payload) {
            return Some(user_ptr);
        }

        match self.grow(payload) {
            Ok(user_ptr) => Some(user_ptr),
            Err(err) => {
                log::warn!("segheap: allocate({requested}) failed: {err}");
                None
            }
        }
    }

    fn find_fit(&mut self, payload: usize) -> Option<usize> {
        let start_bucket = freelist::bucket_of(payload as u32);
        for idx in start_bucket..NUM_BUCKETS {
            let mut cursor = self.bucket_first(idx);
            while let Some(next_slot) = cursor {
                let candidate = block::user_ptr_from_next_slot(next_slot);
                let candidate_size = size_of(self.read_header(candidate)) as usize;

                if candidate_size == payload {
                    self.remove_free(candidate);
                    self.finalize_allocated(candidate, payload as u32);
                    return Some(candidate);
                } else if candidate_size >= payload + OVERHEAD {
                    self.remove_free(candidate);
                    self.split_and_allocate(candidate, candidate_size, payload);
                    return Some(candidate);
                }

                cursor = self.freelist_next(next_slot);
            }
        }
        None
    }

    fn split_and_allocate(&mut self, user_ptr: usize, block_size: usize, payload: usize) {
        let remainder = block_size - payload - OVERHEAD;
        let remainder_ptr = user_ptr + payload + OVERHEAD;
        // A remainder of exactly 0 bytes has no valid bucket (size 0 is not a
        // valid free block, spec.md §4.3) — it is tagged free but left out of
        // every bucket, mirroring `mm.c`'s `add_to_list_usr` early return on
        // `size == 0`. The consistency checker knows to skip reachability
        // checks for these orphans (see check.rs).
        self.set_info_free(remainder_ptr, remainder as u32);
        if remainder > 0 {
            self.insert_free(remainder_ptr, remainder as u32);
        }
        self.finalize_allocated(user_ptr, payload as u32);
    }

    fn grow(&mut self, payload: usize) -> Result<usize, AllocError> {
        let footprint = payload + OVERHEAD;
        let base = self.grow_region(footprint)?;
        let user_ptr = base + 2 * tags::TAG_SIZE;
        self.finalize_allocated(user_ptr, payload as u32);
        Ok(user_ptr)
    }

    /// Extends the backing region by exactly `bytes`, updating the cached
    /// heap-high watermark, and returns the base address of the new range.
    ///
    /// Used both by [`grow`](Self::grow), which turns the new bytes into a
    /// fresh allocated block, and by the realloc engine's tail-extend path
    /// (`realloc.rs`), which instead rewrites the tail block's own tags in
    /// place over the grown range.
    pub(crate) fn grow_region(&mut self, bytes: usize) -> Result<usize, AllocError> {
        let base = self.region.extend(bytes)?;
        self.heap_high = self.region.high();
        log::trace!("segheap: grew region by {bytes} bytes, new high={:#x}", self.heap_high);
        Ok(base)
    }

    /// Reproduces `mm.c`'s small-block priming heuristic: every 4th request
    /// under 32 bytes total footprint, or every 6th under 80, triggers an
    /// internal alloc-then-free burst before the real request is served.
    /// This recurses into `allocate`/`free`, which the spec treats as
    /// expected internal reentrancy, not a reentrancy bug.
    fn run_small_block_primer(&mut self, payload: usize) {
        let footprint = payload + OVERHEAD;
        if footprint <= 32 {
            if self.small_block_count == 0 || self.small_block_count == 4 {
                self.prime(payload * 4 + 3 * OVERHEAD);
                // Reset to 1, not 0 — preserved exactly from `mm.c`'s
                // `m_count = 1;` after the priming call (spec.md §9c).
                self.small_block_count = 1;
            } else {
                self.small_block_count += 1;
            }
        } else if footprint <= 80 {
            if self.small_block_count == 0 || self.small_block_count == 6 {
                self.prime(payload * 6 + 5 * OVERHEAD);
                self.small_block_count = 1;
            } else {
                self.small_block_count += 1;
            }
        }
    }

    fn prime(&mut self, size: usize) {
        if let Some(p) = self.allocate(size) {
            self.free(p);
        }
    }

    /// Frees a previously allocated block and coalesces it with any free
    /// neighbors (spec.md §4.5/§4.6).
    pub fn free(&mut self, user_ptr: usize) {
        let tag = self.read_header(user_ptr);
        debug_assert!(is_allocated(tag), "double free or invalid pointer at {user_ptr:#x}");
        self.set_info_free(user_ptr, size_of(tag));
        self.coalesce(user_ptr);
    }

    /// Reads the first free-list entry in bucket `idx`, expressed as the
    /// address of that entry's own next slot (see freelist.rs).
    pub(crate) fn bucket_first(&self, idx: usize) -> Option<usize> {
        self.freelist_next(self.bucket_head_addr(idx))
    }

    /// Reads the header tag at a block boundary, decomposed into its
    /// payload size and allocation bit — the read-only half of
    /// `malloc_usable_size`-style introspection, useful to callers (and
    /// this crate's own tests) that want to confirm a specific block's
    /// shape without walking the whole heap via [`check`](Self::check)
    /// (the `check` feature's consistency checker instead verifies every
    /// block).
    ///
    /// # Safety
    /// `addr` must name an actual block boundary — the user pointer of a
    /// live allocation, or the computed start of a free block produced by
    /// a split or coalesce — within memory this allocator owns. Passing an
    /// arbitrary address is undefined behavior, as with any other raw
    /// pointer into owned memory.
    pub unsafe fn block_tag_at(&self, addr: usize) -> (usize, bool) {
        let tag = self.read_header(addr);
        (size_of(tag) as usize, is_allocated(tag))
    }
}
