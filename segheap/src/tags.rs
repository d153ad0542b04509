//! Block tag bit arithmetic.
//!
//! Every header/footer is a single 4-byte word: the payload size (always a
//! multiple of 8) with the allocation flag packed into the low bit.

/// Byte alignment every block boundary and payload honors.
pub const ALIGNMENT: usize = 8;

/// Width of a header, footer, or free-list pointer field.
pub const TAG_SIZE: usize = 4;

/// Bytes of bookkeeping around every block: padding + header + padding + footer.
pub const OVERHEAD: usize = 4 * TAG_SIZE;

/// Rounds `n` up to the next multiple of [`ALIGNMENT`].
pub const fn align_up(n: usize) -> usize {
    (n + (ALIGNMENT - 1)) & !(ALIGNMENT - 1)
}

/// Extracts the payload size encoded in a tag word, masking off the alloc bit.
pub const fn size_of(tag: u32) -> u32 {
    tag & !1
}

/// Tests the allocation bit of a tag word.
pub const fn is_allocated(tag: u32) -> bool {
    tag & 1 != 0
}

/// Builds an allocated-block tag for the given payload size.
pub const fn make_allocated(size: u32) -> u32 {
    size | 1
}

/// Clears the allocation bit of an arbitrary tag word.
///
/// Does not assume `tag` already encodes a clean size — callers sometimes
/// pass a tag word straight off a just-read header, which may still carry
/// whatever was in its low bit.
pub const fn make_free(tag: u32) -> u32 {
    (tag >> 1) << 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple_of_eight() {
        assert_eq!(align_up(0), 0);
        assert_eq!(align_up(1), 8);
        assert_eq!(align_up(8), 8);
        assert_eq!(align_up(9), 16);
        assert_eq!(align_up(128), 128);
    }

    #[test]
    fn alloc_bit_roundtrips() {
        let t = make_allocated(64);
        assert!(is_allocated(t));
        assert_eq!(size_of(t), 64);

        let f = make_free(t);
        assert!(!is_allocated(f));
        assert_eq!(size_of(f), 64);
    }

    #[test]
    fn make_free_clears_low_bit_of_arbitrary_word() {
        // make_free must work on any tag word, not just ones it produced itself.
        assert_eq!(make_free(0b1011), 0b1010);
        assert_eq!(make_free(0b1010), 0b1010);
    }
}
