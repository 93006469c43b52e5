//! Reverse-binary cursor arithmetic for [`HashIndex::scan`](super::HashIndex::scan).
//!
//! The cursor is incremented from its most significant masked bit downwards.
//! Bucket `b` of a table with mask `m` expands to buckets `b`, `b | (m+1)`,
//! `b | 2(m+1)`, ... in a larger table, and those all share the low bits of
//! `b`. Visiting buckets in reversed-bit order therefore means that once a
//! low-bit pattern is finished it stays finished no matter how often the
//! table grows or shrinks between calls.
//!
//! ```text
//! mask 0b111:  000 -> 100 -> 010 -> 110 -> 001 -> 101 -> 011 -> 111 -> 000
//! ```

/// Advances `cursor` to the next bucket of a table with bucket mask `mask`.
///
/// Bits above the mask are set first so the reversed increment carries
/// straight into the masked bits. Returns 0 once every bucket was visited.
#[inline]
pub(super) fn advance(cursor: u64, mask: u64) -> u64 {
    (cursor | !mask).reverse_bits().wrapping_add(1).reverse_bits()
}
