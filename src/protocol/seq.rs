//! Wrap-aware sequence number and timestamp arithmetic
//!
//! RTP sequence numbers wrap modulo 2^16 and timestamps modulo 2^32. Plain
//! integer comparison breaks at the wrap point, so ordering is defined over
//! half of the number space: `a` is newer than `b` when walking forward from
//! `b` reaches `a` in fewer than half the possible steps.

/// Half of the sequence number space
pub const SEQ_HALF_RANGE: u16 = 1 << 15;

/// Half of the timestamp space
pub const TIMESTAMP_HALF_RANGE: u32 = 1 << 31;

/// Forward distance from `from` to `to`, modulo 2^16
#[inline]
pub fn seq_distance(from: u16, to: u16) -> u16 {
    to.wrapping_sub(from)
}

/// Whether sequence `a` is strictly ahead of `b`
#[inline]
pub fn seq_is_newer(a: u16, b: u16) -> bool {
    let d = seq_distance(b, a);
    d != 0 && d < SEQ_HALF_RANGE
}

/// Forward distance from `from` to `to`, modulo 2^32
#[inline]
pub fn timestamp_distance(from: u32, to: u32) -> u32 {
    to.wrapping_sub(from)
}

/// Whether timestamp `a` is strictly ahead of `b`
#[inline]
pub fn timestamp_is_newer(a: u32, b: u32) -> bool {
    let d = timestamp_distance(b, a);
    d != 0 && d < TIMESTAMP_HALF_RANGE
}
