//! Byte-range arithmetic for subtree scans.
//!
//! Every row under a subtree prefix `P` falls in the contiguous key
//! interval `[encode(P), increment(encode(P)))`, because extending a path
//! only appends bytes and `increment` produces the first key that no
//! extension of `P` can reach.

/// Tag value one past the greatest segment tag. Every encoded path begins
/// with `0x00` or `0x01`, so `[0x02]` bounds the entire keyspace.
const PAST_ALL_TAGS: u8 = 0x02;

/// A half-open `[lower, upper)` interval of encoded-path keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ByteRange {
    /// Inclusive lower bound.
    pub lower: Vec<u8>,
    /// Exclusive upper bound.
    pub upper: Vec<u8>,
}

impl ByteRange {
    /// The interval holding every row strictly or loosely under `prefix`
    /// (the prefix's own row included).
    ///
    /// The root prefix is special-cased: `increment` of an empty buffer is
    /// `[0x01]`, which would cut off key-segment rows (tag `0x01`), so the
    /// root scan runs to `[0x02]` instead.
    pub fn subtree_of(prefix: &[u8]) -> Self {
        if prefix.is_empty() {
            return Self {
                lower: Vec::new(),
                upper: vec![PAST_ALL_TAGS],
            };
        }
        Self {
            lower: prefix.to_vec(),
            upper: increment(prefix),
        }
    }

    /// The interval holding every row strictly under `prefix`: as
    /// [`Self::subtree_of`], but the lower bound skips the prefix's own
    /// row. Appending `0x00` yields a key above `prefix` and at or below
    /// every extension of it.
    pub fn children_of(prefix: &[u8]) -> Self {
        let mut range = Self::subtree_of(prefix);
        range.lower.push(0x00);
        range
    }
}

/// The byte string one greater, viewing the buffer as a big unsigned
/// integer. The carry propagates: number segments can legitimately end in
/// `0xFF` (index 255 encodes as `00 00 00 00 FF`).
///
/// An empty buffer yields `[0x01]`. A buffer of all `0xFF` bytes has no
/// same-width successor; encoded paths always start with a segment tag, so
/// the loop is guaranteed to terminate on them, and the all-`0xFF` case
/// falls back to the empty-buffer result.
pub fn increment(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    for i in (0..out.len()).rev() {
        let (next, wrapped) = out[i].overflowing_add(1);
        out[i] = next;
        if !wrapped {
            return out;
        }
    }
    vec![0x01]
}
