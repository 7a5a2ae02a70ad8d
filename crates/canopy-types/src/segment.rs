use std::cmp::Ordering;
use std::fmt;

/// One step of a path: an array index or a record key.
///
/// Index segments sort before key segments at every position, indices sort
/// numerically, and keys sort by their UTF-16 code-unit sequence with the
/// key terminator (`0xFFFE`) appended, so a key sorts *after* any longer
/// key it is a prefix of. This order is exactly the byte order of the
/// encoded form (see [`crate::path`]), so comparing segments and comparing
/// encoded paths agree.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Segment {
    /// A non-negative 32-bit array index. `u32::MAX` is reserved as the
    /// exclusive scan bound and is never produced by normalization.
    Index(u32),
    /// A record key. Encodable only when every UTF-16 code unit is below
    /// `0xFFFE`.
    Key(String),
}

impl Segment {
    /// Normalize an external key to a segment.
    ///
    /// A canonical decimal integer below `2³²−1` becomes an index segment
    /// (`"3"` indexes an array; `"03"`, `"+3"`, and `"4294967295"` do not);
    /// anything else is a key segment.
    pub fn normalize(key: &str) -> Self {
        match parse_canonical_index(key) {
            Some(n) => Self::Index(n),
            None => Self::Key(key.to_owned()),
        }
    }

    /// Returns the index value if this is an index segment.
    pub const fn as_index(&self) -> Option<u32> {
        match self {
            Self::Index(n) => Some(*n),
            Self::Key(_) => None,
        }
    }

    /// Returns the key string if this is a key segment.
    pub fn as_key(&self) -> Option<&str> {
        match self {
            Self::Index(_) => None,
            Self::Key(s) => Some(s),
        }
    }

    /// Whether this segment is the literal key `"length"`.
    ///
    /// On array handles that key addresses the derived length rather than a
    /// stored row.
    pub fn is_length_key(&self) -> bool {
        matches!(self, Self::Key(s) if s == "length")
    }

    /// The record-key spelling of this segment (indices in decimal).
    pub fn to_key_string(&self) -> String {
        match self {
            Self::Index(n) => n.to_string(),
            Self::Key(s) => s.clone(),
        }
    }
}

/// Parse a canonical decimal array index: digits only, no leading zeros
/// (except `"0"` itself), value strictly below `2³²−1`.
fn parse_canonical_index(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 10 {
        return None;
    }
    if s.len() > 1 && s.starts_with('0') {
        return None;
    }
    if !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n < u64::from(u32::MAX) {
        u32::try_from(n).ok()
    } else {
        None
    }
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Index(a), Self::Index(b)) => a.cmp(b),
            (Self::Index(_), Self::Key(_)) => Ordering::Less,
            (Self::Key(_), Self::Index(_)) => Ordering::Greater,
            // Key order is UTF-16 code-unit order (not `str`/UTF-8 byte
            // order: surrogate pairs must sort below U+E000..U+FFFD), with
            // the terminator standing in for end-of-key. The terminator
            // exceeds every legal code unit, so the shorter of two keys
            // sharing a prefix compares greater.
            (Self::Key(a), Self::Key(b)) => a
                .encode_utf16()
                .chain(std::iter::once(crate::path::KEY_TERMINATOR))
                .cmp(b.encode_utf16().chain(std::iter::once(crate::path::KEY_TERMINATOR))),
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(n) => write!(f, "{n}"),
            Self::Key(s) => f.write_str(s),
        }
    }
}

impl From<u32> for Segment {
    fn from(n: u32) -> Self {
        if n == u32::MAX {
            // Out of the index domain; treated as its decimal key, the same
            // way normalization treats the string "4294967295".
            Self::Key(n.to_string())
        } else {
            Self::Index(n)
        }
    }
}

impl From<usize> for Segment {
    fn from(n: usize) -> Self {
        u32::try_from(n).map_or_else(|_| Self::Key(n.to_string()), Self::from)
    }
}

impl From<i32> for Segment {
    fn from(n: i32) -> Self {
        u32::try_from(n).map_or_else(|_| Self::Key(n.to_string()), Self::from)
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Self::normalize(key)
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        match parse_canonical_index(&key) {
            Some(n) => Self::Index(n),
            None => Self::Key(key),
        }
    }
}
