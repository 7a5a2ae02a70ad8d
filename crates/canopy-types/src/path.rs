//! Order-preserving binary encoding of paths.
//!
//! A path is serialized by concatenating per-segment encodings with no
//! length prefix. Each segment starts with a 1-byte tag:
//!
//! | Tag    | Segment | Body                                            |
//! |--------|---------|-------------------------------------------------|
//! | `0x00` | index   | 32-bit value, big-endian                        |
//! | `0x01` | key     | UTF-16 code units, 2 bytes each big-endian, then the terminator `0xFFFE` |
//!
//! Tag `0x00 < 0x01` puts index segments before key segments at any
//! position; big-endian indices sort numerically; the terminator is
//! strictly greater than every legal code unit, so a key sorts after any
//! longer key it is a prefix of. That is what keeps rows under a sibling
//! `"ab"` out of the subtree range `[P, P+1)` of the record at `"a"`. The
//! byte order of encoded paths equals the segment order of the paths
//! themselves (see [`crate::segment`]).

use std::fmt;

use canopy_error::{CanopyError, Result};

use crate::segment::Segment;

/// Tag byte introducing an index segment.
pub const TAG_INDEX: u8 = 0x00;
/// Tag byte introducing a key segment.
pub const TAG_KEY: u8 = 0x01;
/// Code unit terminating a key segment. Key code units must be below it.
pub const KEY_TERMINATOR: u16 = 0xFFFE;

impl Segment {
    /// Append this segment's encoding to `buf`.
    ///
    /// Fails with `CodeUnitOutOfRange` if a key contains a code unit at or
    /// above the terminator.
    pub fn encode_into(&self, buf: &mut Vec<u8>) -> Result<()> {
        match self {
            Self::Index(n) => {
                buf.push(TAG_INDEX);
                buf.extend_from_slice(&n.to_be_bytes());
            }
            Self::Key(s) => {
                buf.push(TAG_KEY);
                for (index, unit) in s.encode_utf16().enumerate() {
                    if unit >= KEY_TERMINATOR {
                        return Err(CanopyError::CodeUnitOutOfRange { unit, index });
                    }
                    buf.extend_from_slice(&unit.to_be_bytes());
                }
                buf.extend_from_slice(&KEY_TERMINATOR.to_be_bytes());
            }
        }
        Ok(())
    }
}

/// An ordered sequence of segments from a table root to a stored cell.
///
/// The empty path denotes the table root. `Ord` on paths agrees with the
/// byte order of their encodings.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Path {
    segments: Vec<Segment>,
}

impl Path {
    /// The empty path (table root).
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
        }
    }

    /// Build a path from segments.
    pub fn new(segments: impl IntoIterator<Item = Segment>) -> Self {
        Self {
            segments: segments.into_iter().collect(),
        }
    }

    /// The path one segment deeper.
    pub fn child(&self, segment: Segment) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.extend_from_slice(&self.segments);
        segments.push(segment);
        Self { segments }
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Whether this is the table root.
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The segments of this path.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The final segment, if any.
    pub fn last(&self) -> Option<&Segment> {
        self.segments.last()
    }

    /// Encode the whole path.
    pub fn encode(&self) -> Result<Vec<u8>> {
        // Index segments take 5 bytes; keys at least 3. Reserve the small end.
        let mut buf = Vec::with_capacity(self.segments.len() * 5);
        for segment in &self.segments {
            segment.encode_into(&mut buf)?;
        }
        Ok(buf)
    }

    /// Decode an encoded path.
    ///
    /// The input must be a complete concatenation of segment encodings;
    /// anything else is `UnknownPathTag` or `Corrupt`.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut segments = Vec::new();
        let mut offset = 0;
        while offset < bytes.len() {
            match bytes[offset] {
                TAG_INDEX => {
                    let end = offset + 5;
                    let Some(body) = bytes.get(offset + 1..end) else {
                        return Err(CanopyError::corrupt(format!(
                            "index segment truncated at byte {offset}"
                        )));
                    };
                    let mut be = [0u8; 4];
                    be.copy_from_slice(body);
                    segments.push(Segment::Index(u32::from_be_bytes(be)));
                    offset = end;
                }
                TAG_KEY => {
                    offset += 1;
                    let mut units = Vec::new();
                    loop {
                        let Some(pair) = bytes.get(offset..offset + 2) else {
                            return Err(CanopyError::corrupt(format!(
                                "key segment missing terminator at byte {offset}"
                            )));
                        };
                        let unit = u16::from_be_bytes([pair[0], pair[1]]);
                        offset += 2;
                        if unit == KEY_TERMINATOR {
                            break;
                        }
                        if unit > KEY_TERMINATOR {
                            return Err(CanopyError::corrupt(format!(
                                "key segment contains code unit {unit:#06x} above the terminator"
                            )));
                        }
                        units.push(unit);
                    }
                    let key = String::from_utf16(&units).map_err(|_| {
                        CanopyError::corrupt("key segment is not well-formed UTF-16")
                    })?;
                    segments.push(Segment::Key(key));
                }
                tag => return Err(CanopyError::UnknownPathTag { tag }),
            }
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for Path {
    /// Root is `$`; deeper paths append `.segment` per step.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Self::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn path(segments: &[Segment]) -> Path {
        Path::new(segments.iter().cloned())
    }

    #[test]
    fn encode_index_segment() {
        let p = path(&[Segment::Index(0x0102_0304)]);
        assert_eq!(p.encode().unwrap(), vec![0x00, 0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn encode_key_segment() {
        let p = path(&[Segment::Key("ab".to_owned())]);
        assert_eq!(
            p.encode().unwrap(),
            vec![0x01, 0x00, 0x61, 0x00, 0x62, 0xFF, 0xFE]
        );
    }

    #[test]
    fn encode_empty_path() {
        assert_eq!(Path::root().encode().unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn encode_rejects_terminator_code_unit() {
        let p = path(&[Segment::Key("a\u{FFFE}".to_owned())]);
        let err = p.encode().unwrap_err();
        assert!(matches!(
            err,
            CanopyError::CodeUnitOutOfRange {
                unit: 0xFFFE,
                index: 1
            }
        ));

        let p = path(&[Segment::Key("\u{FFFF}".to_owned())]);
        assert!(matches!(
            p.encode().unwrap_err(),
            CanopyError::CodeUnitOutOfRange {
                unit: 0xFFFF,
                index: 0
            }
        ));
    }

    #[test]
    fn surrogate_pairs_encode_as_two_units() {
        // U+1F600 encodes as the surrogate pair D83D DE00, both below 0xFFFE.
        let p = path(&[Segment::Key("\u{1F600}".to_owned())]);
        assert_eq!(
            p.encode().unwrap(),
            vec![0x01, 0xD8, 0x3D, 0xDE, 0x00, 0xFF, 0xFE]
        );
        assert_eq!(Path::decode(&p.encode().unwrap()).unwrap(), p);
    }

    #[test]
    fn decode_round_trip() {
        let p = path(&[
            Segment::Key("users".to_owned()),
            Segment::Index(42),
            Segment::Key("name".to_owned()),
        ]);
        let bytes = p.encode().unwrap();
        assert_eq!(Path::decode(&bytes).unwrap(), p);
    }

    #[test]
    fn decode_empty_is_root() {
        assert!(Path::decode(&[]).unwrap().is_root());
    }

    #[test]
    fn decode_unknown_tag() {
        let err = Path::decode(&[0x07]).unwrap_err();
        assert!(matches!(err, CanopyError::UnknownPathTag { tag: 0x07 }));
    }

    #[test]
    fn decode_truncated_index() {
        let err = Path::decode(&[0x00, 0x01]).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn decode_unterminated_key() {
        let err = Path::decode(&[0x01, 0x00, 0x61]).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn decode_rejects_lone_surrogate() {
        // A lone high surrogate is representable in the wire format but not
        // in a Rust string.
        let err = Path::decode(&[0x01, 0xD8, 0x00, 0xFF, 0xFE]).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn sibling_key_extension_falls_outside_subtree() {
        let a = path(&[Segment::Key("a".to_owned())]).encode().unwrap();
        let ab = path(&[Segment::Key("ab".to_owned())]).encode().unwrap();
        // The terminator outranks the code unit 'b', so "ab" sorts below
        // "a" and therefore below the subtree range [enc("a"), ...) of the
        // record at "a".
        assert!(ab < a);
        // A true child of "a" extends its encoding and lands inside.
        let child = path(&[Segment::Key("a".to_owned()), Segment::Index(0)])
            .encode()
            .unwrap();
        assert!(child.starts_with(&a));
        assert!(child > a);
    }

    #[test]
    fn index_sorts_before_key() {
        let idx = path(&[Segment::Index(u32::MAX - 1)]).encode().unwrap();
        let key = path(&[Segment::Key(String::new())]).encode().unwrap();
        assert!(idx < key);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Path::root().to_string(), "$");
        let p = path(&[Segment::Key("ints".to_owned()), Segment::Index(3)]);
        assert_eq!(p.to_string(), "$.ints.3");
    }

    fn segment_strategy() -> impl Strategy<Value = Segment> {
        prop_oneof![
            (0..u32::MAX).prop_map(Segment::Index),
            any::<String>()
                .prop_filter("encodable key", |s| s
                    .encode_utf16()
                    .all(|u| u < KEY_TERMINATOR))
                .prop_map(Segment::Key),
        ]
    }

    fn path_strategy() -> impl Strategy<Value = Path> {
        prop::collection::vec(segment_strategy(), 0..4).prop_map(Path::new)
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(p in path_strategy()) {
            let bytes = p.encode().unwrap();
            prop_assert_eq!(Path::decode(&bytes).unwrap(), p);
        }

        #[test]
        fn prop_byte_order_matches_segment_order(a in path_strategy(), b in path_strategy()) {
            let ea = a.encode().unwrap();
            let eb = b.encode().unwrap();
            prop_assert_eq!(a.cmp(&b), ea.cmp(&eb));
        }
    }
}
