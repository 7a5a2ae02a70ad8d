//! Lazy enumeration of a handle's direct children.
//!
//! Instead of scanning the whole subtree and filtering by decoded depth,
//! the iterator seeks: each step fetches the first row at or after the
//! cursor, yields it, and moves the cursor just past that child's entire
//! subtree with `increment`. Prefix closure guarantees the first row in
//! the remaining interval is always a direct child, so a consumer that
//! stops early pays only for what it pulled.

use std::rc::Rc;

use canopy_error::{CanopyError, Result};
use canopy_types::codec::RowValue;
use canopy_types::range::increment;
use canopy_types::{ByteRange, Path, Segment};

use crate::node::{Node, NodeKind, Stored};
use crate::table::TableShared;

enum Cursor {
    Active { lower: Vec<u8>, upper: Vec<u8> },
    Failed(CanopyError),
    Done,
}

/// Lazy `(segment, value)` pairs over a handle's direct children.
pub struct Entries {
    table: Rc<TableShared>,
    prefix: Path,
    cursor: Cursor,
}

impl Entries {
    pub(crate) fn start(node: &Node) -> Self {
        let cursor = match node.prefix.encode() {
            Ok(prefix_bytes) => {
                let range = ByteRange::children_of(&prefix_bytes);
                Cursor::Active {
                    lower: range.lower,
                    upper: range.upper,
                }
            }
            Err(err) => Cursor::Failed(err),
        };
        Self {
            table: Rc::clone(&node.table),
            prefix: node.prefix.clone(),
            cursor,
        }
    }

    fn fetch(&self, lower: &[u8], upper: &[u8]) -> Result<Option<(Segment, Stored, Vec<u8>)>> {
        let Some((path_bytes, value_bytes)) = self.table.first_in_range(lower, upper)? else {
            return Ok(None);
        };
        let next_lower = increment(&path_bytes);
        let path = Path::decode(&path_bytes)?;
        if path.depth() != self.prefix.depth() + 1 {
            return Err(CanopyError::corrupt(format!(
                "row at {path} has no parent under {}",
                self.prefix
            )));
        }
        let segment = path
            .last()
            .cloned()
            .ok_or_else(|| CanopyError::corrupt("child row with an empty path"))?;
        let stored = match RowValue::decode(&value_bytes)? {
            RowValue::Scalar(scalar) => Stored::Scalar(scalar),
            RowValue::ArrayMarker => {
                Stored::Array(Node::new(Rc::clone(&self.table), path, NodeKind::Array))
            }
            RowValue::RecordMarker => {
                Stored::Record(Node::new(Rc::clone(&self.table), path, NodeKind::Record))
            }
        };
        Ok(Some((segment, stored, next_lower)))
    }
}

impl Iterator for Entries {
    type Item = Result<(Segment, Stored)>;

    fn next(&mut self) -> Option<Self::Item> {
        match std::mem::replace(&mut self.cursor, Cursor::Done) {
            Cursor::Done => None,
            Cursor::Failed(err) => Some(Err(err)),
            Cursor::Active { lower, upper } => match self.fetch(&lower, &upper) {
                Err(err) => Some(Err(err)),
                Ok(None) => None,
                Ok(Some((segment, stored, next_lower))) => {
                    self.cursor = Cursor::Active {
                        lower: next_lower,
                        upper,
                    };
                    Some(Ok((segment, stored)))
                }
            },
        }
    }
}

/// Lazy keys over a handle's direct children.
///
/// On an array handle the derived `"length"` key is reported first.
pub struct Keys {
    synthetic_length: bool,
    inner: Entries,
}

impl Keys {
    pub(crate) fn start(node: &Node) -> Self {
        Self {
            synthetic_length: node.kind == NodeKind::Array,
            inner: Entries::start(node),
        }
    }
}

impl Iterator for Keys {
    type Item = Result<Segment>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.synthetic_length {
            self.synthetic_length = false;
            return Some(Ok(Segment::Key("length".to_owned())));
        }
        self.inner
            .next()
            .map(|item| item.map(|(segment, _)| segment))
    }
}

/// Lazy values over a handle's direct children.
pub struct Values {
    inner: Entries,
}

impl Values {
    pub(crate) fn start(node: &Node) -> Self {
        Self {
            inner: Entries::start(node),
        }
    }
}

impl Iterator for Values {
    type Item = Result<Stored>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|item| item.map(|(_, stored)| stored))
    }
}
