use std::fmt;
use std::rc::Rc;

use canopy_error::{CanopyError, Result};
use canopy_types::codec::RowValue;
use canopy_types::{ByteRange, Path, Scalar, Segment};

use crate::iter::{Entries, Keys, Values};
use crate::table::TableShared;
use crate::value::{ArrayValue, RecordValue, Value};
use crate::write::{write_tree, WriteContext, WriteGuard};

/// Whether a handle navigates a record or an array.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Keyed mapping. The table root is a record with an empty prefix.
    Record,
    /// Dense integer-indexed sequence with a derived `"length"`.
    Array,
}

/// A navigator over one subtree of a table: a prefix path plus a kind.
///
/// Handles are cheap (`Rc` bump) and touch no rows until an operation
/// runs. Every operation goes to the store; a handle holds no cached
/// data, so two handles over the same prefix always agree.
///
/// A handle can outlive its subtree (the parent may be overwritten or
/// deleted). Reads through such a handle simply come back absent; writes
/// through it would recreate rows without their parent markers, which
/// later deep reads surface as `Corrupt`.
#[derive(Clone)]
pub struct Node {
    pub(crate) table: Rc<TableShared>,
    pub(crate) prefix: Path,
    pub(crate) kind: NodeKind,
}

/// What `get` found at a key: a scalar leaf, or a handle to the composite
/// stored there.
#[derive(Clone, Debug)]
pub enum Stored {
    /// A scalar leaf value.
    Scalar(Scalar),
    /// A record handle.
    Record(Node),
    /// An array handle.
    Array(Node),
}

impl Stored {
    /// Try to extract the scalar.
    pub const fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Borrow the composite handle, if this is one.
    pub const fn as_node(&self) -> Option<&Node> {
        match self {
            Self::Record(n) | Self::Array(n) => Some(n),
            Self::Scalar(_) => None,
        }
    }

    /// Take the composite handle, if this is one.
    #[allow(clippy::missing_const_for_fn)]
    pub fn into_node(self) -> Option<Node> {
        match self {
            Self::Record(n) | Self::Array(n) => Some(n),
            Self::Scalar(_) => None,
        }
    }
}

impl Node {
    pub(crate) fn new(table: Rc<TableShared>, prefix: Path, kind: NodeKind) -> Self {
        Self {
            table,
            prefix,
            kind,
        }
    }

    /// The root handle of a table.
    pub(crate) fn root(table: Rc<TableShared>) -> Self {
        Self::new(table, Path::root(), NodeKind::Record)
    }

    /// Record or array.
    pub const fn kind(&self) -> NodeKind {
        self.kind
    }

    /// The path from the table root to this handle.
    pub const fn path(&self) -> &Path {
        &self.prefix
    }

    /// The name of the backing table.
    pub fn table_name(&self) -> &str {
        self.table.name()
    }

    /// Read the value at `key`.
    ///
    /// Scalars come back decoded; composites come back as child handles
    /// bound one segment deeper. On an array handle the key `"length"`
    /// yields the derived length as a number.
    pub fn get(&self, key: impl Into<Segment>) -> Result<Option<Stored>> {
        let segment = key.into();
        if self.kind == NodeKind::Array && segment.is_length_key() {
            return Ok(Some(Stored::Scalar(Scalar::Number(f64::from(
                self.length()?,
            )))));
        }
        let target = self.prefix.child(segment);
        let bytes = target.encode()?;
        let Some(raw) = self.table.select_one(&bytes)? else {
            return Ok(None);
        };
        let stored = match RowValue::decode(&raw)? {
            RowValue::Scalar(scalar) => Stored::Scalar(scalar),
            RowValue::ArrayMarker => {
                Stored::Array(Self::new(Rc::clone(&self.table), target, NodeKind::Array))
            }
            RowValue::RecordMarker => {
                Stored::Record(Self::new(Rc::clone(&self.table), target, NodeKind::Record))
            }
        };
        Ok(Some(stored))
    }

    /// Whether `key` holds anything.
    pub fn has(&self, key: impl Into<Segment>) -> Result<bool> {
        let segment = key.into();
        if self.kind == NodeKind::Array && segment.is_length_key() {
            return Ok(true);
        }
        let bytes = self.prefix.child(segment).encode()?;
        Ok(self.table.select_one(&bytes)?.is_some())
    }

    /// The array length: one past the greatest numeric child, or 0.
    ///
    /// Defined for any handle, meaningful for arrays (records normally
    /// have no numeric children and read 0).
    pub fn length(&self) -> Result<u32> {
        let lower = self.prefix.child(Segment::Index(0)).encode()?;
        let upper = self.prefix.child(Segment::Index(u32::MAX)).encode()?;
        match self.table.max_numeric_child(&lower, &upper)? {
            None => Ok(0),
            Some(bytes) => {
                let path = Path::decode(&bytes)?;
                match path.last() {
                    Some(Segment::Index(n)) => n.checked_add(1).ok_or_else(|| {
                        CanopyError::corrupt("array row sits at the reserved index bound")
                    }),
                    _ => Err(CanopyError::corrupt(format!(
                        "non-index row inside the numeric range of {}",
                        self.prefix
                    ))),
                }
            }
        }
    }

    /// Write `value` at `key`, replacing whatever subtree was there.
    ///
    /// The whole write, from the range wipe through every descendant row,
    /// is one transaction: it commits entirely or leaves the table
    /// untouched. On an array handle, `set("length", n)` truncates to
    /// length `n` instead (writing no row; length is derived), and any
    /// other non-index key is rejected with `NotAnIndex`.
    pub fn set(&self, key: impl Into<Segment>, value: impl Into<Value>) -> Result<()> {
        let segment = key.into();
        let value = value.into();
        if self.kind == NodeKind::Array {
            if segment.is_length_key() {
                return self.assign_length(&value);
            }
            if let Segment::Key(key) = &segment {
                return Err(CanopyError::NotAnIndex { key: key.clone() });
            }
        }
        let target = self.prefix.child(segment);
        let target_bytes = target.encode()?;
        tracing::trace!(table = self.table.name(), path = %target, "set");
        let guard = WriteGuard::begin(&self.table)?;
        let range = ByteRange::subtree_of(&target_bytes);
        self.table.delete_range(&range.lower, &range.upper)?;
        let mut ctx = WriteContext::new();
        write_tree(&self.table, target_bytes, &value, &mut ctx)?;
        guard.commit()
    }

    /// Delete the subtree at `key`; true if any row existed.
    ///
    /// The derived `"length"` of an array is not deletable.
    pub fn delete(&self, key: impl Into<Segment>) -> Result<bool> {
        let segment = key.into();
        if self.kind == NodeKind::Array && segment.is_length_key() {
            return Err(CanopyError::LengthNotDeletable);
        }
        let target = self.prefix.child(segment);
        let bytes = target.encode()?;
        tracing::trace!(table = self.table.name(), path = %target, "delete");
        let guard = WriteGuard::begin(&self.table)?;
        let range = ByteRange::subtree_of(&bytes);
        let removed = self.table.delete_range(&range.lower, &range.upper)?;
        guard.commit()?;
        Ok(removed > 0)
    }

    /// Lazy `(segment, value)` pairs over the direct children, in path
    /// order (numeric children first). Work is proportional to how much
    /// the consumer pulls.
    pub fn entries(&self) -> Entries {
        Entries::start(self)
    }

    /// Lazy keys over the direct children. On an array handle the
    /// synthetic `"length"` key comes first.
    pub fn keys(&self) -> Keys {
        Keys::start(self)
    }

    /// Lazy values over the direct children.
    pub fn values(&self) -> Values {
        Values::start(self)
    }

    /// Deep-read this subtree into a detached [`Value`] tree with one
    /// range scan.
    ///
    /// Fails with `Corrupt` if the stored rows break prefix closure or
    /// array density.
    pub fn snapshot(&self) -> Result<Value> {
        let prefix_bytes = self.prefix.encode()?;
        let range = ByteRange::children_of(&prefix_bytes);
        let rows = self.table.scan_range(&range.lower, &range.upper)?;
        let root = match self.kind {
            NodeKind::Record => Value::Record(RecordValue::new()),
            NodeKind::Array => Value::Array(ArrayValue::new()),
        };
        for (path_bytes, value_bytes) in rows {
            let path = Path::decode(&path_bytes)?;
            let Some(relative) = path.segments().get(self.prefix.depth()..) else {
                return Err(CanopyError::corrupt(format!(
                    "row at {path} inside the subtree of the longer prefix {}",
                    self.prefix
                )));
            };
            let row = RowValue::decode(&value_bytes)?;
            place_row(&root, relative, row)?;
        }
        Ok(root)
    }

    fn assign_length(&self, value: &Value) -> Result<()> {
        let requested = match value {
            Value::Scalar(Scalar::Number(n)) => *n,
            _ => {
                return Err(CanopyError::invalid_array_length(
                    "length must be a number",
                ))
            }
        };
        if !requested.is_finite()
            || requested.fract() != 0.0
            || requested < 0.0
            || requested >= f64::from(u32::MAX)
        {
            return Err(CanopyError::invalid_array_length(format!(
                "{requested} is not an integer in [0, {})",
                u32::MAX
            )));
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let new_len = requested as u32;
        let lower = self.prefix.child(Segment::Index(new_len)).encode()?;
        let upper = self.prefix.child(Segment::Index(u32::MAX)).encode()?;
        tracing::trace!(table = self.table.name(), path = %self.prefix, new_len, "truncate array");
        let guard = WriteGuard::begin(&self.table)?;
        self.table.delete_range(&lower, &upper)?;
        guard.commit()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("table", &self.table.name())
            .field("path", &self.prefix.to_string())
            .field("kind", &self.kind)
            .finish()
    }
}

/// Attach one decoded row to the value tree under construction. Rows
/// arrive in path order, so every interior composite was placed before
/// its children.
fn place_row(root: &Value, relative: &[Segment], row: RowValue) -> Result<()> {
    let Some((last, interior)) = relative.split_last() else {
        return Err(CanopyError::corrupt("row at its own subtree prefix"));
    };
    let mut current = root.clone();
    for segment in interior {
        current = step_into(&current, segment)?;
    }
    let value = match row {
        RowValue::Scalar(scalar) => Value::Scalar(scalar),
        RowValue::ArrayMarker => Value::Array(ArrayValue::new()),
        RowValue::RecordMarker => Value::Record(RecordValue::new()),
    };
    match &current {
        Value::Record(record) => {
            record.insert(last.to_key_string(), value);
            Ok(())
        }
        Value::Array(array) => match last {
            Segment::Index(i) if *i as usize == array.len() => {
                array.push(value);
                Ok(())
            }
            Segment::Index(i) => Err(CanopyError::corrupt(format!(
                "array row at index {i} breaks density (expected {})",
                array.len()
            ))),
            Segment::Key(key) => Err(CanopyError::corrupt(format!(
                "array holds the non-index row {key:?}"
            ))),
        },
        Value::Scalar(_) => Err(CanopyError::corrupt("row underneath a scalar")),
    }
}

fn step_into(current: &Value, segment: &Segment) -> Result<Value> {
    let next = match current {
        Value::Record(record) => record.get(&segment.to_key_string()),
        Value::Array(array) => match segment {
            Segment::Index(i) => array.get(*i as usize),
            Segment::Key(_) => None,
        },
        Value::Scalar(_) => None,
    };
    next.ok_or_else(|| {
        CanopyError::corrupt(format!("row without its parent composite at {segment}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn root() -> Node {
        Database::open(":memory:").unwrap().table("t").unwrap()
    }

    #[test]
    fn get_absent_key() {
        let root = root();
        assert!(root.get("missing").unwrap().is_none());
        assert!(!root.has("missing").unwrap());
    }

    #[test]
    fn scalar_set_then_get() {
        let root = root();
        root.set("x", 2.5).unwrap();
        let stored = root.get("x").unwrap().unwrap();
        assert_eq!(stored.as_scalar(), Some(&Scalar::Number(2.5)));
        assert!(root.has("x").unwrap());
    }

    #[test]
    fn composite_get_returns_handle() {
        let root = root();
        root.set("rec", Value::record([("a", Value::from(1.0))]))
            .unwrap();
        let stored = root.get("rec").unwrap().unwrap();
        let node = stored.as_node().expect("record handle");
        assert_eq!(node.kind(), NodeKind::Record);
        assert_eq!(node.path().to_string(), "$.rec");
        assert_eq!(
            node.get("a").unwrap().unwrap().as_scalar(),
            Some(&Scalar::Number(1.0))
        );
    }

    #[test]
    fn numeric_string_keys_normalize() {
        let root = root();
        root.set("0", "zero").unwrap();
        // "0" and 0 address the same row.
        assert_eq!(
            root.get(0_u32).unwrap().unwrap().as_scalar(),
            Some(&Scalar::from("zero"))
        );
        // "00" is a different, string-keyed row.
        assert!(root.get("00").unwrap().is_none());
    }

    #[test]
    fn array_rejects_non_index_writes() {
        let root = root();
        root.set("xs", Value::array([Value::from(1.0)])).unwrap();
        let xs = root.get("xs").unwrap().unwrap().into_node().unwrap();
        let err = xs.set("name", 1.0).unwrap_err();
        assert!(matches!(err, CanopyError::NotAnIndex { key } if key == "name"));
    }

    #[test]
    fn array_length_key_reads() {
        let root = root();
        root.set("xs", Value::array([Value::from(1.0), Value::from(2.0)]))
            .unwrap();
        let xs = root.get("xs").unwrap().unwrap().into_node().unwrap();
        assert!(xs.has("length").unwrap());
        assert_eq!(
            xs.get("length").unwrap().unwrap().as_scalar(),
            Some(&Scalar::Number(2.0))
        );
    }

    #[test]
    fn length_of_record_handle_is_zero() {
        let root = root();
        root.set("r", Value::record([("a", Value::from(1.0))]))
            .unwrap();
        let r = root.get("r").unwrap().unwrap().into_node().unwrap();
        assert_eq!(r.length().unwrap(), 0);
    }

    #[test]
    fn snapshot_empty_root() {
        let root = root();
        assert_eq!(root.snapshot().unwrap(), Value::Record(RecordValue::new()));
    }
}
