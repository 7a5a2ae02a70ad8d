//! The transaction guard and the recursive composite writer.
//!
//! Exactly one transaction wraps each top-level mutation; recursive
//! composite writes share it. The guard rolls back on drop unless
//! committed, so any error raised mid-write leaves the table exactly as it
//! was.

use std::collections::HashSet;

use canopy_error::{CanopyError, Result};
use canopy_types::codec::{encode_scalar, ARRAY_MARKER, RECORD_MARKER};
use canopy_types::Segment;

use crate::table::TableShared;
use crate::value::Value;

/// RAII wrapper for a top-level write: `BEGIN IMMEDIATE` on creation,
/// rollback on drop unless [`WriteGuard::commit`] ran.
pub(crate) struct WriteGuard<'a> {
    table: &'a TableShared,
    committed: bool,
}

impl<'a> WriteGuard<'a> {
    /// Open the write transaction, refusing re-entry on the same table.
    pub(crate) fn begin(table: &'a TableShared) -> Result<Self> {
        if table.is_write_active() {
            return Err(CanopyError::NestedWrite);
        }
        table.txn_begin()?;
        table.set_write_active(true);
        Ok(Self {
            table,
            committed: false,
        })
    }

    /// Commit the write.
    pub(crate) fn commit(mut self) -> Result<()> {
        self.table.txn_commit()?;
        self.committed = true;
        self.table.set_write_active(false);
        Ok(())
    }
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            // Best-effort rollback; drop cannot propagate the error.
            if let Err(err) = self.table.txn_rollback() {
                tracing::warn!(table = self.table.name(), error = %err, "rollback failed");
            }
            self.table.set_write_active(false);
        }
    }
}

/// Identity set over the composites serialized by one top-level write.
///
/// Keys are `Rc` allocation addresses of the *source* graph. Entries are
/// never removed during the write: encountering any composite a second
/// time (an ancestor or a shared sibling) fails the write. The context
/// dies with the write, so equality of contents across writes is never
/// consulted.
pub(crate) struct WriteContext {
    seen: HashSet<usize>,
}

impl WriteContext {
    pub(crate) fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    fn enter(&mut self, identity: usize) -> Result<()> {
        if self.seen.insert(identity) {
            Ok(())
        } else {
            Err(CanopyError::CycleDetected)
        }
    }
}

/// Write `value` at the already-cleared path `path_bytes`, recursing into
/// composites. Children of arrays take ascending index segments; children
/// of records take their normalized keys.
pub(crate) fn write_tree(
    table: &TableShared,
    path_bytes: Vec<u8>,
    value: &Value,
    ctx: &mut WriteContext,
) -> Result<()> {
    match value {
        Value::Scalar(scalar) => table.insert(&path_bytes, &encode_scalar(scalar)),
        Value::Array(array) => {
            ctx.enter(array.identity())?;
            table.insert(&path_bytes, &ARRAY_MARKER)?;
            let items = array.items();
            for (index, item) in items.iter().enumerate() {
                let index = u32::try_from(index)
                    .ok()
                    .filter(|i| *i < u32::MAX)
                    .ok_or_else(|| {
                        CanopyError::invalid_array_length(format!(
                            "array has more than {} elements",
                            u32::MAX - 1
                        ))
                    })?;
                let mut child = path_bytes.clone();
                Segment::Index(index).encode_into(&mut child)?;
                write_tree(table, child, item, ctx)?;
            }
            Ok(())
        }
        Value::Record(record) => {
            ctx.enter(record.identity())?;
            table.insert(&path_bytes, &RECORD_MARKER)?;
            let entries = record.entries();
            for (key, item) in entries.iter() {
                let mut child = path_bytes.clone();
                Segment::normalize(key).encode_into(&mut child)?;
                write_tree(table, child, item, ctx)?;
            }
            Ok(())
        }
    }
}
