use std::cell::Cell;
use std::rc::Rc;

use canopy_error::Result;
use rusqlite::{params, OptionalExtension};

use crate::db::DbShared;

/// Per-table state shared by every navigator handle of one table: the
/// backing database, the table's statement set, and the write-active flag
/// consulted by the transaction guard.
///
/// Handles never mutate this beyond the flag; child handle creation is a
/// reference-count bump plus a longer prefix.
pub(crate) struct TableShared {
    db: Rc<DbShared>,
    name: String,
    sql: StatementSet,
    write_active: Cell<bool>,
}

/// The SQL executed against one table, interpolated once at handle
/// creation and run through the connection's prepared-statement cache.
struct StatementSet {
    select_one: String,
    select_range: String,
    select_first_in_range: String,
    insert: String,
    delete_range: String,
    max_numeric_child: String,
}

impl StatementSet {
    fn for_table(name: &str) -> Self {
        let table = format!("\"{name}\"");
        Self {
            select_one: format!("SELECT value FROM {table} WHERE path = ?1"),
            select_range: format!(
                "SELECT path, value FROM {table} WHERE path >= ?1 AND path < ?2 ORDER BY path"
            ),
            select_first_in_range: format!(
                "SELECT path, value FROM {table} WHERE path >= ?1 AND path < ?2 \
                 ORDER BY path LIMIT 1"
            ),
            insert: format!("INSERT INTO {table} (path, value) VALUES (?1, ?2)"),
            delete_range: format!("DELETE FROM {table} WHERE path >= ?1 AND path < ?2"),
            max_numeric_child: format!(
                "SELECT path FROM {table} WHERE path >= ?1 AND path < ?2 \
                 AND length(path) = length(?1) ORDER BY path DESC LIMIT 1"
            ),
        }
    }
}

impl TableShared {
    /// Ensure the backing table exists and build the shared state.
    ///
    /// The name is quoted literally; identifier safety is the caller's
    /// contract (see [`crate::Database::table`]).
    pub(crate) fn open(db: Rc<DbShared>, name: &str) -> Result<Rc<Self>> {
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{name}\" \
             (path BLOB PRIMARY KEY NOT NULL, value BLOB NOT NULL) WITHOUT ROWID"
        );
        db.with_conn(|conn| {
            conn.execute_batch(&ddl)?;
            Ok(())
        })?;
        tracing::debug!(table = name, "ensured object table");
        Ok(Rc::new(Self {
            db,
            name: name.to_owned(),
            sql: StatementSet::for_table(name),
            write_active: Cell::new(false),
        }))
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Point lookup of the value stored at an exact encoded path.
    pub(crate) fn select_one(&self, path: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql.select_one)?;
            Ok(stmt
                .query_row(params![path], |row| row.get(0))
                .optional()?)
        })
    }

    /// The first `(path, value)` row with `path` in `[lower, upper)`.
    pub(crate) fn first_in_range(
        &self,
        lower: &[u8],
        upper: &[u8],
    ) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql.select_first_in_range)?;
            Ok(stmt
                .query_row(params![lower, upper], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .optional()?)
        })
    }

    /// Every `(path, value)` row with `path` in `[lower, upper)`, in path
    /// order.
    pub(crate) fn scan_range(&self, lower: &[u8], upper: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql.select_range)?;
            let rows = stmt.query_map(params![lower, upper], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
    }

    /// Insert one row. The path must not already exist (writes clear the
    /// target range first).
    pub(crate) fn insert(&self, path: &[u8], value: &[u8]) -> Result<()> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql.insert)?;
            stmt.execute(params![path, value])?;
            Ok(())
        })
    }

    /// Delete every row with `path` in `[lower, upper)`; returns how many
    /// rows went away.
    pub(crate) fn delete_range(&self, lower: &[u8], upper: &[u8]) -> Result<usize> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql.delete_range)?;
            Ok(stmt.execute(params![lower, upper])?)
        })
    }

    /// Among rows in `[lower, upper)` whose path is exactly as long as
    /// `lower` (the direct numeric children), the greatest path.
    pub(crate) fn max_numeric_child(&self, lower: &[u8], upper: &[u8]) -> Result<Option<Vec<u8>>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare_cached(&self.sql.max_numeric_child)?;
            Ok(stmt
                .query_row(params![lower, upper], |row| row.get(0))
                .optional()?)
        })
    }

    // === Transaction primitives (used by the write guard) ===

    pub(crate) fn txn_begin(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch("BEGIN IMMEDIATE")?;
            Ok(())
        })
    }

    pub(crate) fn txn_commit(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch("COMMIT")?;
            Ok(())
        })
    }

    pub(crate) fn txn_rollback(&self) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute_batch("ROLLBACK")?;
            Ok(())
        })
    }

    pub(crate) fn is_write_active(&self) -> bool {
        self.write_active.get()
    }

    pub(crate) fn set_write_active(&self, active: bool) {
        self.write_active.set(active);
    }
}
