use std::cell::RefCell;
use std::fmt;
use std::path::{Path as FsPath, PathBuf};
use std::rc::Rc;

use canopy_error::{CanopyError, Result};
use rusqlite::Connection;

use crate::node::Node;
use crate::table::TableShared;

/// An open database file.
///
/// The handle owns the underlying connection; tables and the navigators
/// derived from them share it. [`Database::close`] releases the file and
/// turns every derived handle inert: their operations fail with
/// [`CanopyError::DatabaseClosed`].
///
/// Handles are single-threaded (`Rc`-based) and all operations block until
/// the storage engine returns.
pub struct Database {
    shared: Rc<DbShared>,
}

pub(crate) struct DbShared {
    path: PathBuf,
    conn: RefCell<Option<Connection>>,
}

impl DbShared {
    /// Run `f` against the live connection, or fail if the database has
    /// been closed.
    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.borrow();
        match guard.as_ref() {
            Some(conn) => f(conn),
            None => Err(CanopyError::DatabaseClosed),
        }
    }
}

impl Database {
    /// Open (creating if necessary) the database file at `path`.
    ///
    /// The file is put in WAL journal mode with `synchronous=NORMAL`:
    /// every committed write is durable, with throughput to match.
    /// A relative path resolves against the process working directory.
    pub fn open(path: impl AsRef<FsPath>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        // Each table carries six statements; keep them all warm.
        conn.set_prepared_statement_cache_capacity(64);
        tracing::debug!(path = %path.display(), "opened database");
        Ok(Self {
            shared: Rc::new(DbShared {
                path,
                conn: RefCell::new(Some(conn)),
            }),
        })
    }

    /// The filesystem path this database was opened with.
    pub fn path(&self) -> &FsPath {
        &self.shared.path
    }

    /// The root handle of the named table, creating the table on first use.
    ///
    /// The name is quoted into the DDL as-is; callers must supply a safe
    /// identifier (in particular, no embedded `"`).
    pub fn table(&self, name: &str) -> Result<Node> {
        let table = TableShared::open(Rc::clone(&self.shared), name)?;
        Ok(Node::root(table))
    }

    /// Close the database, releasing the file.
    ///
    /// Tables and navigators derived from this handle keep existing but
    /// fail all subsequent operations with `DatabaseClosed`.
    pub fn close(self) -> Result<()> {
        let conn = self.shared.conn.borrow_mut().take();
        if let Some(conn) = conn {
            conn.close().map_err(|(_conn, err)| CanopyError::Backend(err))?;
        }
        tracing::debug!(path = %self.shared.path.display(), "closed database");
        Ok(())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.shared.path)
            .field("open", &self.shared.conn.borrow().is_some())
            .finish()
    }
}
