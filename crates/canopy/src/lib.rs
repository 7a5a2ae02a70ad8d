//! Persistent hierarchical objects on SQLite.
//!
//! A [`Database`] owns one SQLite file. Each named table behaves as a
//! mutable, arbitrarily nested dictionary: composites (records and arrays)
//! are flattened into one row per leaf, keyed by the order-preserving
//! encoding of the leaf's path, so reads and writes of any subtree touch
//! only that subtree's rows. Every read goes to the store; every write is
//! committed durably before returning.
//!
//! ```no_run
//! use canopy::{Database, Value};
//!
//! # fn main() -> canopy::Result<()> {
//! let db = Database::open("app.db")?;
//! let root = db.table("state")?;
//!
//! root.set("greeting", "hello")?;
//! root.set(
//!     "ints",
//!     Value::array([1.0.into(), 2.0.into(), 3.0.into()]),
//! )?;
//!
//! let ints = root.get("ints")?.and_then(|stored| stored.into_node());
//! if let Some(ints) = ints {
//!     assert_eq!(ints.length()?, 3);
//!     ints.set(3, 4.0)?;
//! }
//! # Ok(())
//! # }
//! ```

mod db;
mod iter;
mod node;
mod table;
mod value;
mod write;

pub use canopy_error::{CanopyError, Result};
pub use canopy_types::{BigIntLiteral, Path, RegexpLiteral, Scalar, Segment, Timestamp};

pub use db::Database;
pub use iter::{Entries, Keys, Values};
pub use node::{Node, NodeKind, Stored};
pub use value::{ArrayValue, RecordValue, Value};
