//! Plain data types and on-disk codecs for the Canopy object store.
//!
//! Everything in this crate is independent of the storage engine: path
//! segments and their order-preserving binary encoding, scalar leaf values
//! and their tagged encoding, and the byte-range arithmetic used to bound
//! subtree scans. The engine crate (`canopy`) composes these into the
//! navigator; other tooling can use them directly to read or produce
//! conforming files.

pub mod codec;
pub mod path;
pub mod range;
pub mod scalar;
pub mod segment;

pub use codec::{RowValue, ValueTag};
pub use path::Path;
pub use range::ByteRange;
pub use scalar::{BigIntLiteral, RegexpLiteral, Scalar, Timestamp};
pub use segment::Segment;
