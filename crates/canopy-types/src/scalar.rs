use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use canopy_error::{CanopyError, Result};

/// A scalar leaf value.
///
/// Scalars are the values that occupy one row each; records and arrays are
/// represented by marker rows instead (see [`crate::codec`]).
///
/// Equality is total and bit-exact for the double-backed variants: two
/// numbers (or timestamps) are equal iff their IEEE-754 bit patterns are,
/// so `NaN == NaN` and `0.0 != -0.0`. This keeps round-trip laws lawful
/// for every value the store accepts.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Scalar {
    /// The null value.
    Null,
    /// A boolean.
    Bool(bool),
    /// A 64-bit IEEE-754 double.
    Number(f64),
    /// A string. Unlike record keys, value strings may contain any code
    /// units representable in well-formed UTF-16.
    Text(String),
    /// An arbitrary-precision integer, carried as its canonical decimal
    /// literal.
    BigInt(BigIntLiteral),
    /// Milliseconds since the Unix epoch.
    Timestamp(Timestamp),
    /// A regular-expression literal: source and flags, uninterpreted.
    Regexp(RegexpLiteral),
}

impl Scalar {
    /// Returns true if this is the null value.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Try to extract a boolean.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Try to extract a number.
    pub const fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Try to extract a text reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract a big-integer literal.
    pub const fn as_bigint(&self) -> Option<&BigIntLiteral> {
        match self {
            Self::BigInt(b) => Some(b),
            _ => None,
        }
    }

    /// Try to extract a timestamp.
    pub const fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    /// Try to extract a regexp literal.
    pub const fn as_regexp(&self) -> Option<&RegexpLiteral> {
        match self {
            Self::Regexp(r) => Some(r),
            _ => None,
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::BigInt(a), Self::BigInt(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::Regexp(a), Self::Regexp(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Scalar {}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s:?}"),
            Self::BigInt(b) => write!(f, "{b}"),
            Self::Timestamp(t) => write!(f, "{t}"),
            Self::Regexp(r) => write!(f, "{r}"),
        }
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Scalar {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Scalar {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<u32> for Scalar {
    fn from(n: u32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<BigIntLiteral> for Scalar {
    fn from(b: BigIntLiteral) -> Self {
        Self::BigInt(b)
    }
}

impl From<Timestamp> for Scalar {
    fn from(t: Timestamp) -> Self {
        Self::Timestamp(t)
    }
}

impl From<RegexpLiteral> for Scalar {
    fn from(r: RegexpLiteral) -> Self {
        Self::Regexp(r)
    }
}

/// An arbitrary-precision integer as its canonical decimal literal.
///
/// Canonical means an optional leading `-`, then digits with no leading
/// zeros (`"0"` stands alone; `"-0"` is not canonical). The literal *is*
/// the stored representation, so magnitude is unbounded.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BigIntLiteral(String);

impl BigIntLiteral {
    /// Validate a decimal literal.
    pub fn new(literal: impl Into<String>) -> Result<Self> {
        let literal = literal.into();
        let digits = literal.strip_prefix('-').unwrap_or(&literal);
        let canonical = !digits.is_empty()
            && digits.bytes().all(|b| b.is_ascii_digit())
            && (digits.len() == 1 || !digits.starts_with('0'))
            && (literal.as_bytes()[0] != b'-' || digits != "0");
        if canonical {
            Ok(Self(literal))
        } else {
            Err(CanopyError::InvalidBigInt { literal })
        }
    }

    /// The literal as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for BigIntLiteral {
    fn from(n: i64) -> Self {
        Self(n.to_string())
    }
}

impl From<u64> for BigIntLiteral {
    fn from(n: u64) -> Self {
        Self(n.to_string())
    }
}

impl From<i128> for BigIntLiteral {
    fn from(n: i128) -> Self {
        Self(n.to_string())
    }
}

impl FromStr for BigIntLiteral {
    type Err = CanopyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for BigIntLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Milliseconds since the Unix epoch, carried as a double.
///
/// Equality is bit-exact, like [`Scalar::Number`].
#[derive(Clone, Copy, Debug, serde::Serialize, serde::Deserialize)]
pub struct Timestamp(f64);

impl Timestamp {
    /// Construct from raw milliseconds.
    pub const fn from_millis(millis: f64) -> Self {
        Self(millis)
    }

    /// Raw milliseconds since the epoch.
    pub const fn millis(self) -> f64 {
        self.0
    }

    /// The current wall-clock time.
    pub fn now() -> Self {
        SystemTime::now().into()
    }
}

impl From<SystemTime> for Timestamp {
    #[allow(clippy::cast_precision_loss)]
    fn from(t: SystemTime) -> Self {
        let millis = match t.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_millis() as f64,
            Err(err) => -(err.duration().as_millis() as f64),
        };
        Self(millis)
    }
}

impl PartialEq for Timestamp {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Timestamp {}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// A regular-expression literal: source text and flags.
///
/// The store does not compile or interpret the pattern; it round-trips the
/// textual form `/source/flags`. Flags must not contain `/` (no real flag
/// set does), since the final slash delimits them.
#[derive(Clone, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct RegexpLiteral {
    source: String,
    flags: String,
}

impl RegexpLiteral {
    /// Build a literal from source and flags.
    pub fn new(source: impl Into<String>, flags: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            flags: flags.into(),
        }
    }

    /// The pattern source, without delimiters.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// The flags.
    pub fn flags(&self) -> &str {
        &self.flags
    }

    /// Parse the textual form `/source/flags`. The last slash delimits the
    /// flags, so the source may itself contain slashes.
    pub fn from_text(text: &str) -> Result<Self> {
        let rest = text
            .strip_prefix('/')
            .ok_or_else(|| CanopyError::corrupt("regexp literal does not start with '/'"))?;
        let split = rest
            .rfind('/')
            .ok_or_else(|| CanopyError::corrupt("regexp literal has no closing '/'"))?;
        Ok(Self {
            source: rest[..split].to_owned(),
            flags: rest[split + 1..].to_owned(),
        })
    }
}

impl fmt::Display for RegexpLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.source, self.flags)
    }
}
