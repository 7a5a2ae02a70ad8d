use thiserror::Error;

/// Primary error type for Canopy operations.
///
/// Structured variants for the conditions the engine can actually hit:
/// codec failures on the write path, corruption on the read path, and
/// backend errors wrapped from the storage engine.
#[derive(Error, Debug)]
pub enum CanopyError {
    // === Encoding errors ===
    /// A record key contains a UTF-16 code unit at or above the key
    /// terminator, which the path encoding cannot represent.
    #[error("key contains code unit {unit:#06x} at position {index}; code units must be below 0xFFFE")]
    CodeUnitOutOfRange { unit: u16, index: usize },

    /// Text that was expected to be a decimal big-integer literal.
    #[error("not a big-integer literal: {literal:?}")]
    InvalidBigInt { literal: String },

    /// Array length assigned a non-integral, negative, or out-of-range value.
    #[error("invalid array length: {detail}")]
    InvalidArrayLength { detail: String },

    // === Decoding errors ===
    /// A stored path begins a segment with a byte that is not a known tag.
    #[error("unknown path tag {tag:#04x}")]
    UnknownPathTag { tag: u8 },

    /// A stored value begins with a byte that is not a known tag.
    #[error("unknown value tag {tag:#04x}")]
    UnknownValueTag { tag: u8 },

    /// Stored bytes are structurally malformed: truncated, ill-formed
    /// UTF-16, or rows that break prefix closure or array density.
    #[error("stored data is malformed: {detail}")]
    Corrupt { detail: String },

    // === Write errors ===
    /// The value graph being written contains itself.
    #[error("value graph contains a cycle")]
    CycleDetected,

    /// The synthetic `"length"` key of an array cannot be deleted.
    #[error("the length of an array cannot be deleted")]
    LengthNotDeletable,

    /// A write under an array handle used a key that is not an array index.
    /// Arrays may only contain numerically indexed children.
    #[error("array children are indexed by number; {key:?} is not an index")]
    NotAnIndex { key: String },

    /// A top-level write started while another write is active on the
    /// same table handle.
    #[error("a write is already active on this table")]
    NestedWrite,

    // === Database errors ===
    /// Operation on a handle whose database has been closed.
    #[error("database is closed")]
    DatabaseClosed,

    /// The backing storage engine reported an error.
    #[error(transparent)]
    Backend(#[from] rusqlite::Error),
}

impl CanopyError {
    /// Create a corruption error.
    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self::Corrupt {
            detail: detail.into(),
        }
    }

    /// Create an invalid-array-length error.
    pub fn invalid_array_length(detail: impl Into<String>) -> Self {
        Self::InvalidArrayLength {
            detail: detail.into(),
        }
    }

    /// Whether this error indicates on-disk corruption (or a file written
    /// by a newer, incompatible format revision) rather than caller error.
    pub const fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::UnknownPathTag { .. } | Self::UnknownValueTag { .. } | Self::Corrupt { .. }
        )
    }
}

/// Result type alias using `CanopyError`.
pub type Result<T> = std::result::Result<T, CanopyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_code_unit() {
        let err = CanopyError::CodeUnitOutOfRange {
            unit: 0xFFFF,
            index: 3,
        };
        assert_eq!(
            err.to_string(),
            "key contains code unit 0xffff at position 3; code units must be below 0xFFFE"
        );
    }

    #[test]
    fn error_display_corrupt() {
        let err = CanopyError::corrupt("value row is empty");
        assert_eq!(err.to_string(), "stored data is malformed: value row is empty");
    }

    #[test]
    fn error_display_bigint() {
        let err = CanopyError::InvalidBigInt {
            literal: "12a".to_owned(),
        };
        assert_eq!(err.to_string(), "not a big-integer literal: \"12a\"");
    }

    #[test]
    fn corruption_classification() {
        assert!(CanopyError::UnknownPathTag { tag: 0x7F }.is_corruption());
        assert!(CanopyError::UnknownValueTag { tag: 0x42 }.is_corruption());
        assert!(CanopyError::corrupt("x").is_corruption());
        assert!(!CanopyError::CycleDetected.is_corruption());
        assert!(!CanopyError::DatabaseClosed.is_corruption());
        assert!(!CanopyError::invalid_array_length("negative").is_corruption());
    }

    #[test]
    fn backend_error_from() {
        let sqlite_err = rusqlite::Error::QueryReturnedNoRows;
        let err: CanopyError = sqlite_err.into();
        assert!(matches!(err, CanopyError::Backend(_)));
    }
}
