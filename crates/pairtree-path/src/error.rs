/// Errors from identifier encoding and path mapping.
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    /// A `^` escape was not followed by exactly two hex digits.
    #[error("malformed escape in {encoded:?} at byte {position}: '^' must be followed by two hex digits")]
    MalformedEscape { encoded: String, position: usize },

    /// The decoded byte sequence is not valid UTF-8.
    #[error("decoded bytes of {encoded:?} are not valid UTF-8")]
    InvalidUtf8 { encoded: String },

    /// Shard width of zero would produce no path segments.
    #[error("shard width must be at least 1, got {0}")]
    InvalidShardWidth(usize),
}

/// Result alias for path operations.
pub type Result<T> = std::result::Result<T, PathError>;
