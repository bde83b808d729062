//! Shard path mapping ("shorty" grouping).
//!
//! An encoded identifier is split left-to-right into fixed-width segments and
//! the segments are joined with `/` to form a directory path. Joining the
//! segments back together reproduces the encoded identifier exactly, so the
//! mapping is reversible for any shard width.

use crate::codec::{decode, encode};
use crate::error::{PathError, Result};

/// Splits encoded identifiers into fixed-width directory segments.
///
/// # Examples
///
/// ```
/// use pairtree_path::PathMapper;
///
/// let mapper = PathMapper::default();
/// assert_eq!(mapper.id_to_path("foobar:/ark.1"), "fo/ob/ar/+=/ar/k,/1");
/// assert_eq!(PathMapper::from_path("fo/ob/ar/+=/ar/k,/1"), "foobar+=ark,1");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathMapper {
    shard_width: usize,
}

impl PathMapper {
    /// Default number of characters per segment. Two balances directory
    /// fan-out against tree depth.
    pub const DEFAULT_SHARD_WIDTH: usize = 2;

    /// Create a mapper with the given shard width.
    ///
    /// # Errors
    ///
    /// [`PathError::InvalidShardWidth`] when `shard_width` is zero.
    pub fn new(shard_width: usize) -> Result<Self> {
        if shard_width == 0 {
            return Err(PathError::InvalidShardWidth(shard_width));
        }
        Ok(Self { shard_width })
    }

    /// The configured segment width.
    pub fn shard_width(&self) -> usize {
        self.shard_width
    }

    /// Split an encoded identifier into segments of `shard_width` characters.
    ///
    /// The final segment may be shorter; it is never padded. An empty
    /// identifier yields no segments.
    pub fn segments(&self, encoded: &str) -> Vec<String> {
        let chars: Vec<char> = encoded.chars().collect();
        chars
            .chunks(self.shard_width)
            .map(|chunk| chunk.iter().collect())
            .collect()
    }

    /// The directory path for an encoded identifier: segments joined with `/`.
    pub fn to_path(&self, encoded: &str) -> String {
        self.segments(encoded).join("/")
    }

    /// The directory path for a logical identifier (encode, then shard).
    pub fn id_to_path(&self, id: &str) -> String {
        self.to_path(&encode(id))
    }

    /// Recover the encoded identifier from a directory path by stripping the
    /// separators. Inverse of [`PathMapper::to_path`] for any shard width.
    pub fn from_path(path: &str) -> String {
        path.split('/').collect()
    }

    /// Recover the logical identifier from a directory path.
    pub fn id_from_path(path: &str) -> Result<String> {
        decode(&Self::from_path(path))
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self {
            shard_width: Self::DEFAULT_SHARD_WIDTH,
        }
    }
}
