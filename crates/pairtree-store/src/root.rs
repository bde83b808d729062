//! Root-level Pairtree metadata.
//!
//! Every Pairtree root carries a URI prefix and a conformance marker,
//! written once at initialization. On the filesystem these are the
//! `pairtree_prefix` and `pairtree_version0_1` files next to the
//! `pairtree_root` directory; in the key-value layout they are fields of the
//! hash keyed by the root name.

/// Metadata file / hash field holding the URI prefix.
pub const PREFIX_FIELD: &str = "pairtree_prefix";

/// Directory / hash field marking the shard tree root.
pub const ROOT_FIELD: &str = "pairtree_root";

/// Metadata file / hash field holding the conformance statement.
pub const VERSION_FIELD: &str = "pairtree_version0_1";

/// Suffix of the registry set key in the key-value layout.
pub const REGISTRY_SUFFIX: &str = ":keys";

/// Reserved per-container metadata field: last modification, unix seconds.
pub const TIME_FIELD: &str = "time";

/// Reserved per-container metadata field: byte size of the last write.
pub const SIZE_FIELD: &str = "size";

/// Conformance statement written to `pairtree_version0_1`.
pub const CONFORMANCE_STATEMENT: &str = "This directory conforms to Pairtree Version 0.1.\n\
Updated spec: http://www.cdlib.org/inside/diglib/pairtree/pairtreespec.html\n";

/// Root metadata: the URI prefix and version marker of one Pairtree root.
///
/// Created once, lazily, on first use of a root name; loading an existing
/// root keeps the stored prefix and ignores whatever prefix the caller
/// supplied (a documented policy, not an error).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StorageRoot {
    /// URI prefix prepended to identifiers when they are resolved.
    pub uri_prefix: String,
    /// Conformance statement for the Pairtree version in use.
    pub version: String,
}

impl StorageRoot {
    /// Fresh root metadata with the current conformance statement.
    pub fn new(uri_prefix: impl Into<String>) -> Self {
        Self {
            uri_prefix: uri_prefix.into(),
            version: CONFORMANCE_STATEMENT.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_root_carries_conformance_statement() {
        let root = StorageRoot::new("http://");
        assert_eq!(root.uri_prefix, "http://");
        assert!(root.version.contains("Pairtree Version 0.1"));
    }
}
