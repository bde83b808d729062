use crate::error::StoreResult;
use crate::root::StorageRoot;

/// One registered container: its canonical shard path and last modification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerEntry {
    /// Canonical directory path of the container, relative to the shard root.
    pub path: String,
    /// Last modification time, unix seconds.
    pub modified: u64,
}

/// A Pairtree object store: containers keyed by identifier, holding named
/// byte streams.
///
/// All implementations must satisfy these invariants:
/// - Operations address containers by logical identifier; the backend derives
///   the canonical shard path itself, so callers never handle encoded paths
///   except as the informational return value of `put_stream`. The empty
///   identifier is rejected with `EmptyIdentifier`: it would address the
///   shard root itself rather than a container.
/// - Backends are interchangeable: the same operation sequence yields the
///   same observable results on every backend.
/// - A container is created implicitly by the first `put_stream` into it and
///   stays registered through any number of `put_stream`/`del_stream` calls,
///   even when its stream set becomes empty. Only `del_directory` removes it.
/// - Concurrent callers on disjoint identifiers need no coordination; writers
///   racing on the same stream resolve last-writer-wins via the backend's
///   atomic primitive.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Root metadata loaded or created when the store was opened.
    fn storage_root(&self) -> &StorageRoot;

    /// The URI prefix of this root. Re-opening an existing root keeps the
    /// stored prefix, so this may differ from what the caller passed in.
    fn uri_prefix(&self) -> &str {
        &self.storage_root().uri_prefix
    }

    /// Write (or overwrite) a stream in the container for `id`, creating the
    /// container if absent, and return the canonical directory path the
    /// stream landed in.
    ///
    /// With a `sub_path`, the stream nests inside the container and is
    /// addressed afterwards by the key `"<sub_path>/<stream_name>"`; the
    /// sub-path never registers as an independent container.
    fn put_stream(
        &self,
        id: &str,
        sub_path: Option<&str>,
        stream_name: &str,
        data: &[u8],
    ) -> StoreResult<String>;

    /// Read a stream back.
    ///
    /// `stream_name` may be path-qualified (`"sub/name"`) to reach streams
    /// written under a sub-path. Fails with `ContainerNotFound` or
    /// `StreamNotFound`.
    fn get_stream(&self, id: &str, stream_name: &str) -> StoreResult<Vec<u8>>;

    /// Remove one stream from the container for `id`.
    ///
    /// The container stays registered even when this removes its last
    /// stream; an emptied container still answers `exists` and appears in
    /// `list_ids`.
    fn del_stream(&self, id: &str, stream_name: &str) -> StoreResult<()>;

    /// Every stream of the container for `id`, as `(name, bytes)` pairs
    /// sorted by name. Streams written under a sub-path appear with their
    /// path-qualified names. Reserved metadata fields are not included.
    fn get_container(&self, id: &str) -> StoreResult<Vec<(String, Vec<u8>)>>;

    /// Whether a container is registered for `id`, regardless of emptiness.
    fn exists(&self, id: &str) -> StoreResult<bool>;

    /// Every registered container path with its last modification time,
    /// sorted by path, without duplicates.
    fn list_ids(&self) -> StoreResult<Vec<ContainerEntry>>;

    /// Remove every registered container whose canonical path equals `dir`
    /// or falls under it, plus `dir` itself.
    ///
    /// Fails with `ContainerNotFound` when nothing lives there. Individual
    /// removal failures do not abort the traversal; they are accumulated
    /// into one `DeleteIncomplete` error.
    fn del_directory(&self, dir: &str) -> StoreResult<()>;
}
