//! Filesystem backend: containers are real nested directories.
//!
//! Layout:
//!
//! ```text
//! <root>/pairtree_prefix                         text: URI prefix
//! <root>/pairtree_version0_1                     text: conformance marker
//! <root>/pairtree_root/<shard>/.../<streamName>  regular files
//! ```
//!
//! Streams are written to a temp file in the destination directory and then
//! persisted with an atomic rename, so a failed write never leaves a partial
//! stream visible.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use pairtree_path::{encode, is_encoded_char, PathMapper};

use crate::error::{StoreError, StoreResult};
use crate::names::{
    normalize_sub_path, validate_identifier, validate_stream_key, validate_stream_name,
};
use crate::root::{
    StorageRoot, CONFORMANCE_STATEMENT, PREFIX_FIELD, ROOT_FIELD, VERSION_FIELD,
};
use crate::traits::{ContainerEntry, ObjectStore};

/// Pairtree store backed by real directories and files.
pub struct FilesystemStore {
    root: PathBuf,
    mapper: PathMapper,
    storage_root: StorageRoot,
}

impl FilesystemStore {
    /// Open the Pairtree root at `root`, creating it if absent.
    ///
    /// Idempotent: when `<root>/pairtree_prefix` already exists the stored
    /// prefix is loaded and `uri_prefix` is ignored; otherwise the root
    /// metadata is written with the given prefix and the conformance marker.
    pub fn open(root: impl Into<PathBuf>, uri_prefix: &str, mapper: PathMapper) -> StoreResult<Self> {
        let root = root.into();
        let prefix_file = root.join(PREFIX_FIELD);

        let storage_root = if prefix_file.is_file() {
            let uri_prefix = fs::read_to_string(&prefix_file)?;
            let version = fs::read_to_string(root.join(VERSION_FIELD))
                .unwrap_or_else(|_| CONFORMANCE_STATEMENT.to_string());
            debug!(root = %root.display(), "opened existing pairtree root, keeping stored prefix");
            StorageRoot {
                uri_prefix,
                version,
            }
        } else {
            fs::create_dir_all(root.join(ROOT_FIELD))?;
            write_atomic(&root, PREFIX_FIELD, uri_prefix.as_bytes())?;
            write_atomic(&root, VERSION_FIELD, CONFORMANCE_STATEMENT.as_bytes())?;
            debug!(root = %root.display(), uri_prefix, "initialized pairtree root");
            StorageRoot::new(uri_prefix)
        };

        Ok(Self {
            root,
            mapper,
            storage_root,
        })
    }

    /// The shard mapper this store was opened with.
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    fn shard_base(&self) -> PathBuf {
        self.root.join(ROOT_FIELD)
    }

    /// Canonical path of the container for `id`, both relative (with `/`
    /// separators) and absolute on disk.
    fn container_dir(&self, id: &str) -> (String, PathBuf) {
        let rel = self.mapper.to_path(&encode(id));
        let dir = self.shard_base().join(&rel);
        (rel, dir)
    }

    fn collect_containers(
        &self,
        dir: &Path,
        rel: &str,
        out: &mut Vec<ContainerEntry>,
    ) -> StoreResult<()> {
        let mut has_stream_entry = false;
        let mut is_empty = true;
        let mut shard_children: Vec<(String, PathBuf)> = Vec::new();

        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            is_empty = false;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() && is_shard_segment(&name, self.mapper.shard_width()) {
                shard_children.push((name, entry.path()));
            } else {
                // A regular file, or a sub-path directory: either way this
                // directory is a container, not an intermediate shard level.
                has_stream_entry = true;
            }
        }

        if !rel.is_empty() && (has_stream_entry || is_empty) {
            out.push(ContainerEntry {
                path: rel.to_string(),
                modified: modified_secs(&fs::metadata(dir)?),
            });
        }

        // Shard-shaped children may lead to containers whose shard path
        // extends this one, so always descend into them.
        for (name, path) in shard_children {
            let child_rel = if rel.is_empty() {
                name
            } else {
                format!("{rel}/{name}")
            };
            self.collect_containers(&path, &child_rel, out)?;
        }
        Ok(())
    }
}

impl ObjectStore for FilesystemStore {
    fn storage_root(&self) -> &StorageRoot {
        &self.storage_root
    }

    fn put_stream(
        &self,
        id: &str,
        sub_path: Option<&str>,
        stream_name: &str,
        data: &[u8],
    ) -> StoreResult<String> {
        validate_identifier(id)?;
        validate_stream_name(stream_name)?;
        let sub = normalize_sub_path(sub_path)?;

        let (rel, container) = self.container_dir(id);
        let (ret_path, target_dir) = match &sub {
            Some(sub) => (format!("{rel}/{sub}"), container.join(sub)),
            None => (rel.clone(), container),
        };

        fs::create_dir_all(&target_dir)?;
        let mut tmp = NamedTempFile::new_in(&target_dir)?;
        tmp.write_all(data)?;
        tmp.persist(target_dir.join(stream_name))
            .map_err(|err| err.error)?;

        debug!(path = %ret_path, stream = stream_name, bytes = data.len(), "put stream");
        Ok(ret_path)
    }

    fn get_stream(&self, id: &str, stream_name: &str) -> StoreResult<Vec<u8>> {
        validate_identifier(id)?;
        validate_stream_key(stream_name)?;
        let (rel, container) = self.container_dir(id);
        if !is_container_dir(&container, self.mapper.shard_width())? {
            return Err(StoreError::ContainerNotFound { path: rel });
        }
        match fs::read(container.join(stream_name)) {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::StreamNotFound {
                    path: rel,
                    stream: stream_name.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn del_stream(&self, id: &str, stream_name: &str) -> StoreResult<()> {
        validate_identifier(id)?;
        validate_stream_key(stream_name)?;
        let (rel, container) = self.container_dir(id);
        if !is_container_dir(&container, self.mapper.shard_width())? {
            return Err(StoreError::ContainerNotFound { path: rel });
        }
        match fs::remove_file(container.join(stream_name)) {
            Ok(()) => {
                debug!(path = %rel, stream = stream_name, "deleted stream");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::StreamNotFound {
                    path: rel,
                    stream: stream_name.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn get_container(&self, id: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        validate_identifier(id)?;
        let (rel, container) = self.container_dir(id);
        if !is_container_dir(&container, self.mapper.shard_width())? {
            return Err(StoreError::ContainerNotFound { path: rel });
        }
        let mut streams = Vec::new();
        collect_streams(&container, "", self.mapper.shard_width(), &mut streams)?;
        streams.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(streams)
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        validate_identifier(id)?;
        let (_, container) = self.container_dir(id);
        is_container_dir(&container, self.mapper.shard_width())
    }

    fn list_ids(&self) -> StoreResult<Vec<ContainerEntry>> {
        let mut out = Vec::new();
        self.collect_containers(&self.shard_base(), "", &mut out)?;
        out.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(out)
    }

    fn del_directory(&self, dir: &str) -> StoreResult<()> {
        let dir_owned = match normalize_sub_path(Some(dir))? {
            Some(dir) => dir,
            None => {
                return Err(StoreError::InvalidSubPath {
                    path: dir.to_string(),
                    reason: "directory name must not be empty".to_string(),
                })
            }
        };
        let target = self.shard_base().join(&dir_owned);
        if !target.is_dir() {
            return Err(StoreError::ContainerNotFound { path: dir_owned });
        }

        let mut failures = Vec::new();
        remove_tree(&target, &mut failures);
        if failures.is_empty() {
            debug!(dir = %dir_owned, "deleted directory");
            Ok(())
        } else {
            warn!(dir = %dir_owned, failed = failures.len(), "directory deletion incomplete");
            Err(StoreError::DeleteIncomplete {
                dir: dir_owned,
                failures,
            })
        }
    }
}

impl std::fmt::Debug for FilesystemStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesystemStore")
            .field("root", &self.root)
            .field("shard_width", &self.mapper.shard_width())
            .finish()
    }
}

/// Write a root metadata file via temp file + atomic rename.
fn write_atomic(dir: &Path, name: &str, data: &[u8]) -> StoreResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(dir.join(name)).map_err(|err| err.error)?;
    Ok(())
}

/// Whether a directory name could be a shard segment produced by the mapper:
/// at most `shard_width` characters, all from the encoded alphabet.
fn is_shard_segment(name: &str, shard_width: usize) -> bool {
    let len = name.chars().count();
    len >= 1 && len <= shard_width && name.chars().all(is_encoded_char)
}

/// Whether `dir` is a container directory rather than an intermediate shard
/// level: it exists and is empty (a container whose streams were all
/// deleted), holds a regular file, or holds a sub-path directory. A
/// directory holding only shard-shaped subdirectories is an intermediate
/// level that was never put into.
fn is_container_dir(dir: &Path, shard_width: usize) -> StoreResult<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut is_empty = true;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        is_empty = false;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !entry.file_type()?.is_dir() || !is_shard_segment(&name, shard_width) {
            return Ok(true);
        }
    }
    Ok(is_empty)
}

/// Gather every stream of a container, descending into sub-path directories
/// and qualifying nested names with their relative path. Shard-shaped
/// subdirectories at the top level belong to deeper shard levels, not to
/// this container; below a sub-path everything is the container's.
fn collect_streams(
    dir: &Path,
    prefix: &str,
    shard_width: usize,
    out: &mut Vec<(String, Vec<u8>)>,
) -> StoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        let qualified = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            if prefix.is_empty() && is_shard_segment(&name, shard_width) {
                continue;
            }
            collect_streams(&entry.path(), &qualified, shard_width, out)?;
        } else {
            out.push((qualified, fs::read(entry.path())?));
        }
    }
    Ok(())
}

/// Post-order removal of a directory tree. Failures do not abort the
/// traversal; each is recorded so the caller can report them all at once.
fn remove_tree(path: &Path, failures: &mut Vec<String>) {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(err) => {
            failures.push(format!("{}: {err}", path.display()));
            return;
        }
    };
    for entry in entries {
        match entry {
            Ok(entry) => {
                let child = entry.path();
                if child.is_dir() {
                    remove_tree(&child, failures);
                } else if let Err(err) = fs::remove_file(&child) {
                    failures.push(format!("{}: {err}", child.display()));
                }
            }
            Err(err) => failures.push(format!("{}: {err}", path.display())),
        }
    }
    if let Err(err) = fs::remove_dir(path) {
        failures.push(format!("{}: {err}", path.display()));
    }
}

/// Modification time of a filesystem entry as unix seconds.
fn modified_secs(meta: &fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_store(dir: &Path) -> FilesystemStore {
        FilesystemStore::open(dir.join("data"), "http://", PathMapper::default()).unwrap()
    }

    // -----------------------------------------------------------------------
    // Root initialization
    // -----------------------------------------------------------------------

    #[test]
    fn open_creates_root_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        let root = dir.path().join("data");
        assert!(root.join(ROOT_FIELD).is_dir());
        assert_eq!(
            fs::read_to_string(root.join(PREFIX_FIELD)).unwrap(),
            "http://"
        );
        let version = fs::read_to_string(root.join(VERSION_FIELD)).unwrap();
        assert!(version.contains("Pairtree Version 0.1"));
        assert_eq!(store.uri_prefix(), "http://");
    }

    #[test]
    fn reopen_keeps_stored_prefix() {
        let dir = tempfile::tempdir().unwrap();
        open_store(dir.path());

        let reopened =
            FilesystemStore::open(dir.path().join("data"), "ftp://", PathMapper::default())
                .unwrap();
        assert_eq!(reopened.uri_prefix(), "http://");
    }

    // -----------------------------------------------------------------------
    // Stream round trips
    // -----------------------------------------------------------------------

    #[test]
    fn put_then_get_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        let path = store
            .put_stream("test", None, "teststream", b"test file")
            .unwrap();
        assert_eq!(path, "te/st");
        assert_eq!(store.get_stream("test", "teststream").unwrap(), b"test file");
    }

    #[test]
    fn put_overwrites_without_separate_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", None, "s", b"first").unwrap();
        store.put_stream("test", None, "s", b"second").unwrap();
        assert_eq!(store.get_stream("test", "s").unwrap(), b"second");
    }

    #[test]
    fn streams_land_under_canonical_shard_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        let path = store
            .put_stream("foobar:/ark.1", None, "obj", b"x")
            .unwrap();
        assert_eq!(path, "fo/ob/ar/+=/ar/k,/1");
        assert!(dir
            .path()
            .join("data")
            .join(ROOT_FIELD)
            .join("fo/ob/ar/+=/ar/k,/1/obj")
            .is_file());
    }

    #[test]
    fn sub_path_streams_nest_inside_the_container() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        let path = store
            .put_stream("test", Some("sub"), "teststream", b"nested")
            .unwrap();
        assert_eq!(path, "te/st/sub");
        assert_eq!(store.get_stream("test", "sub/teststream").unwrap(), b"nested");

        // The sub-path is not a container of its own.
        let listed: Vec<_> = store.list_ids().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "te/st");
    }

    // -----------------------------------------------------------------------
    // Deletion and the emptied-container policy
    // -----------------------------------------------------------------------

    #[test]
    fn del_stream_removes_only_the_named_stream() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", None, "keep", b"kept").unwrap();
        store.put_stream("test", None, "drop", b"dropped").unwrap();
        store.del_stream("test", "drop").unwrap();

        assert!(store.exists("test").unwrap());
        assert_eq!(store.get_stream("test", "keep").unwrap(), b"kept");
        assert!(matches!(
            store.get_stream("test", "drop"),
            Err(StoreError::StreamNotFound { .. })
        ));
    }

    #[test]
    fn emptied_container_stays_registered() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", None, "only", b"data").unwrap();
        store.del_stream("test", "only").unwrap();

        assert!(store.exists("test").unwrap());
        let listed = store.list_ids().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "te/st");
    }

    #[test]
    fn missing_container_and_stream_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(matches!(
            store.get_stream("absent", "s"),
            Err(StoreError::ContainerNotFound { .. })
        ));
        assert!(matches!(
            store.del_stream("absent", "s"),
            Err(StoreError::ContainerNotFound { .. })
        ));

        store.put_stream("test", None, "s", b"x").unwrap();
        assert!(matches!(
            store.get_stream("test", "missing"),
            Err(StoreError::StreamNotFound { .. })
        ));
        assert!(matches!(
            store.del_stream("test", "missing"),
            Err(StoreError::StreamNotFound { .. })
        ));
    }

    #[test]
    fn del_directory_of_absent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(matches!(
            store.del_directory("notexist"),
            Err(StoreError::ContainerNotFound { .. })
        ));
    }

    #[test]
    fn del_directory_removes_every_covered_container() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", None, "s", b"1").unwrap(); // te/st
        store.put_stream("team", None, "s", b"2").unwrap(); // te/am
        store.put_stream("other", None, "s", b"3").unwrap(); // ot/he/r

        store.del_directory("te").unwrap();
        assert!(!store.exists("test").unwrap());
        assert!(!store.exists("team").unwrap());
        assert!(store.exists("other").unwrap());

        let listed = store.list_ids().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].path, "ot/he/r");
    }

    // -----------------------------------------------------------------------
    // Listing
    // -----------------------------------------------------------------------

    #[test]
    fn list_ids_is_exact_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        for id in ["alpha", "beta", "gamma"] {
            store.put_stream(id, None, "s", b"x").unwrap();
        }
        // A second put into an existing container must not duplicate it.
        store.put_stream("alpha", None, "t", b"y").unwrap();

        let listed = store.list_ids().unwrap();
        let paths: Vec<&str> = listed.iter().map(|entry| entry.path.as_str()).collect();
        assert_eq!(paths, vec!["al/ph/a", "be/ta", "ga/mm/a"]);
        for entry in &listed {
            assert!(entry.modified > 0);
        }
    }

    #[test]
    fn nested_shard_paths_both_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        // "te" shards to te, a prefix of test's te/st.
        store.put_stream("te", None, "s", b"short").unwrap();
        store.put_stream("test", None, "s", b"long").unwrap();

        let paths: Vec<String> = store
            .list_ids()
            .unwrap()
            .into_iter()
            .map(|entry| entry.path)
            .collect();
        assert_eq!(paths, vec!["te".to_string(), "te/st".to_string()]);
    }

    #[test]
    fn get_container_returns_all_streams() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", None, "b", b"bee").unwrap();
        store.put_stream("test", None, "a", b"ay").unwrap();

        let streams = store.get_container("test").unwrap();
        assert_eq!(
            streams,
            vec![
                ("a".to_string(), b"ay".to_vec()),
                ("b".to_string(), b"bee".to_vec()),
            ]
        );
        assert!(matches!(
            store.get_container("absent"),
            Err(StoreError::ContainerNotFound { .. })
        ));
    }

    #[test]
    fn get_container_includes_sub_path_streams() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", Some("sub"), "s", b"nested").unwrap();
        store.put_stream("test", None, "top", b"plain").unwrap();

        let streams = store.get_container("test").unwrap();
        assert_eq!(
            streams,
            vec![
                ("sub/s".to_string(), b"nested".to_vec()),
                ("top".to_string(), b"plain".to_vec()),
            ]
        );
    }

    #[test]
    fn get_container_ignores_nested_shard_levels() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        // "test" shards to te/st, extending the container for "te".
        store.put_stream("te", None, "s", b"short").unwrap();
        store.put_stream("test", None, "s", b"long").unwrap();

        let streams = store.get_container("te").unwrap();
        assert_eq!(streams, vec![("s".to_string(), b"short".to_vec())]);
    }

    #[test]
    fn exists_is_false_for_pure_shard_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        store.put_stream("test", None, "s", b"x").unwrap();
        // The te/ level exists on disk but was never put into.
        assert!(!store.exists("te").unwrap());
        assert!(store.exists("test").unwrap());
        assert!(matches!(
            store.get_container("te"),
            Err(StoreError::ContainerNotFound { .. })
        ));

        // A put makes the prefix a container of its own.
        store.put_stream("te", None, "s", b"y").unwrap();
        assert!(store.exists("te").unwrap());
    }

    #[test]
    fn empty_identifier_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(matches!(
            store.put_stream("", None, "s", b"x"),
            Err(StoreError::EmptyIdentifier)
        ));
        assert!(matches!(
            store.get_stream("", "s"),
            Err(StoreError::EmptyIdentifier)
        ));
        assert!(matches!(store.exists(""), Err(StoreError::EmptyIdentifier)));
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_names_are_rejected_before_io() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path());

        assert!(matches!(
            store.put_stream("test", None, "a/b", b"x"),
            Err(StoreError::InvalidStreamName { .. })
        ));
        assert!(matches!(
            store.put_stream("test", None, "time", b"x"),
            Err(StoreError::InvalidStreamName { .. })
        ));
        assert!(matches!(
            store.put_stream("test", Some("../up"), "s", b"x"),
            Err(StoreError::InvalidSubPath { .. })
        ));
        assert!(matches!(
            store.get_stream("test", "../escape"),
            Err(StoreError::InvalidStreamName { .. })
        ));
    }
}
