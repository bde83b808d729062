//! Key-value backend: the directory tree is emulated with hashes and sets.
//!
//! Layout inside the substrate:
//!
//! ```text
//! hash  <root>             fields: pairtree_prefix, pairtree_root, pairtree_version0_1
//! set   <root>:keys        members: canonical container paths
//! hash  <canonical path>   fields: <streamName...>, time, size
//! ```
//!
//! `exists` is a set-membership test and `list_ids` a set enumeration; no
//! native directories are involved. The substrate itself ([`Kv`]) is a pair
//! of maps behind one `RwLock`, shared by cloning, so several stores can sit
//! on the same substrate the way several clients share one key-value server.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use pairtree_path::{encode, PathMapper};

use crate::error::{StoreError, StoreResult};
use crate::names::{
    normalize_sub_path, validate_identifier, validate_stream_key, validate_stream_name,
};
use crate::root::{
    StorageRoot, CONFORMANCE_STATEMENT, PREFIX_FIELD, REGISTRY_SUFFIX, ROOT_FIELD, SIZE_FIELD,
    TIME_FIELD, VERSION_FIELD,
};
use crate::traits::{ContainerEntry, ObjectStore};

#[derive(Default)]
struct KvData {
    hashes: HashMap<String, BTreeMap<String, Vec<u8>>>,
    sets: HashMap<String, BTreeSet<String>>,
}

impl KvData {
    fn hset(&mut self, key: &str, field: &str, value: Vec<u8>) {
        self.hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value);
    }

    fn hget(&self, key: &str, field: &str) -> Option<&Vec<u8>> {
        self.hashes.get(key).and_then(|hash| hash.get(field))
    }

    fn hdel(&mut self, key: &str, field: &str) -> bool {
        self.hashes
            .get_mut(key)
            .map(|hash| hash.remove(field).is_some())
            .unwrap_or(false)
    }

    fn hexists(&self, key: &str, field: &str) -> bool {
        self.hget(key, field).is_some()
    }

    fn sadd(&mut self, key: &str, member: &str) {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
    }

    fn srem(&mut self, key: &str, member: &str) -> bool {
        self.sets
            .get_mut(key)
            .map(|set| set.remove(member))
            .unwrap_or(false)
    }

    fn sismember(&self, key: &str, member: &str) -> bool {
        self.sets
            .get(key)
            .map(|set| set.contains(member))
            .unwrap_or(false)
    }

    fn del(&mut self, key: &str) -> bool {
        self.hashes.remove(key).is_some() | self.sets.remove(key).is_some()
    }
}

/// Shared hash/set substrate standing in for an external key-value server.
///
/// Cloning is cheap and clones share state, so two stores opened on clones
/// of one `Kv` see the same data.
#[derive(Clone, Default)]
pub struct Kv {
    inner: Arc<RwLock<KvData>>,
}

impl Kv {
    /// A fresh, empty substrate.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for Kv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.inner.read().expect("lock poisoned");
        f.debug_struct("Kv")
            .field("hashes", &data.hashes.len())
            .field("sets", &data.sets.len())
            .finish()
    }
}

/// Pairtree store emulated inside a key-value substrate.
pub struct MemoryStore {
    kv: Kv,
    root: String,
    registry: String,
    mapper: PathMapper,
    storage_root: StorageRoot,
}

impl MemoryStore {
    /// Open the Pairtree root named `root` on the given substrate.
    ///
    /// Idempotent: when the root hash already carries a `pairtree_prefix`
    /// field the stored prefix is loaded and `uri_prefix` is ignored;
    /// otherwise the root metadata fields are written.
    pub fn open(kv: Kv, root: &str, uri_prefix: &str, mapper: PathMapper) -> Self {
        let storage_root = {
            let mut data = kv.inner.write().expect("lock poisoned");
            if data.hexists(root, PREFIX_FIELD) {
                let uri_prefix = data
                    .hget(root, PREFIX_FIELD)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_default();
                let version = data
                    .hget(root, VERSION_FIELD)
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                    .unwrap_or_else(|| CONFORMANCE_STATEMENT.to_string());
                debug!(root, "opened existing pairtree root, keeping stored prefix");
                StorageRoot {
                    uri_prefix,
                    version,
                }
            } else {
                data.hset(root, PREFIX_FIELD, uri_prefix.as_bytes().to_vec());
                data.hset(root, ROOT_FIELD, Vec::new());
                data.hset(
                    root,
                    VERSION_FIELD,
                    CONFORMANCE_STATEMENT.as_bytes().to_vec(),
                );
                debug!(root, uri_prefix, "initialized pairtree root");
                StorageRoot::new(uri_prefix)
            }
        };

        Self {
            kv,
            root: root.to_string(),
            registry: format!("{root}{REGISTRY_SUFFIX}"),
            mapper,
            storage_root,
        }
    }

    /// Open on a fresh private substrate.
    pub fn new(root: &str, uri_prefix: &str, mapper: PathMapper) -> Self {
        Self::open(Kv::new(), root, uri_prefix, mapper)
    }

    /// The shard mapper this store was opened with.
    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Canonical path of the container for `id`.
    fn canonical_path(&self, id: &str) -> String {
        self.mapper.to_path(&encode(id))
    }
}

impl ObjectStore for MemoryStore {
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

        let canonical = self.canonical_path(id);
        let (ret_path, field) = match &sub {
            Some(sub) => (
                format!("{canonical}/{sub}"),
                format!("{sub}/{stream_name}"),
            ),
            None => (canonical.clone(), stream_name.to_string()),
        };

        let now = unix_now();
        {
            let mut kv = self.kv.inner.write().expect("lock poisoned");
            kv.sadd(&self.registry, &canonical);
            kv.hset(&canonical, &field, data.to_vec());
            kv.hset(&canonical, TIME_FIELD, now.to_string().into_bytes());
            kv.hset(&canonical, SIZE_FIELD, data.len().to_string().into_bytes());
        }

        debug!(path = %ret_path, stream = stream_name, bytes = data.len(), "put stream");
        Ok(ret_path)
    }

    fn get_stream(&self, id: &str, stream_name: &str) -> StoreResult<Vec<u8>> {
        validate_identifier(id)?;
        validate_stream_key(stream_name)?;
        let canonical = self.canonical_path(id);
        let kv = self.kv.inner.read().expect("lock poisoned");
        if !kv.sismember(&self.registry, &canonical) {
            return Err(StoreError::ContainerNotFound { path: canonical });
        }
        kv.hget(&canonical, stream_name)
            .cloned()
            .ok_or(StoreError::StreamNotFound {
                path: canonical,
                stream: stream_name.to_string(),
            })
    }

    fn del_stream(&self, id: &str, stream_name: &str) -> StoreResult<()> {
        validate_identifier(id)?;
        validate_stream_key(stream_name)?;
        let canonical = self.canonical_path(id);
        let mut kv = self.kv.inner.write().expect("lock poisoned");
        if !kv.sismember(&self.registry, &canonical) {
            return Err(StoreError::ContainerNotFound { path: canonical });
        }
        if !kv.hdel(&canonical, stream_name) {
            return Err(StoreError::StreamNotFound {
                path: canonical,
                stream: stream_name.to_string(),
            });
        }
        debug!(path = %canonical, stream = stream_name, "deleted stream");
        Ok(())
    }

    fn get_container(&self, id: &str) -> StoreResult<Vec<(String, Vec<u8>)>> {
        validate_identifier(id)?;
        let canonical = self.canonical_path(id);
        let kv = self.kv.inner.read().expect("lock poisoned");
        if !kv.sismember(&self.registry, &canonical) {
            return Err(StoreError::ContainerNotFound { path: canonical });
        }
        let streams = kv
            .hashes
            .get(&canonical)
            .map(|hash| {
                hash.iter()
                    .filter(|(field, _)| field.as_str() != TIME_FIELD && field.as_str() != SIZE_FIELD)
                    .map(|(field, value)| (field.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default();
        Ok(streams)
    }

    fn exists(&self, id: &str) -> StoreResult<bool> {
        validate_identifier(id)?;
        let canonical = self.canonical_path(id);
        let kv = self.kv.inner.read().expect("lock poisoned");
        Ok(kv.sismember(&self.registry, &canonical))
    }

    fn list_ids(&self) -> StoreResult<Vec<ContainerEntry>> {
        let kv = self.kv.inner.read().expect("lock poisoned");
        let members = match kv.sets.get(&self.registry) {
            Some(set) => set,
            None => return Ok(Vec::new()),
        };
        // BTreeSet iteration is already sorted and duplicate-free.
        Ok(members
            .iter()
            .map(|path| ContainerEntry {
                path: path.clone(),
                modified: kv
                    .hget(path, TIME_FIELD)
                    .and_then(|bytes| std::str::from_utf8(bytes).ok())
                    .and_then(|text| text.parse().ok())
                    .unwrap_or_default(),
            })
            .collect())
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

        let mut kv = self.kv.inner.write().expect("lock poisoned");
        let child_prefix = format!("{dir_owned}/");
        let covered: Vec<String> = kv
            .sets
            .get(&self.registry)
            .map(|set| {
                set.iter()
                    .filter(|member| *member == &dir_owned || member.starts_with(&child_prefix))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        if covered.is_empty() {
            return Err(StoreError::ContainerNotFound { path: dir_owned });
        }

        let mut failures = Vec::new();
        for path in &covered {
            kv.del(path);
            if !kv.srem(&self.registry, path) {
                failures.push(format!("{path}: registry entry already gone"));
            }
        }

        if failures.is_empty() {
            debug!(dir = %dir_owned, removed = covered.len(), "deleted directory");
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

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("root", &self.root)
            .field("shard_width", &self.mapper.shard_width())
            .finish()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
