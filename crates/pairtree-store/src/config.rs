//! Store configuration and backend selection.

use serde::{Deserialize, Serialize};

use pairtree_path::PathMapper;

use crate::error::StoreResult;
use crate::fs::FilesystemStore;
use crate::kv::{Kv, MemoryStore};
use crate::traits::ObjectStore;

/// Which backend a store is opened against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Real nested directories and files.
    Filesystem,
    /// Hash/set emulation on an in-memory substrate.
    Memory,
}

/// Configuration for opening a Pairtree store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory (filesystem) or root key name (key-value).
    pub root: String,
    /// URI prefix written at initialization. Ignored when the root already
    /// exists; the stored prefix wins.
    pub uri_prefix: String,
    /// Characters per shard segment. Must be at least 1.
    pub shard_width: usize,
    /// Backend to open.
    pub backend: BackendKind,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "data".to_string(),
            uri_prefix: "http://".to_string(),
            shard_width: PathMapper::DEFAULT_SHARD_WIDTH,
            backend: BackendKind::Filesystem,
        }
    }
}

/// Open the backend named by `config`.
///
/// Validates the shard width, builds the mapper, and performs the idempotent
/// root initialization of the chosen backend.
pub fn open_store(config: &StoreConfig) -> StoreResult<Box<dyn ObjectStore>> {
    let mapper = PathMapper::new(config.shard_width)?;
    match config.backend {
        BackendKind::Filesystem => Ok(Box::new(FilesystemStore::open(
            &config.root,
            &config.uri_prefix,
            mapper,
        )?)),
        BackendKind::Memory => Ok(Box::new(MemoryStore::open(
            Kv::new(),
            &config.root,
            &config.uri_prefix,
            mapper,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StoreConfig::default();
        assert_eq!(config.root, "data");
        assert_eq!(config.uri_prefix, "http://");
        assert_eq!(config.shard_width, 2);
        assert_eq!(config.backend, BackendKind::Filesystem);
    }

    #[test]
    fn config_deserializes_from_json() {
        let config: StoreConfig = serde_json::from_str(
            r#"{"root": "archive", "uri_prefix": "ark:", "shard_width": 3, "backend": "memory"}"#,
        )
        .unwrap();
        assert_eq!(config.root, "archive");
        assert_eq!(config.shard_width, 3);
        assert_eq!(config.backend, BackendKind::Memory);
    }

    #[test]
    fn zero_shard_width_is_rejected() {
        let config = StoreConfig {
            shard_width: 0,
            backend: BackendKind::Memory,
            ..Default::default()
        };
        assert!(open_store(&config).is_err());
    }

    #[test]
    fn factory_opens_memory_backend_as_trait_object() {
        let config = StoreConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        };
        let store = open_store(&config).unwrap();
        store.put_stream("test", None, "teststream", b"test file").unwrap();
        assert_eq!(store.get_stream("test", "teststream").unwrap(), b"test file");
        assert_eq!(store.uri_prefix(), "http://");
    }

    #[test]
    fn backends_agree_on_the_same_operation_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let fs_store = open_store(&StoreConfig {
            root: dir.path().join("data").to_string_lossy().into_owned(),
            ..Default::default()
        })
        .unwrap();
        let mem_store = open_store(&StoreConfig {
            backend: BackendKind::Memory,
            ..Default::default()
        })
        .unwrap();

        for store in [&fs_store, &mem_store] {
            store.put_stream("test", Some("sub"), "s", b"nested").unwrap();
            store.put_stream("test", None, "top", b"plain").unwrap();
        }

        assert_eq!(
            fs_store.get_container("test").unwrap(),
            mem_store.get_container("test").unwrap()
        );
        // An intermediate shard level is not a container on either backend.
        assert!(!fs_store.exists("te").unwrap());
        assert!(!mem_store.exists("te").unwrap());
        assert_eq!(
            fs_store
                .list_ids()
                .unwrap()
                .into_iter()
                .map(|entry| entry.path)
                .collect::<Vec<_>>(),
            mem_store
                .list_ids()
                .unwrap()
                .into_iter()
                .map(|entry| entry.path)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn factory_opens_filesystem_backend() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            root: dir.path().join("data").to_string_lossy().into_owned(),
            ..Default::default()
        };
        let store = open_store(&config).unwrap();
        store.put_stream("test", None, "s", b"x").unwrap();
        assert!(store.exists("test").unwrap());
    }
}
