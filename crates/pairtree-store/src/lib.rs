//! Pairtree object storage.
//!
//! Byte-stream "streams" are stored in per-identifier "containers". A
//! container is addressed by the canonical shard path of its identifier
//! (see `pairtree-path`), and behaves the same whether it lives on a real
//! filesystem or is emulated inside a hash/set key-value substrate.
//!
//! # Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`FilesystemStore`] — containers are real nested directories, streams
//!   are files written via temp-file + atomic rename.
//! - [`MemoryStore`] — containers are hash maps, the directory tree is a
//!   registry set, after the key-value layout (`<root>:keys` set plus one
//!   hash per canonical path).
//!
//! # Design Rules
//!
//! 1. Root metadata is written once, lazily, on first use of a root name;
//!    re-opening keeps the stored URI prefix and ignores the caller's.
//! 2. A container is created implicitly by the first `put_stream` into it
//!    and stays registered even when every stream is deleted; only
//!    `del_directory` removes it.
//! 3. No partially-written stream is ever observable: filesystem writes go
//!    through an atomic rename, key-value writes through a locked field set.
//! 4. All I/O errors are propagated, never silently ignored; partial
//!    failures during directory deletion are aggregated, not swallowed.

pub mod config;
pub mod error;
pub mod fs;
pub mod kv;
mod names;
pub mod root;
pub mod traits;

// Re-export primary types at crate root for ergonomic imports.
pub use config::{open_store, BackendKind, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use fs::FilesystemStore;
pub use kv::{Kv, MemoryStore};
pub use root::StorageRoot;
pub use traits::{ContainerEntry, ObjectStore};
