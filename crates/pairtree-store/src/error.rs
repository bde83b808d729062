use pairtree_path::PathError;

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No container is registered at the given canonical path.
    #[error("container not found: {path}")]
    ContainerNotFound { path: String },

    /// The container exists but holds no stream of the given name.
    #[error("stream {stream:?} not found in container {path}")]
    StreamNotFound { path: String, stream: String },

    /// The logical identifier is empty; it would address the shard root
    /// itself rather than a container.
    #[error("identifier must not be empty")]
    EmptyIdentifier,

    /// The stream name is empty, path-qualified where it must not be, or
    /// collides with a reserved metadata field.
    #[error("invalid stream name {name:?}: {reason}")]
    InvalidStreamName { name: String, reason: String },

    /// The sub-path would escape or alias the container directory.
    #[error("invalid sub-path {path:?}: {reason}")]
    InvalidSubPath { path: String, reason: String },

    /// One or more entries under a directory could not be removed. The
    /// directory deletion keeps going past individual failures and reports
    /// them all here.
    #[error("delete incomplete for {dir}: {} entries could not be removed", failures.len())]
    DeleteIncomplete { dir: String, failures: Vec<String> },

    /// Identifier encoding or decoding failed.
    #[error(transparent)]
    Encoding(#[from] PathError),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
