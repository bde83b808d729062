//! Stream name and sub-path validation.
//!
//! Stream names become filenames (or hash fields), so they must be single,
//! non-traversing path components and must not collide with the reserved
//! `time`/`size` metadata fields. Sub-paths nest inside a container and must
//! not escape it.

use crate::error::{StoreError, StoreResult};
use crate::root::{SIZE_FIELD, TIME_FIELD};

fn invalid_name(name: &str, reason: &str) -> StoreError {
    StoreError::InvalidStreamName {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

fn invalid_sub_path(path: &str, reason: &str) -> StoreError {
    StoreError::InvalidSubPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

/// Validate a logical identifier. The empty string maps to the shard root
/// itself rather than to any container, so the stores reject it.
pub(crate) fn validate_identifier(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::EmptyIdentifier);
    }
    Ok(())
}

/// Validate a stream name supplied to `put_stream`: one plain component.
pub(crate) fn validate_stream_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(invalid_name(name, "stream name must not be empty"));
    }
    if name.contains('/') {
        return Err(invalid_name(
            name,
            "stream name must be a single path component",
        ));
    }
    if name == "." || name == ".." {
        return Err(invalid_name(name, "stream name must not be '.' or '..'"));
    }
    if name == TIME_FIELD || name == SIZE_FIELD {
        return Err(invalid_name(name, "name is a reserved metadata field"));
    }
    Ok(())
}

/// Validate a stream key supplied to `get_stream`/`del_stream`.
///
/// A key may be path-qualified (`"<sub_path>/<name>"`) to address a stream
/// written under a sub-path, but every component must stay inside the
/// container.
pub(crate) fn validate_stream_key(key: &str) -> StoreResult<()> {
    if key.is_empty() {
        return Err(invalid_name(key, "stream key must not be empty"));
    }
    if key == TIME_FIELD || key == SIZE_FIELD {
        return Err(invalid_name(key, "name is a reserved metadata field"));
    }
    for component in key.split('/') {
        if component.is_empty() {
            return Err(invalid_name(key, "stream key components must not be empty"));
        }
        if component == "." || component == ".." {
            return Err(invalid_name(key, "stream key must not traverse upward"));
        }
    }
    Ok(())
}

/// Validate an optional sub-path; empty means "directly in the container".
pub(crate) fn normalize_sub_path(sub_path: Option<&str>) -> StoreResult<Option<String>> {
    let sub = match sub_path {
        None | Some("") => return Ok(None),
        Some(sub) => sub,
    };
    for component in sub.split('/') {
        if component.is_empty() {
            return Err(invalid_sub_path(sub, "components must not be empty"));
        }
        if component == "." || component == ".." {
            return Err(invalid_sub_path(sub, "must not traverse upward"));
        }
    }
    Ok(Some(sub.to_string()))
}
