//! Identifier encoding and shard path mapping for Pairtree storage.
//!
//! A Pairtree maps arbitrary opaque identifiers to balanced, filesystem-safe
//! directory trees. This crate implements the two purely computational halves
//! of that mapping:
//!
//! - [`encode`] / [`decode`] — a reversible transform between logical
//!   identifiers and path-safe encoded identifiers. Any Unicode string can be
//!   encoded; decoding recovers it exactly.
//! - [`PathMapper`] — splits an encoded identifier into fixed-width directory
//!   segments ("shorties") and joins them back.
//!
//! Nothing here touches the filesystem. Storage backends live in
//! `pairtree-store`.

pub mod codec;
pub mod error;
pub mod mapper;

// Re-export primary items at crate root for ergonomic imports.
pub use codec::{decode, encode, is_encoded_char};
pub use error::{PathError, Result};
pub use mapper::PathMapper;
