//! Object model: typed Commit/Tree/Blob/Tag representations, the trait that
//! lets the pack/zlib layers build them from inflated bytes, and the ref-name
//! validator.

pub mod blob;
pub mod commit;
pub mod refname;
pub mod signature;
pub mod tag;
pub mod tree;
pub mod types;

use std::{
    fmt::Display,
    io::{BufRead, Read},
};

pub use types::ObjectType;

use crate::{errors::GitError, hash::Hash, internal::zlib::stream::inflate::ReadBoxed};

/// Common interface for Commit/Tree/Blob/Tag: construct from inflated bytes,
/// serialise back, and compute the object's content-addressed hash.
pub trait ObjectTrait: Send + Sync + Display {
    /// Parses an already-inflated object body (the bytes after the
    /// `<type> <len>\0` header) given the hash it was addressed by.
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError>
    where
        Self: Sized;

    /// Reads a plain (non-delta) object straight off a packfile's inflater.
    fn from_buf_read<R: BufRead>(read: &mut ReadBoxed<R>, size: usize) -> Result<Self, GitError>
    where
        Self: Sized,
    {
        let mut content = Vec::with_capacity(size);
        read.read_to_end(&mut content)?;
        let hash = read.hash.clone().finalize();
        Self::from_bytes(&content, hash)
    }

    fn get_type(&self) -> ObjectType;

    fn get_size(&self) -> usize;

    fn to_data(&self) -> Result<Vec<u8>, GitError>;

    /// Computes the object hash from serialised data. Override only for
    /// custom hash caching; the default always re-derives from `to_data`.
    fn object_hash(&self) -> Result<Hash, GitError> {
        let data = self.to_data()?;
        Ok(Hash::from_type_and_data(self.get_type(), &data))
    }
}
