//! Lightweight representation of a decoded Git object coming out of a pack
//! stream, with conversions to/from the strongly typed object model.

use std::hash::{Hash as StdHash, Hasher};

use crate::{
    errors::GitError,
    hash::Hash,
    internal::object::{
        ObjectTrait, ObjectType, blob::Blob, commit::Commit, tag::Tag, tree::Tree,
    },
};

/// A single object's payload as read out of (or destined for) a packfile:
/// its type, fully inflated body, id, and how many delta hops separated it
/// from its base (0 for an object stored whole).
#[derive(Eq, Clone, Debug)]
pub struct Entry {
    pub obj_type: ObjectType,
    pub data: Vec<u8>,
    pub hash: Hash,
    pub chain_len: usize,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.obj_type == other.obj_type && self.hash == other.hash
    }
}

impl StdHash for Entry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.obj_type.hash(state);
        self.hash.hash(state);
    }
}

impl Entry {
    /// Parses the entry's body into the strongly typed object it represents.
    pub fn to_object(&self) -> Result<Box<dyn ObjectTrait>, GitError> {
        Ok(match self.obj_type {
            ObjectType::Blob => Box::new(Blob::from_bytes(&self.data, self.hash)?),
            ObjectType::Tree => Box::new(Tree::from_bytes(&self.data, self.hash)?),
            ObjectType::Commit => Box::new(Commit::from_bytes(&self.data, self.hash)?),
            ObjectType::Tag => Box::new(Tag::from_bytes(&self.data, self.hash)?),
        })
    }
}

impl From<Blob> for Entry {
    fn from(value: Blob) -> Self {
        Self {
            obj_type: ObjectType::Blob,
            data: value.data,
            hash: value.id,
            chain_len: 0,
        }
    }
}

impl TryFrom<Commit> for Entry {
    type Error = GitError;

    fn try_from(value: Commit) -> Result<Self, GitError> {
        Ok(Self {
            obj_type: ObjectType::Commit,
            data: value.to_data()?,
            hash: value.id,
            chain_len: 0,
        })
    }
}

impl TryFrom<Tree> for Entry {
    type Error = GitError;

    fn try_from(value: Tree) -> Result<Self, GitError> {
        Ok(Self {
            obj_type: ObjectType::Tree,
            data: value.to_data()?,
            hash: value.id,
            chain_len: 0,
        })
    }
}

impl TryFrom<Tag> for Entry {
    type Error = GitError;

    fn try_from(value: Tag) -> Result<Self, GitError> {
        Ok(Self {
            obj_type: ObjectType::Tag,
            data: value.to_data()?,
            hash: value.id,
            chain_len: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trips_through_entry() {
        let blob = Blob::new(b"hello".to_vec());
        let entry: Entry = blob.clone().into();
        let back = entry.to_object().unwrap();
        assert_eq!(back.get_type(), ObjectType::Blob);
        assert_eq!(back.to_data().unwrap(), blob.data);
    }
}
