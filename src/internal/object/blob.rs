//! Blob objects: opaque byte content, no internal structure.

use std::fmt::Display;

use crate::{
    errors::GitError,
    hash::Hash,
    internal::object::{ObjectTrait, ObjectType},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub id: Hash,
    pub data: Vec<u8>,
}

impl Blob {
    pub fn new(data: Vec<u8>) -> Self {
        let id = Hash::from_type_and_data(ObjectType::Blob, &data);
        Blob { id, data }
    }
}

impl ObjectTrait for Blob {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError> {
        Ok(Blob {
            id: hash,
            data: data.to_vec(),
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Blob
    }

    fn get_size(&self) -> usize {
        self.data.len()
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(self.data.clone())
    }
}

impl Display for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob {} ({} bytes)", self.id, self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_blob_is_valid_and_round_trips() {
        let blob = Blob::new(Vec::new());
        assert_eq!(blob.get_size(), 0);
        let parsed = Blob::from_bytes(&blob.to_data().unwrap(), blob.id).unwrap();
        assert_eq!(parsed, blob);
    }

    #[test]
    fn hash_is_content_addressed() {
        let a = Blob::new(b"hello".to_vec());
        let b = Blob::new(b"hello".to_vec());
        assert_eq!(a.id, b.id);
    }
}
