//! Tag objects. Parsed minimally on read; never produced by this library's
//! writer (spec explicitly excludes commit signing / tag creation).

use std::fmt::Display;

use bstr::ByteSlice;

use crate::{
    errors::GitError,
    hash::Hash,
    internal::object::{ObjectTrait, ObjectType, signature::Signature},
};

#[derive(Debug, Clone)]
pub struct Tag {
    pub id: Hash,
    pub object: Hash,
    pub object_type: ObjectType,
    pub tag_name: String,
    pub tagger: Option<Signature>,
    pub message: String,
}

impl ObjectTrait for Tag {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError> {
        let text = data.as_bstr();

        let object_line = text
            .lines()
            .find(|l| l.starts_with(b"object "))
            .ok_or_else(|| GitError::InvalidTagObject("missing `object` header".into()))?;
        let object = Hash::from_bytes(
            &hex::decode(object_line[b"object ".len()..].to_str_lossy().trim())
                .map_err(|e| GitError::InvalidTagObject(e.to_string()))?,
        )
        .map_err(GitError::InvalidHashValue)?;

        let type_line = text
            .lines()
            .find(|l| l.starts_with(b"type "))
            .ok_or_else(|| GitError::InvalidTagObject("missing `type` header".into()))?;
        let object_type =
            ObjectType::from_str(type_line[b"type ".len()..].to_str_lossy().trim())?;

        let tag_line = text
            .lines()
            .find(|l| l.starts_with(b"tag "))
            .ok_or_else(|| GitError::InvalidTagObject("missing `tag` header".into()))?;
        let tag_name = tag_line[b"tag ".len()..].to_str_lossy().trim().to_string();

        let tagger = text
            .lines()
            .find(|l| l.starts_with(b"tagger "))
            .map(|l| Signature::from_data(&l[b"tagger ".len()..]))
            .transpose()?;

        let message = match text.find(b"\n\n") {
            Some(idx) => text[idx + 2..].to_str_lossy().to_string(),
            None => String::new(),
        };

        Ok(Tag {
            id: hash,
            object,
            object_type,
            tag_name,
            tagger,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tag
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut out = Vec::new();
        out.extend(format!("object {}\n", self.object).into_bytes());
        out.extend(format!("type {}\n", self.object_type).into_bytes());
        out.extend(format!("tag {}\n", self.tag_name).into_bytes());
        if let Some(tagger) = &self.tagger {
            out.extend(b"tagger ");
            out.extend(tagger.to_data()?);
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend(self.message.as_bytes());
        Ok(out)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tag {} -> {}", self.tag_name, self.object)
    }
}
