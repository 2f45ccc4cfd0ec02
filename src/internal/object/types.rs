//! Object type enumeration and its packfile 3-bit type-code mapping.
//!
//! Git assigns each object type a small integer used both as the pack
//! header's type tag and (offset by convention) as a byte in diagnostics.
//! Only the four base types are ever handed back to callers; OFS_DELTA and
//! REF_DELTA are resolved away inside the packfile reader (see
//! `internal::pack::reader`) and never appear as an `ObjectType`.

use std::fmt::{self, Display};

use crate::errors::GitError;

#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Commit => "commit",
            ObjectType::Tree => "tree",
            ObjectType::Blob => "blob",
            ObjectType::Tag => "tag",
        }
    }

    pub fn from_str(s: &str) -> Result<ObjectType, GitError> {
        match s {
            "commit" => Ok(ObjectType::Commit),
            "tree" => Ok(ObjectType::Tree),
            "blob" => Ok(ObjectType::Blob),
            "tag" => Ok(ObjectType::Tag),
            other => Err(GitError::InvalidObjectType(other.to_string())),
        }
    }

    /// The 3-bit type tag used in a packfile object header.
    pub const fn to_pack_type_u8(self) -> u8 {
        match self {
            ObjectType::Commit => 1,
            ObjectType::Tree => 2,
            ObjectType::Blob => 3,
            ObjectType::Tag => 4,
        }
    }

    pub fn from_pack_type_u8(v: u8) -> Result<ObjectType, GitError> {
        match v {
            1 => Ok(ObjectType::Commit),
            2 => Ok(ObjectType::Tree),
            3 => Ok(ObjectType::Blob),
            4 => Ok(ObjectType::Tag),
            other => Err(GitError::InvalidPackHeader(format!(
                "pack type code {other} is not a base object type"
            ))),
        }
    }
}

impl Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_type_round_trips() {
        for t in [
            ObjectType::Commit,
            ObjectType::Tree,
            ObjectType::Blob,
            ObjectType::Tag,
        ] {
            assert_eq!(ObjectType::from_pack_type_u8(t.to_pack_type_u8()).unwrap(), t);
        }
    }

    #[test]
    fn rejects_reserved_type_codes() {
        assert!(ObjectType::from_pack_type_u8(0).is_err());
        assert!(ObjectType::from_pack_type_u8(5).is_err());
    }
}
