//! Tree objects: ordered `{mode, name, hash}` entries.
//!
//! Entry ordering is load-bearing — Git's canonical sort compares names as if
//! a tree-typed entry's name carried a trailing `/`, so `"a"` (a file) sorts
//! before `"a/"` (the subtree `"a"`) but after `"a-b"`. Emitting entries out
//! of this order silently produces a tree whose hash servers will reject.

use std::{cmp::Ordering, fmt::Display};

use crate::{
    errors::GitError,
    hash::Hash,
    internal::object::{ObjectTrait, ObjectType},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEntryMode {
    Regular,
    Executable,
    Symlink,
    Subtree,
}

impl TreeEntryMode {
    pub fn as_octal_str(&self) -> &'static str {
        match self {
            TreeEntryMode::Regular => "100644",
            TreeEntryMode::Executable => "100755",
            TreeEntryMode::Symlink => "120000",
            TreeEntryMode::Subtree => "040000",
        }
    }

    pub fn from_octal_str(s: &str) -> Result<Self, GitError> {
        match s {
            "100644" => Ok(TreeEntryMode::Regular),
            "100755" => Ok(TreeEntryMode::Executable),
            "120000" => Ok(TreeEntryMode::Symlink),
            "40000" | "040000" => Ok(TreeEntryMode::Subtree),
            other => Err(GitError::InvalidTreeItem(format!(
                "unrecognised tree entry mode `{other}`"
            ))),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, TreeEntryMode::Subtree)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: TreeEntryMode,
    pub name: String,
    pub hash: Hash,
}

/// Git's tree-entry comparison key: the name, with a trailing `/` appended
/// when the entry is itself a subtree.
fn sort_key(name: &str, mode: TreeEntryMode) -> String {
    if mode.is_tree() {
        format!("{name}/")
    } else {
        name.to_string()
    }
}

pub fn compare_tree_entries(a: (&str, TreeEntryMode), b: (&str, TreeEntryMode)) -> Ordering {
    sort_key(a.0, a.1).cmp(&sort_key(b.0, b.1))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tree {
    pub id: Hash,
    pub entries: Vec<TreeEntry>,
}

impl Tree {
    /// Builds a tree from entries in any order, sorting them canonically and
    /// computing the resulting hash.
    pub fn from_entries(mut entries: Vec<TreeEntry>) -> Self {
        entries.sort_by(|a, b| {
            compare_tree_entries((a.name.as_str(), a.mode), (b.name.as_str(), b.mode))
        });
        let data = Self::serialise(&entries);
        let id = Hash::from_type_and_data(ObjectType::Tree, &data);
        Tree { id, entries }
    }

    /// The well-known hash of a tree with no entries.
    pub fn empty() -> Self {
        Tree::from_entries(Vec::new())
    }

    fn serialise(entries: &[TreeEntry]) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in entries {
            out.extend(entry.mode.as_octal_str().as_bytes());
            out.push(b' ');
            out.extend(entry.name.as_bytes());
            out.push(0);
            out.extend(entry.hash.as_ref());
        }
        out
    }
}

impl ObjectTrait for Tree {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError> {
        let mut entries = Vec::new();
        let mut cursor = data;
        while !cursor.is_empty() {
            let space = cursor
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| GitError::InvalidTreeObject)?;
            let mode_str = std::str::from_utf8(&cursor[..space])
                .map_err(|e| GitError::ConversionError(e.to_string()))?;
            let mode = TreeEntryMode::from_octal_str(mode_str)?;

            let rest = &cursor[space + 1..];
            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| GitError::InvalidTreeObject)?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|e| GitError::ConversionError(e.to_string()))?
                .to_string();

            let after_name = &rest[nul + 1..];
            if after_name.len() < 20 {
                return Err(GitError::InvalidTreeItem(name));
            }
            let entry_hash = Hash::from_bytes(&after_name[..20]).map_err(GitError::InvalidHashValue)?;

            entries.push(TreeEntry {
                mode,
                name,
                hash: entry_hash,
            });
            cursor = &after_name[20..];
        }

        Ok(Tree { id: hash, entries })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Tree
    }

    fn get_size(&self) -> usize {
        Self::serialise(&self.entries).len()
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        Ok(Self::serialise(&self.entries))
    }
}

impl Display for Tree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tree {} ({} entries)", self.id, self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, mode: TreeEntryMode) -> TreeEntry {
        TreeEntry {
            mode,
            name: name.to_string(),
            hash: Hash::of(name.as_bytes()),
        }
    }

    #[test]
    fn subtree_sorts_as_if_suffixed_with_slash() {
        // "a-b" < "a" (as subtree, i.e. "a/") < "ab"
        let tree = Tree::from_entries(vec![
            entry("ab", TreeEntryMode::Regular),
            entry("a", TreeEntryMode::Subtree),
            entry("a-b", TreeEntryMode::Regular),
        ]);
        let names: Vec<_> = tree.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a-b", "a", "ab"]);
    }

    #[test]
    fn empty_tree_round_trips_and_is_idempotent() {
        let empty = Tree::empty();
        assert!(empty.entries.is_empty());
        let reparsed = Tree::from_bytes(&empty.to_data().unwrap(), empty.id).unwrap();
        assert_eq!(reparsed.to_data().unwrap(), empty.to_data().unwrap());
    }

    #[test]
    fn hash_is_stable_regardless_of_insertion_order() {
        let t1 = Tree::from_entries(vec![
            entry("b", TreeEntryMode::Regular),
            entry("a", TreeEntryMode::Regular),
        ]);
        let t2 = Tree::from_entries(vec![
            entry("a", TreeEntryMode::Regular),
            entry("b", TreeEntryMode::Regular),
        ]);
        assert_eq!(t1.id, t2.id);
    }
}
