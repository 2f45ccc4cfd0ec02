//! The Commit object represents a specific version of a project's files at
//! a particular point in time.
//!
//! Each commit contains a tree id (the complete state of the repository at
//! that point), zero or more parent commit ids (building the history DAG),
//! an author and committer signature, and a free-form message.
use std::fmt::Display;
use std::str::FromStr;

use bstr::ByteSlice;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::object::ObjectTrait;
use crate::internal::object::ObjectType;
use crate::internal::object::signature::Signature;

/// - The tree id points to the top-level tree for this commit, reflecting
///   the complete state of the repository at the time of the commit.
/// - The parent commit ids let Git build the full commit history as a DAG.
/// - Author and committer carry name, email, timestamp and timezone.
#[derive(Eq, Debug, Clone)]
pub struct Commit {
    pub id: Hash,
    pub tree_id: Hash,
    pub parent_commit_ids: Vec<Hash>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl PartialEq for Commit {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "tree: {}", self.tree_id)?;
        for parent in self.parent_commit_ids.iter() {
            writeln!(f, "parent: {parent}")?;
        }
        writeln!(f, "author {}", self.author)?;
        writeln!(f, "committer {}", self.committer)?;
        writeln!(f, "{}", self.message)
    }
}

impl Commit {
    pub fn new(
        author: Signature,
        committer: Signature,
        tree_id: Hash,
        parent_commit_ids: Vec<Hash>,
        message: &str,
    ) -> Result<Commit, GitError> {
        let mut commit = Commit {
            id: Hash::default(),
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message: message.to_string(),
        };
        let hash = Hash::from_type_and_data(ObjectType::Commit, &commit.to_data()?);
        commit.id = hash;
        Ok(commit)
    }

    /// Builds a commit on top of `tree_id`/`parent_commit_ids` using a fixed
    /// identity and the current time, for callers that don't carry their own
    /// author/committer signatures (e.g. generated merge or stage commits).
    pub fn from_tree_id(
        tree_id: Hash,
        parent_commit_ids: Vec<Hash>,
        message: &str,
    ) -> Result<Commit, GitError> {
        let now = chrono::Utc::now().timestamp();
        let author = Signature::new("git-smart-core".into(), "git-smart-core@localhost".into(), now, "+0000".into());
        let committer = author.clone();
        Commit::new(author, committer, tree_id, parent_commit_ids, message)
    }

    /// Extracts the commit's subject line: the first non-empty line, skipping
    /// past a PGP signature block if the message carries one.
    pub fn format_message(&self) -> String {
        let mut lines = self.message.lines();

        if let Some(pos) = self
            .message
            .lines()
            .position(|line| line.contains("-----END PGP SIGNATURE-----"))
        {
            return self
                .message
                .lines()
                .skip(pos + 1)
                .find(|line| !line.trim().is_empty())
                .map(|line| line.to_owned())
                .unwrap_or_else(|| self.message.clone());
        }

        lines
            .find(|line| !line.trim().is_empty())
            .map(|line| line.to_owned())
            .unwrap_or_else(|| self.message.clone())
    }
}

impl ObjectTrait for Commit {
    fn from_bytes(data: &[u8], hash: Hash) -> Result<Self, GitError> {
        let mut commit = data;

        let tree_end = commit
            .find_byte(0x0a)
            .ok_or_else(|| GitError::InvalidCommit("missing `tree` line".to_string()))?;
        if !commit.starts_with(b"tree ") {
            return Err(GitError::InvalidCommit(
                "first line is not a `tree` header".to_string(),
            ));
        }
        let tree_id = Hash::from_str(
            commit[5..tree_end]
                .to_str()
                .map_err(|e| GitError::ConversionError(e.to_string()))?,
        )
        .map_err(GitError::InvalidHashValue)?;
        let binding = commit[tree_end + 1..].to_vec();
        commit = &binding;

        let author_begin = commit
            .find("author")
            .ok_or_else(|| GitError::InvalidCommit("missing `author` line".to_string()))?;
        let parent_commit_ids: Result<Vec<Hash>, GitError> = commit[..author_begin]
            .find_iter("parent")
            .map(|parent| {
                let parent_end = commit[parent..]
                    .find_byte(0x0a)
                    .ok_or_else(|| GitError::InvalidCommit("truncated parent line".to_string()))?;
                Hash::from_str(
                    commit[parent + 7..parent + parent_end]
                        .to_str()
                        .map_err(|e| GitError::ConversionError(e.to_string()))?,
                )
                .map_err(GitError::InvalidHashValue)
            })
            .collect();
        let parent_commit_ids = parent_commit_ids?;
        let binding = commit[author_begin..].to_vec();
        commit = &binding;

        let author_end = commit
            .find_byte(0x0a)
            .ok_or_else(|| GitError::InvalidCommit("missing `author` line".to_string()))?;
        let author = Signature::from_data(&commit[b"author ".len()..author_end])?;

        let binding = commit[author_end + 1..].to_vec();
        commit = &binding;
        let committer_end = commit
            .find_byte(0x0a)
            .ok_or_else(|| GitError::InvalidCommit("missing `committer` line".to_string()))?;
        let committer = Signature::from_data(&commit[b"committer ".len()..committer_end])?;

        // Everything after the newline that ends the committer line is the
        // message verbatim, including any embedded gpgsig block, which this
        // reader treats as opaque message text rather than a parsed header.
        let message = commit[committer_end + 1..]
            .to_str()
            .map_err(|e| GitError::ConversionError(e.to_string()))?
            .to_string();

        Ok(Commit {
            id: hash,
            tree_id,
            parent_commit_ids,
            author,
            committer,
            message,
        })
    }

    fn get_type(&self) -> ObjectType {
        ObjectType::Commit
    }

    fn get_size(&self) -> usize {
        self.to_data().map(|d| d.len()).unwrap_or(0)
    }

    fn to_data(&self) -> Result<Vec<u8>, GitError> {
        let mut data = Vec::new();

        data.extend(b"tree ");
        data.extend(self.tree_id.to_string().as_bytes());
        data.extend(&[0x0a]);

        for parent_tree_id in &self.parent_commit_ids {
            data.extend(b"parent ");
            data.extend(parent_tree_id.to_string().as_bytes());
            data.extend(&[0x0a]);
        }

        data.extend(b"author ");
        data.extend(self.author.to_data()?);
        data.extend(&[0x0a]);
        data.extend(b"committer ");
        data.extend(self.committer.to_data()?);
        data.extend(&[0x0a]);
        // Important: no extra 0x0a here. The message itself carries the
        // blank line separating headers from body; doubling it makes some
        // git servers reject the object during unpack.
        data.extend(self.message.as_bytes());

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_commit() -> Commit {
        let raw_commit = br#"tree 341e54913a3a43069f2927cc0f703e5a9f730df1
author benjamin.747 <benjamin.747@outlook.com> 1757467768 +0800
committer benjamin.747 <benjamin.747@outlook.com> 1757491219 +0800
gpgsig -----BEGIN PGP SIGNATURE-----

 iQJNBAABCAA3FiEEs4MaYUV7JcjxsVMPyqxGczTZ6K4FAmjBMC4ZHGJlbmphbWlu
 =UeLf
 -----END PGP SIGNATURE-----

test parse commit from bytes
"#;
        let hash = Hash::from_str("57d7685c60213a9da465cf900f31933be3a7ee39").unwrap();
        Commit::from_bytes(raw_commit, hash).unwrap()
    }

    #[test]
    fn parses_tree_author_committer_and_message_with_gpgsig() {
        let commit = basic_commit();
        assert_eq!(
            commit.tree_id,
            Hash::from_str("341e54913a3a43069f2927cc0f703e5a9f730df1").unwrap()
        );
        assert_eq!(commit.author.name, "benjamin.747");
        assert_eq!(commit.author.email, "benjamin.747@outlook.com");
        assert_eq!(commit.committer.name, "benjamin.747");
        assert!(commit.message.contains("-----BEGIN PGP SIGNATURE-----"));
        assert!(commit.message.contains("-----END PGP SIGNATURE-----"));
        assert!(commit.message.contains("test parse commit from bytes"));
        assert!(commit.parent_commit_ids.is_empty());
    }

    #[test]
    fn format_message_skips_pgp_signature_block() {
        let commit = basic_commit();
        assert_eq!(commit.format_message(), "test parse commit from bytes");
    }

    #[test]
    fn round_trips_through_to_data() {
        let commit = basic_commit();
        let reparsed = Commit::from_bytes(&commit.to_data().unwrap(), commit.id).unwrap();
        assert_eq!(reparsed.to_data().unwrap(), commit.to_data().unwrap());
    }

    #[test]
    fn parses_multiple_parents() {
        let raw = b"tree 341e54913a3a43069f2927cc0f703e5a9f730df1\nparent 8ab686eafeb1f44702738c8b0f24f2567c36da6d\nparent 943a702d06f34599aee1f8da8ef9f7296031d699\nauthor a <a@example.com> 1 +0000\ncommitter a <a@example.com> 1 +0000\n\nmerge\n";
        let commit = Commit::from_bytes(raw, Hash::zero()).unwrap();
        assert_eq!(commit.parent_commit_ids.len(), 2);
    }

    #[test]
    fn new_computes_a_content_addressed_id() {
        let author = Signature::new("a".into(), "a@example.com".into(), 1, "+0000".into());
        let committer = author.clone();
        let commit = Commit::new(author, committer, Hash::zero(), Vec::new(), "msg\n").unwrap();
        let recomputed = Hash::from_type_and_data(ObjectType::Commit, &commit.to_data().unwrap());
        assert_eq!(commit.id, recomputed);
    }
}
