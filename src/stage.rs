//! `StagedWriter`: an in-memory tree-mutation builder that accumulates
//! blob/tree edits, finalises them into Commit objects, and pushes the
//! result over `git-receive-pack`.

use std::collections::BTreeMap;

use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::object::commit::Commit;
use crate::internal::object::signature::Signature;
use crate::internal::object::tree::{Tree, TreeEntry, TreeEntryMode};
use crate::internal::object::ObjectType;
use crate::internal::pack::entry::Entry;
use crate::protocol::push::{RefUpdate, push};
use crate::protocol::transport::Transport;
use crate::walker::{FlatTree, FlatTreeEntry, build_flat_tree};

/// A staged blob mutation at a path, relative to the writer's current base.
#[derive(Debug, Clone)]
enum StagedBlob {
    Set { data: Vec<u8>, executable: bool },
    Deleted,
}

/// Accumulates blob/tree edits against a ref's current tip, then finalises
/// them into one or more commits and pushes them.
pub struct StagedWriter {
    ref_name: String,
    base_hash: Hash,
    /// Path -> staged mutation, applied on top of whatever `base_hash`'s
    /// tree already has at that path.
    staged: BTreeMap<String, StagedBlob>,
    /// Commits built by `commit()` but not yet pushed.
    pending_commits: Vec<Commit>,
    /// New objects (blobs + synthesised trees + commits) produced so far,
    /// serialised into a packfile at push time.
    pending_objects: Vec<Entry>,
    flat_tree_cache: Option<FlatTree>,
}

impl StagedWriter {
    pub fn new(ref_name: impl Into<String>, base_hash: Hash) -> Self {
        Self {
            ref_name: ref_name.into(),
            base_hash,
            staged: BTreeMap::new(),
            pending_commits: Vec::new(),
            pending_objects: Vec::new(),
            flat_tree_cache: None,
        }
    }

    fn load_base_tree(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
    ) -> Result<FlatTree, GitError> {
        if let Some(cached) = &self.flat_tree_cache {
            return Ok(cached.clone());
        }
        if self.base_hash.is_zero() {
            let empty = FlatTree::default();
            self.flat_tree_cache = Some(empty.clone());
            return Ok(empty);
        }
        let (_, tree) = build_flat_tree(transport, base_url, self.base_hash)?;
        self.flat_tree_cache = Some(tree.clone());
        Ok(tree)
    }

    fn blob_exists_against(&self, base: &FlatTree, path: &str) -> bool {
        match self.staged.get(path) {
            Some(StagedBlob::Set { .. }) => true,
            Some(StagedBlob::Deleted) => false,
            None => base.get(path).map(|e| !e.mode.is_tree()).unwrap_or(false),
        }
    }

    pub fn blob_exists(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
    ) -> Result<bool, GitError> {
        let base = self.load_base_tree(transport, base_url)?;
        Ok(self.blob_exists_against(&base, path))
    }

    pub fn create_blob(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
        data: Vec<u8>,
    ) -> Result<(), GitError> {
        if path.is_empty() {
            return Err(GitError::EmptyPath);
        }
        let base = self.load_base_tree(transport, base_url)?;
        if self.blob_exists_against(&base, path) {
            return Err(GitError::ObjectAlreadyExists(path.to_string()));
        }
        self.staged.insert(
            path.to_string(),
            StagedBlob::Set {
                data,
                executable: false,
            },
        );
        Ok(())
    }

    pub fn update_blob(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
        data: Vec<u8>,
    ) -> Result<(), GitError> {
        let base = self.load_base_tree(transport, base_url)?;
        if !self.blob_exists_against(&base, path) {
            return Err(GitError::ObjectNotFound(path.to_string()));
        }
        let executable = match self.staged.get(path) {
            Some(StagedBlob::Set { executable, .. }) => *executable,
            _ => base
                .get(path)
                .map(|e| e.mode == TreeEntryMode::Executable)
                .unwrap_or(false),
        };
        self.staged
            .insert(path.to_string(), StagedBlob::Set { data, executable });
        Ok(())
    }

    pub fn delete_blob(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
    ) -> Result<(), GitError> {
        let base = self.load_base_tree(transport, base_url)?;
        if !self.blob_exists_against(&base, path) {
            return Err(GitError::ObjectNotFound(path.to_string()));
        }
        self.staged.insert(path.to_string(), StagedBlob::Deleted);
        Ok(())
    }

    pub fn move_blob(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        from: &str,
        to: &str,
    ) -> Result<(), GitError> {
        let base = self.load_base_tree(transport, base_url)?;
        if !self.blob_exists_against(&base, from) {
            return Err(GitError::ObjectNotFound(from.to_string()));
        }
        if self.blob_exists_against(&base, to) {
            return Err(GitError::ObjectAlreadyExists(to.to_string()));
        }
        let data = self.read_staged_or_base(transport, base_url, from)?;
        self.staged.insert(from.to_string(), StagedBlob::Deleted);
        self.staged.insert(
            to.to_string(),
            StagedBlob::Set {
                data,
                executable: false,
            },
        );
        Ok(())
    }

    fn read_staged_or_base(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
    ) -> Result<Vec<u8>, GitError> {
        if let Some(StagedBlob::Set { data, .. }) = self.staged.get(path) {
            return Ok(data.clone());
        }
        let base = self.load_base_tree(transport, base_url)?;
        let entry = base
            .get(path)
            .ok_or_else(|| GitError::ObjectNotFound(path.to_string()))?;
        crate::walker::get_blob(transport, base_url, entry.hash)
    }

    /// Removes every staged path under `path` (or the whole tree, when
    /// `path` is empty or `"."`) from the base tree.
    pub fn delete_tree(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
    ) -> Result<(), GitError> {
        let base = self.load_base_tree(transport, base_url)?;
        let whole_root = path.is_empty() || path == ".";
        if !whole_root && base.entries.iter().all(|e| e.path != path && !e.path.starts_with(&format!("{path}/"))) {
            return Err(GitError::PathNotFound(path.to_string()));
        }
        let prefix = format!("{path}/");
        for entry in &base.entries {
            if whole_root || entry.path == path || entry.path.starts_with(&prefix) {
                if !entry.mode.is_tree() {
                    self.staged.insert(entry.path.clone(), StagedBlob::Deleted);
                }
            }
        }
        Ok(())
    }

    /// Relocates the subtree at `from` to `to`, preserving every descendant
    /// blob's content (and hash). Fails if `from` has no entries, or if `to`
    /// already has one.
    pub fn move_tree(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        from: &str,
        to: &str,
    ) -> Result<(), GitError> {
        if from.is_empty() || to.is_empty() {
            return Err(GitError::EmptyPath);
        }
        let entries = self.get_tree(transport, base_url, from)?;
        if self.get_tree(transport, base_url, to).is_ok() {
            return Err(GitError::ObjectAlreadyExists(to.to_string()));
        }

        let mut moves = Vec::with_capacity(entries.len());
        for entry in &entries {
            let new_path = if entry.path == from {
                to.to_string()
            } else {
                format!("{to}{}", &entry.path[from.len()..])
            };
            let data = self.read_staged_or_base(transport, base_url, &entry.path)?;
            let executable = entry.mode == TreeEntryMode::Executable;
            moves.push((entry.path.clone(), new_path, data, executable));
        }

        for (old_path, new_path, data, executable) in moves {
            self.staged.insert(old_path, StagedBlob::Deleted);
            self.staged.insert(new_path, StagedBlob::Set { data, executable });
        }
        Ok(())
    }

    /// Returns the flattened entries of the subtree at `path` (or the whole
    /// tree, for an empty path or `"."`), overlaying staged creates/updates/
    /// deletes onto the base tree. Fails if nothing exists at `path`.
    pub fn get_tree(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        path: &str,
    ) -> Result<Vec<FlatTreeEntry>, GitError> {
        use crate::internal::object::blob::Blob;

        let whole_root = path.is_empty() || path == ".";
        let prefix = format!("{path}/");
        let under = |p: &str| whole_root || p == path || p.starts_with(&prefix);

        let base = self.load_base_tree(transport, base_url)?;
        let mut view: BTreeMap<String, FlatTreeEntry> = BTreeMap::new();
        for entry in base.blob_entries() {
            if under(&entry.path) {
                view.insert(entry.path.clone(), entry.clone());
            }
        }
        for (p, staged) in &self.staged {
            if !under(p) {
                continue;
            }
            match staged {
                StagedBlob::Set { data, executable } => {
                    let blob = Blob::new(data.clone());
                    view.insert(
                        p.clone(),
                        FlatTreeEntry {
                            path: p.clone(),
                            mode: if *executable {
                                TreeEntryMode::Executable
                            } else {
                                TreeEntryMode::Regular
                            },
                            hash: blob.id,
                        },
                    );
                }
                StagedBlob::Deleted => {
                    view.remove(p);
                }
            }
        }

        if view.is_empty() {
            return Err(GitError::PathNotFound(path.to_string()));
        }
        Ok(view.into_values().collect())
    }

    /// Finalises all staged mutations into trees (bottom-up, canonically
    /// sorted) and a new Commit on top of the current base, then refreshes
    /// the writer's base so further `commit()`s chain.
    pub fn commit(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        message: &str,
        author: Signature,
        committer: Signature,
    ) -> Result<Hash, GitError> {
        if self.staged.is_empty() {
            return Err(GitError::NothingToCommit);
        }
        if message.is_empty() {
            return Err(GitError::EmptyCommitMessage);
        }
        if author.name.is_empty() || author.email.is_empty() {
            return Err(GitError::InvalidAuthor("author name/email must be non-empty".to_string()));
        }

        let base = self.load_base_tree(transport, base_url)?;

        // Build the merged path -> (bytes, executable) map for every blob
        // in the resulting tree: base entries not touched, overlaid with
        // staged creates/updates, with staged deletes removed.
        let mut merged: BTreeMap<String, (Vec<u8>, bool)> = BTreeMap::new();
        for entry in base.blob_entries() {
            if self.staged.contains_key(&entry.path) {
                continue;
            }
            let data = crate::walker::get_blob(transport, base_url, entry.hash)?;
            merged.insert(
                entry.path.clone(),
                (data, entry.mode == TreeEntryMode::Executable),
            );
        }
        for (path, staged) in &self.staged {
            match staged {
                StagedBlob::Set { data, executable } => {
                    merged.insert(path.clone(), (data.clone(), *executable));
                }
                StagedBlob::Deleted => {
                    merged.remove(path);
                }
            }
        }

        let (root_hash, mut new_objects) = build_tree_objects(&merged);
        self.pending_objects.append(&mut new_objects);

        let commit = Commit::new(
            author,
            committer,
            root_hash,
            vec![self.base_hash].into_iter().filter(|h| !h.is_zero()).collect(),
            message,
        )?;
        self.pending_objects.push(Entry::try_from(commit.clone())?);

        self.base_hash = commit.id;
        self.flat_tree_cache = None;
        self.staged.clear();
        self.pending_commits.push(commit.clone());
        Ok(commit.id)
    }

    /// Serialises every pending commit's new objects into a packfile and
    /// pushes it via `git-receive-pack`.
    pub fn push(
        &mut self,
        transport: &dyn Transport,
        base_url: &str,
        old_hash: Hash,
    ) -> Result<(), GitError> {
        if self.pending_commits.is_empty() {
            return Err(GitError::NothingToPush);
        }
        let update = RefUpdate {
            old_hash,
            new_hash: self.base_hash,
            ref_name: self.ref_name.clone(),
        };
        let report = push(transport, base_url, &[update], &self.pending_objects)?;
        if !report.unpack_ok {
            return Err(GitError::GitUnpackError("unpack did not report ok".to_string()));
        }
        for (ref_name, status) in &report.ref_statuses {
            if let Err(reason) = status {
                return Err(GitError::GitReferenceUpdateError {
                    ref_name: ref_name.clone(),
                    reason: reason.clone(),
                });
            }
        }
        self.pending_commits.clear();
        self.pending_objects.clear();
        Ok(())
    }

    /// Drops all staged state. Idempotent.
    pub fn cleanup(&mut self) {
        self.staged.clear();
        self.pending_commits.clear();
        self.pending_objects.clear();
        self.flat_tree_cache = None;
    }
}

/// Builds the full tree hierarchy for `blobs` (path -> (bytes, executable)),
/// bottom-up, returning the root tree's hash and every new blob/tree object
/// produced.
fn build_tree_objects(blobs: &BTreeMap<String, (Vec<u8>, bool)>) -> (Hash, Vec<Entry>) {
    use crate::internal::object::blob::Blob;

    // Group entries by directory.
    let mut by_dir: BTreeMap<String, Vec<(String, Vec<u8>, bool)>> = BTreeMap::new();
    for (path, (data, executable)) in blobs {
        let (dir, name) = match path.rfind('/') {
            Some(i) => (path[..i].to_string(), path[i + 1..].to_string()),
            None => (String::new(), path.clone()),
        };
        by_dir
            .entry(dir)
            .or_default()
            .push((name, data.clone(), *executable));
    }

    let mut objects = Vec::new();
    let mut tree_hashes: BTreeMap<String, Hash> = BTreeMap::new();

    // Collect every directory that needs to exist, including empty
    // intermediate ones implied by deeper paths.
    let mut all_dirs: Vec<String> = by_dir.keys().cloned().collect();
    for dir in by_dir.keys() {
        let mut d = dir.as_str();
        while let Some(i) = d.rfind('/') {
            d = &d[..i];
            if !all_dirs.contains(&d.to_string()) {
                all_dirs.push(d.to_string());
            }
        }
        if !d.is_empty() && !all_dirs.contains(&String::new()) {
            all_dirs.push(String::new());
        }
    }
    // Deepest directories first, so every subtree's hash is known before its
    // parent is built.
    all_dirs.sort_by_key(|d| std::cmp::Reverse(d.matches('/').count() + if d.is_empty() { 0 } else { 1 }));

    for dir in &all_dirs {
        let mut entries = Vec::new();
        if let Some(blob_children) = by_dir.get(dir) {
            for (name, data, executable) in blob_children {
                let blob = Blob::new(data.clone());
                let mode = if *executable {
                    TreeEntryMode::Executable
                } else {
                    TreeEntryMode::Regular
                };
                entries.push(TreeEntry {
                    mode,
                    name: name.clone(),
                    hash: blob.id,
                });
                objects.push(Entry::from(blob));
            }
        }
        // Child subtrees directly under `dir`.
        for (child_dir, child_hash) in &tree_hashes {
            let (parent, name) = match child_dir.rfind('/') {
                Some(i) => (&child_dir[..i], &child_dir[i + 1..]),
                None => ("", child_dir.as_str()),
            };
            if parent == dir && !name.is_empty() {
                entries.push(TreeEntry {
                    mode: TreeEntryMode::Subtree,
                    name: name.to_string(),
                    hash: *child_hash,
                });
            }
        }
        let tree = Tree::from_entries(entries);
        tree_hashes.insert(dir.clone(), tree.id);
        objects.push(Entry::try_from(tree).expect("tree serialisation is infallible"));
    }

    let root_hash = tree_hashes.get("").copied().unwrap_or_else(|| Tree::empty().id);
    if !tree_hashes.contains_key("") {
        objects.push(Entry::try_from(Tree::empty()).expect("empty tree serialisation is infallible"));
    }
    (root_hash, objects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_tree_objects_produces_a_nested_hierarchy() {
        let mut blobs = BTreeMap::new();
        blobs.insert("a.txt".to_string(), (b"top".to_vec(), false));
        blobs.insert("dir/b.txt".to_string(), (b"nested".to_vec(), false));
        let (root_hash, objects) = build_tree_objects(&blobs);
        assert!(!root_hash.is_zero());
        assert!(objects.iter().any(|e| e.obj_type == ObjectType::Blob));
        assert!(objects.iter().any(|e| e.obj_type == ObjectType::Tree));
    }

    #[test]
    fn empty_blob_map_yields_the_empty_tree() {
        let blobs = BTreeMap::new();
        let (root_hash, _) = build_tree_objects(&blobs);
        assert_eq!(root_hash, Tree::empty().id);
    }

    /// A base hash of zero never touches the tree, so these tests don't
    /// need a real transport.
    struct UnreachableTransport;

    impl Transport for UnreachableTransport {
        fn discover(&self, _base_url: &str, _service: crate::protocol::types::ServiceType) -> Result<bytes::Bytes, GitError> {
            unreachable!("empty base tree never discovers")
        }
        fn command(&self, _base_url: &str, _service: crate::protocol::types::ServiceType, _body: Vec<u8>) -> Result<Box<dyn std::io::Read>, GitError> {
            unreachable!("empty base tree never issues commands")
        }
    }

    #[test]
    fn move_tree_relocates_every_descendant_blob() {
        let mut writer = StagedWriter::new("refs/heads/main", Hash::zero());
        writer
            .create_blob(&UnreachableTransport, "", "old/a.txt", b"a".to_vec())
            .unwrap();
        writer
            .create_blob(&UnreachableTransport, "", "old/nested/b.txt", b"b".to_vec())
            .unwrap();

        writer.move_tree(&UnreachableTransport, "", "old", "new").unwrap();

        assert!(!writer.blob_exists(&UnreachableTransport, "", "old/a.txt").unwrap());
        assert!(writer.blob_exists(&UnreachableTransport, "", "new/a.txt").unwrap());
        assert!(writer.blob_exists(&UnreachableTransport, "", "new/nested/b.txt").unwrap());
    }

    #[test]
    fn move_tree_fails_when_destination_exists() {
        let mut writer = StagedWriter::new("refs/heads/main", Hash::zero());
        writer
            .create_blob(&UnreachableTransport, "", "old/a.txt", b"a".to_vec())
            .unwrap();
        writer
            .create_blob(&UnreachableTransport, "", "new/taken.txt", b"x".to_vec())
            .unwrap();

        assert!(matches!(
            writer.move_tree(&UnreachableTransport, "", "old", "new").unwrap_err(),
            GitError::ObjectAlreadyExists(_)
        ));
    }

    #[test]
    fn get_tree_overlays_staged_state_on_the_base() {
        let mut writer = StagedWriter::new("refs/heads/main", Hash::zero());
        writer
            .create_blob(&UnreachableTransport, "", "dir/a.txt", b"a".to_vec())
            .unwrap();
        writer
            .create_blob(&UnreachableTransport, "", "dir/b.txt", b"b".to_vec())
            .unwrap();

        let entries = writer.get_tree(&UnreachableTransport, "", "dir").unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["dir/a.txt", "dir/b.txt"]);
    }

    #[test]
    fn get_tree_fails_on_a_path_with_no_entries() {
        let mut writer = StagedWriter::new("refs/heads/main", Hash::zero());
        assert!(matches!(
            writer.get_tree(&UnreachableTransport, "", "nope").unwrap_err(),
            GitError::PathNotFound(_)
        ));
    }
}
