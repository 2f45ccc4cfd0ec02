//! Top-level `Client` façade: wires config, transport, and the fetch/walker/
//! stage/push/clone layers into one handle.

use std::path::PathBuf;

use crate::clone::{clone, CloneCallbacks, CloneOptions, CloneResult};
use crate::config::ClientConfig;
use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::object::commit::Commit;
use crate::protocol::fetch::{ls_refs, LsRefsOptions, RefEntry};
use crate::protocol::push::{can_read, can_write};
use crate::protocol::transport::{HttpTransport, Transport};
use crate::stage::StagedWriter;
use crate::walker::{
    build_flat_tree, compare_commits, get_blob, get_blob_by_path, list_commits, DiffEntry,
    FlatTree, ListCommitsOptions,
};

/// A handle bound to one repository URL, composing a `Transport` with the
/// config that parameterises it.
pub struct Client<T: Transport = HttpTransport> {
    base_url: String,
    transport: T,
    config: ClientConfig,
}

impl Client<HttpTransport> {
    /// Builds a client against `base_url` using the default blocking
    /// `ureq` transport, configured per `config`.
    pub fn new(base_url: impl Into<String>, config: ClientConfig) -> Self {
        let transport = HttpTransport::with_config(&config);
        Self {
            base_url: base_url.into(),
            transport,
            config,
        }
    }
}

impl<T: Transport> Client<T> {
    /// Builds a client against an arbitrary `Transport`, e.g. a test double.
    pub fn with_transport(base_url: impl Into<String>, transport: T, config: ClientConfig) -> Self {
        Self {
            base_url: base_url.into(),
            transport,
            config,
        }
    }

    /// `true` if `git-upload-pack` (reads) is reachable and authorized.
    pub fn can_read(&self) -> Result<bool, GitError> {
        can_read(&self.transport, &self.base_url)
    }

    /// `true` if `git-receive-pack` (writes) is reachable and authorized.
    pub fn can_write(&self) -> Result<bool, GitError> {
        can_write(&self.transport, &self.base_url)
    }

    /// Lists refs via `ls-refs`.
    pub fn list_refs(&self, opts: &LsRefsOptions) -> Result<Vec<RefEntry>, GitError> {
        ls_refs(&self.transport, &self.base_url, opts)
    }

    /// Resolves `name` (a literal ref, e.g. `refs/heads/main`) to its hash.
    pub fn resolve_ref(&self, name: &str) -> Result<Hash, GitError> {
        let refs = self.list_refs(&LsRefsOptions {
            ref_prefixes: vec![name.to_string()],
            ..Default::default()
        })?;
        refs.into_iter()
            .find(|r| r.name == name)
            .map(|r| r.hash)
            .ok_or_else(|| GitError::RefNotFound(name.to_string()))
    }

    /// Fetches `commit_hash` and its reachable trees, returning the parsed
    /// commit and its flattened tree listing.
    pub fn get_tree(&self, commit_hash: Hash) -> Result<(Commit, FlatTree), GitError> {
        build_flat_tree(&self.transport, &self.base_url, commit_hash)
    }

    /// Fetches a single blob by hash.
    pub fn get_blob(&self, hash: Hash) -> Result<Vec<u8>, GitError> {
        get_blob(&self.transport, &self.base_url, hash)
    }

    /// Resolves `path` against an already-built `FlatTree` and fetches the
    /// blob it names.
    pub fn get_blob_by_path(&self, tree: &FlatTree, path: &str) -> Result<Vec<u8>, GitError> {
        get_blob_by_path(&self.transport, &self.base_url, tree, path)
    }

    /// Diffs two commits' flattened trees path-by-path.
    pub fn compare_commits(&self, base: Hash, head: Hash) -> Result<Vec<DiffEntry>, GitError> {
        compare_commits(&self.transport, &self.base_url, base, head)
    }

    /// Walks commit history from `from_hash`, applying paging/`since`/`path`.
    pub fn list_commits(
        &self,
        from_hash: Hash,
        opts: &ListCommitsOptions,
    ) -> Result<Vec<Commit>, GitError> {
        list_commits(&self.transport, &self.base_url, from_hash, opts)
    }

    /// Begins staging mutations against `ref_name`, currently at `base_hash`.
    pub fn stage(&self, ref_name: impl Into<String>, base_hash: Hash) -> StagedWriter {
        StagedWriter::new(ref_name, base_hash)
    }

    /// Runs `StagedWriter::commit`, threading this client's transport/base
    /// URL through so callers don't need to hold onto them separately.
    pub fn commit_stage(
        &self,
        writer: &mut StagedWriter,
        message: &str,
        author: crate::internal::object::signature::Signature,
        committer: crate::internal::object::signature::Signature,
    ) -> Result<Hash, GitError> {
        writer.commit(&self.transport, &self.base_url, message, author, committer)
    }

    /// Runs `StagedWriter::push` against this client's transport/base URL.
    pub fn push_stage(&self, writer: &mut StagedWriter, old_hash: Hash) -> Result<(), GitError> {
        writer.push(&self.transport, &self.base_url, old_hash)
    }

    /// Performs a partial clone of `commit_hash` into `destination`.
    pub fn clone_to(
        &self,
        commit_hash: Hash,
        destination: PathBuf,
        include_paths: Vec<String>,
        exclude_paths: Vec<String>,
        callbacks: CloneCallbacks<'_>,
    ) -> Result<CloneResult, GitError> {
        let options = CloneOptions {
            commit_hash,
            destination,
            include_paths,
            exclude_paths,
        };
        clone(&self.transport, &self.base_url, &options, &self.config, callbacks)
    }
}
