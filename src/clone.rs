//! Partial-clone engine: glob-filter a commit's flattened tree, batch-fetch
//! the matching blobs, and materialise them to a destination directory.
//!
//! The glob matcher is hand-rolled rather than pulling in an extra crate;
//! the supported pattern subset (`*`, `**`, `?`) is small enough to not
//! justify the dependency.

use std::collections::{HashMap, VecDeque};
use std::fs;
use std::os::unix::fs::{symlink, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::ClientConfig;
use crate::errors::GitError;
use crate::hash::Hash;
use crate::internal::object::commit::Commit;
use crate::internal::object::tree::TreeEntryMode;
use crate::protocol::fetch::{fetch, FetchOptions};
use crate::protocol::transport::Transport;
use crate::walker::{build_flat_tree, FlatTree, FlatTreeEntry};

/// Options controlling a partial clone.
#[derive(Debug, Clone, Default)]
pub struct CloneOptions {
    pub commit_hash: Hash,
    pub destination: PathBuf,
    pub include_paths: Vec<String>,
    pub exclude_paths: Vec<String>,
}

/// The outcome of a `clone`.
pub struct CloneResult {
    pub commit: Commit,
    pub flat_tree: FlatTree,
    pub total_files: usize,
    pub filtered_files: usize,
    pub destination_path: PathBuf,
}

/// Callbacks invoked per-file during materialisation. Neither callback may
/// unwind into the caller; panics are caught and downgraded to a `warn!` log.
pub struct CloneCallbacks<'a> {
    pub on_file_written: Option<Box<dyn FnMut(&str, usize) + 'a>>,
    pub on_file_failed: Option<Box<dyn FnMut(&str, &GitError) + 'a>>,
}

impl<'a> Default for CloneCallbacks<'a> {
    fn default() -> Self {
        Self {
            on_file_written: None,
            on_file_failed: None,
        }
    }
}

/// Matches a `/`-joined glob pattern against a `/`-joined path.
///
/// Supports `*` (within one segment), `**` (across segments, including
/// zero), and `?` (one non-`/` byte). No other metacharacters are
/// recognised; everything else matches literally.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pat_segs: Vec<&str> = pattern.split('/').collect();
    let path_segs: Vec<&str> = path.split('/').collect();
    match_segments(&pat_segs, &path_segs)
}

fn match_segments(pattern: &[&str], path: &[&str]) -> bool {
    match pattern.first() {
        None => path.is_empty(),
        Some(&"**") => {
            if match_segments(&pattern[1..], path) {
                return true;
            }
            if !path.is_empty() && match_segments(pattern, &path[1..]) {
                return true;
            }
            false
        }
        Some(seg) => {
            if path.is_empty() {
                return false;
            }
            match_segment(seg, path[0]) && match_segments(&pattern[1..], &path[1..])
        }
    }
}

fn match_segment(pattern: &str, segment: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let seg: Vec<char> = segment.chars().collect();
    match_segment_chars(&pat, &seg)
}

fn match_segment_chars(pattern: &[char], segment: &[char]) -> bool {
    match pattern.first() {
        None => segment.is_empty(),
        Some('*') => {
            for i in 0..=segment.len() {
                if match_segment_chars(&pattern[1..], &segment[i..]) {
                    return true;
                }
            }
            false
        }
        Some('?') => !segment.is_empty() && match_segment_chars(&pattern[1..], &segment[1..]),
        Some(c) => segment.first() == Some(c) && match_segment_chars(&pattern[1..], &segment[1..]),
    }
}

/// A file entry is included when (no include list, or it matches at least
/// one include pattern) AND it matches no exclude pattern. Excludes win.
fn is_included(path: &str, includes: &[String], excludes: &[String]) -> bool {
    let include_ok = includes.is_empty() || includes.iter().any(|p| glob_match(p, path));
    if !include_ok {
        return false;
    }
    !excludes.iter().any(|p| glob_match(p, path))
}

/// Clones `options.commit_hash` into `options.destination`.
/// `config` supplies the batch-concurrency knobs (`max_in_flight`,
/// `batch_size`).
pub fn clone(
    transport: &dyn Transport,
    base_url: &str,
    options: &CloneOptions,
    config: &ClientConfig,
    mut callbacks: CloneCallbacks<'_>,
) -> Result<CloneResult, GitError> {
    let (commit, flat_tree) = build_flat_tree(transport, base_url, options.commit_hash)?;

    let total_files = flat_tree.blob_entries().count();
    let selected: Vec<&FlatTreeEntry> = flat_tree
        .blob_entries()
        .filter(|e| is_included(&e.path, &options.include_paths, &options.exclude_paths))
        .collect();
    let filtered_files = selected.len();

    tracing::debug!(
        total = total_files,
        filtered = filtered_files,
        "partial clone: tree filtered"
    );

    let blobs = batch_fetch_blobs(transport, base_url, &selected, config)?;

    fs::create_dir_all(&options.destination)?;

    for entry in &selected {
        let result = materialise_one(&options.destination, entry, &blobs);
        match result {
            Ok(size) => {
                if let Some(cb) = callbacks.on_file_written.as_mut() {
                    let path = &entry.path;
                    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(path, size))).is_err() {
                        tracing::warn!(path = %entry.path, "on_file_written callback panicked");
                    }
                }
            }
            Err(err) => {
                tracing::warn!(path = %entry.path, error = %err, "failed to write file during clone");
                if let Some(cb) = callbacks.on_file_failed.as_mut() {
                    let path = &entry.path;
                    if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| cb(path, &err))).is_err() {
                        tracing::warn!(path = %entry.path, "on_file_failed callback panicked");
                    }
                }
            }
        }
    }

    Ok(CloneResult {
        commit,
        flat_tree,
        total_files,
        filtered_files,
        destination_path: options.destination.clone(),
    })
}

/// Batch-fetches every selected blob, splitting into `config.batch_size`
/// -hash sub-requests and running up to `config.max_in_flight` of them
/// concurrently via scoped worker threads.
fn batch_fetch_blobs(
    transport: &dyn Transport,
    base_url: &str,
    selected: &[&FlatTreeEntry],
    config: &ClientConfig,
) -> Result<HashMap<Hash, Vec<u8>>, GitError> {
    let batch_size = config.batch_size.max(1);
    let chunks: VecDeque<Vec<Hash>> = selected
        .chunks(batch_size)
        .map(|chunk| chunk.iter().map(|e| e.hash).collect())
        .collect();

    if chunks.is_empty() {
        return Ok(HashMap::new());
    }

    let worker_count = config.max_in_flight.max(1).min(chunks.len());
    let work = Mutex::new(chunks);
    let results: Mutex<Vec<Result<crate::internal::pack::reader::ParsedPack, GitError>>> =
        Mutex::new(Vec::new());
    let failed = std::sync::atomic::AtomicBool::new(false);

    std::thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| loop {
                if failed.load(std::sync::atomic::Ordering::Relaxed) {
                    break;
                }
                let Some(wants) = work.lock().expect("blob-fetch work queue poisoned").pop_front()
                else {
                    break;
                };
                let outcome = fetch(
                    transport,
                    base_url,
                    &FetchOptions {
                        wants,
                        done: true,
                        ..Default::default()
                    },
                )
                .map(|r| r.pack);
                if outcome.is_err() {
                    failed.store(true, std::sync::atomic::Ordering::Relaxed);
                }
                results.lock().expect("blob-fetch result list poisoned").push(outcome);
            });
        }
    });

    let mut blobs = HashMap::new();
    for outcome in results.into_inner().expect("blob-fetch result list poisoned") {
        let pack = outcome?;
        for entry in pack.entries {
            blobs.insert(entry.hash, entry.data);
        }
    }
    Ok(blobs)
}

fn materialise_one(
    destination: &Path,
    entry: &FlatTreeEntry,
    blobs: &HashMap<Hash, Vec<u8>>,
) -> Result<usize, GitError> {
    let data = blobs
        .get(&entry.hash)
        .ok_or_else(|| GitError::ObjectNotFound(entry.hash.to_string()))?;
    let target = destination.join(&entry.path);
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    if entry.mode == TreeEntryMode::Symlink {
        let link_target = String::from_utf8(data.clone())
            .map_err(|e| GitError::ConversionError(e.to_string()))?;
        let _ = fs::remove_file(&target);
        symlink(&link_target, &target)?;
        return Ok(data.len());
    }

    fs::write(&target, data)?;
    let mode = if entry.mode == TreeEntryMode::Executable {
        0o755
    } else {
        0o644
    };
    fs::set_permissions(&target, fs::Permissions::from_mode(mode))?;
    Ok(data.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn star_matches_within_a_single_segment() {
        assert!(glob_match("src/*.rs", "src/lib.rs"));
        assert!(!glob_match("src/*.rs", "src/sub/lib.rs"));
    }

    #[test]
    fn double_star_matches_across_segments() {
        assert!(glob_match("src/**/*.rs", "src/a/b/lib.rs"));
        assert!(glob_match("src/**/*.rs", "src/lib.rs"));
        assert!(glob_match("**", "any/depth/at/all"));
    }

    #[test]
    fn question_mark_matches_one_non_slash_byte() {
        assert!(glob_match("file?.txt", "file1.txt"));
        assert!(!glob_match("file?.txt", "file12.txt"));
        assert!(!glob_match("file?.txt", "file/.txt"));
    }

    #[test]
    fn excludes_take_precedence_over_includes() {
        let includes = vec!["**/*.rs".to_string()];
        let excludes = vec!["**/generated.rs".to_string()];
        assert!(is_included("src/lib.rs", &includes, &excludes));
        assert!(!is_included("src/generated.rs", &includes, &excludes));
    }

    #[test]
    fn empty_include_list_means_everything_matches() {
        assert!(is_included("anything/at/all.bin", &[], &[]));
    }

    #[test]
    fn materialise_one_writes_a_regular_file_with_its_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut blobs = HashMap::new();
        let hash = Hash::of(b"fn main() {}");
        blobs.insert(hash, b"fn main() {}".to_vec());
        let entry = FlatTreeEntry {
            path: "src/main.rs".to_string(),
            mode: TreeEntryMode::Regular,
            hash,
        };

        let written = materialise_one(dir.path(), &entry, &blobs).unwrap();
        assert_eq!(written, 12);
        let target = dir.path().join("src/main.rs");
        assert_eq!(fs::read(&target).unwrap(), b"fn main() {}");
        let mode = fs::metadata(&target).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o644);
    }

    #[test]
    fn materialise_one_writes_an_executable_with_its_mode() {
        let dir = tempfile::tempdir().unwrap();
        let mut blobs = HashMap::new();
        let hash = Hash::of(b"#!/bin/sh\necho hi\n");
        blobs.insert(hash, b"#!/bin/sh\necho hi\n".to_vec());
        let entry = FlatTreeEntry {
            path: "run.sh".to_string(),
            mode: TreeEntryMode::Executable,
            hash,
        };

        materialise_one(dir.path(), &entry, &blobs).unwrap();
        let mode = fs::metadata(dir.path().join("run.sh"))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn materialise_one_errors_when_the_blob_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let entry = FlatTreeEntry {
            path: "missing.bin".to_string(),
            mode: TreeEntryMode::Regular,
            hash: Hash::of(b"never fetched"),
        };
        let err = materialise_one(dir.path(), &entry, &HashMap::new()).unwrap_err();
        assert!(matches!(err, GitError::ObjectNotFound(_)));
    }
}
