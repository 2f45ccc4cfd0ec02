//! Error types for the git-smart-core crate.
//!
//! A single enumeration carries every failure this library can produce, split
//! loosely into four tiers: programmer errors (caught before any I/O),
//! protocol errors (malformed wire data), server errors (HTTP/Git-level
//! rejections), and application errors (missing objects, stale refs). Variants
//! with no payload act as sentinels matchable by identity (`matches!`);
//! variants with named fields carry the structured detail callers need to
//! react programmatically. `thiserror` gives every variant a `Display` and
//! wires `std::io::Error` in via `#[from]`.

use thiserror::Error;

use crate::internal::object::ObjectType;

#[derive(Error, Debug)]
pub enum GitError {
    // --- tier 1: programmer errors -----------------------------------
    /// A path argument was empty where a path is required.
    #[error("path must not be empty")]
    EmptyPath,

    /// A commit message argument was empty.
    #[error("commit message must not be empty")]
    EmptyCommitMessage,

    /// An author or committer identity was missing a name or email.
    #[error("invalid author identity: {0}")]
    InvalidAuthor(String),

    /// `Commit()` was called on a writer with no staged mutations.
    #[error("nothing staged to commit")]
    NothingToCommit,

    /// `Push()` was called on a writer with no pending commits.
    #[error("nothing to push")]
    NothingToPush,

    /// A create-style operation targeted a path that already has a blob.
    #[error("object already exists at `{0}`")]
    ObjectAlreadyExists(String),

    /// The named hash was not present where it was expected to be.
    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// A path resolved to an object of the wrong kind.
    #[error("unexpected object type for `{hash}`: expected {expected:?}, got {actual:?}")]
    UnexpectedObjectType {
        hash: String,
        expected: ObjectType,
        actual: ObjectType,
    },

    // --- tier 2: protocol errors ---------------------------------------
    /// A pkt-line or section header could not be parsed.
    #[error("failed to parse packet line `{line}`: {underlying}")]
    PacketParseError { line: String, underlying: String },

    /// A pkt-line frame's length prefix or payload was malformed.
    #[error("invalid pkt-line: {0}")]
    InvalidPacketLine(String),

    /// The `PACK` magic or version fields were malformed.
    #[error("invalid pack header: {0}")]
    InvalidPackHeader(String),

    /// A byte stream claiming to be a packfile lacked the `PACK` signature.
    #[error("no packfile signature found")]
    NoPackfileSignature,

    /// Pack version was neither 2 nor 3.
    #[error("unsupported packfile version: {0}")]
    UnsupportedPackfileVersion(u32),

    /// A delta instruction stream violated the format (bad instruction,
    /// out-of-range copy, or a result-length mismatch).
    #[error("invalid delta: {0}")]
    InvalidDelta(String),

    /// A hash string was not 40 hex digits (or the all-zero sentinel).
    #[error("`{0}` is not a valid hash value")]
    InvalidHashValue(String),

    /// An object's type-name header was not one of `commit`/`tree`/`blob`/`tag`.
    #[error("`{0}` is not a recognised object type")]
    InvalidObjectType(String),

    /// A tree object's framing (mode/name/hash record boundaries) was malformed.
    #[error("malformed tree object")]
    InvalidTreeObject,

    /// A single tree entry was malformed (bad mode, truncated hash).
    #[error("invalid tree entry: {0}")]
    InvalidTreeItem(String),

    /// A commit object's headers or body could not be parsed.
    #[error("invalid commit object: {0}")]
    InvalidCommit(String),

    /// A tag object's headers or body could not be parsed.
    #[error("invalid tag object: {0}")]
    InvalidTagObject(String),

    /// A side-band channel 3 payload terminated the stream.
    #[error("fatal error from server: {0}")]
    FatalFetchError(String),

    /// A v2 `fetch` response used a status/section the client doesn't
    /// recognise, or sections appeared out of order.
    #[error("invalid fetch response: {0}")]
    InvalidFetchStatus(String),

    /// A single pkt-line payload exceeded the protocol's maximum size.
    #[error("payload of {size} bytes exceeds the {limit}-byte pkt-line limit")]
    DataTooLarge { size: usize, limit: usize },

    // --- tier 3: server errors ------------------------------------------
    /// HTTP 401.
    #[error("unauthorized (status {status}): {underlying}")]
    Unauthorized { status: u16, underlying: String },

    /// HTTP 403.
    #[error("permission denied for {operation} {endpoint} (status {status}): {underlying}")]
    PermissionDenied {
        status: u16,
        operation: String,
        endpoint: String,
        underlying: String,
    },

    /// HTTP 404 on a repository-scoped endpoint.
    #[error("repository not found (status {status}): {underlying}")]
    RepositoryNotFound { status: u16, underlying: String },

    /// HTTP 5xx.
    #[error("server unavailable (status {status}): {underlying}")]
    ServerUnavailable { status: u16, underlying: String },

    /// `report-status-v2`'s `unpack` line reported failure.
    #[error("git-receive-pack failed to unpack: {0}")]
    GitUnpackError(String),

    /// `report-status-v2` rejected a single ref update (`ng <ref> <reason>`).
    #[error("ref update rejected for `{ref_name}`: {reason}")]
    GitReferenceUpdateError { ref_name: String, reason: String },

    /// Any other server-reported Git-level failure.
    #[error("git server error ({kind}): {message}")]
    GitServerError { kind: String, message: String },

    // --- tier 4: application errors -------------------------------------
    /// `GetRef`/ref-lifecycle operations against a name with no ref.
    #[error("ref not found: {0}")]
    RefNotFound(String),

    /// A path segment was absent while walking a tree.
    #[error("path not found: {0}")]
    PathNotFound(String),

    // --- infrastructure ---------------------------------------------------
    /// I/O failure from the transport or from an in-memory reader.
    #[error("IO error: {0}")]
    IOError(#[from] std::io::Error),

    /// UTF-8 or other text-encoding conversion failure.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Catch-all for conditions not otherwise classified.
    #[error("{0}")]
    CustomError(String),
}

impl GitError {
    pub fn unauthorized(status: u16, underlying: impl Into<String>) -> Self {
        GitError::Unauthorized {
            status,
            underlying: underlying.into(),
        }
    }

    pub fn permission_denied(
        status: u16,
        operation: impl Into<String>,
        endpoint: impl Into<String>,
        underlying: impl Into<String>,
    ) -> Self {
        GitError::PermissionDenied {
            status,
            operation: operation.into(),
            endpoint: endpoint.into(),
            underlying: underlying.into(),
        }
    }

    pub fn repository_not_found(status: u16, underlying: impl Into<String>) -> Self {
        GitError::RepositoryNotFound {
            status,
            underlying: underlying.into(),
        }
    }

    pub fn server_unavailable(status: u16, underlying: impl Into<String>) -> Self {
        GitError::ServerUnavailable {
            status,
            underlying: underlying.into(),
        }
    }

    /// `true` for the variants this library treats as server-side rejections
    /// (not retried automatically; see the propagation policy).
    pub fn is_server_error(&self) -> bool {
        matches!(
            self,
            GitError::Unauthorized { .. }
                | GitError::PermissionDenied { .. }
                | GitError::RepositoryNotFound { .. }
                | GitError::ServerUnavailable { .. }
        )
    }
}
