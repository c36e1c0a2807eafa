//! Error types and the numeric outcome contract for sync operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while resolving an expected digest from the remote
/// digest list.
#[derive(Error, Debug)]
pub enum DigestError {
    /// I/O error reading local key material.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Transport error fetching the digest resource.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// The digest resource answered with a non-success status.
    #[error("could not fetch digest list from {url}: server returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The digest list carries no entry for the requested file.
    #[error("could not find SHA512 digest for {filename}")]
    NoEntry { filename: String },

    /// The verifying key could not be read or decoded.
    #[error("could not import verifying key from {path}: {reason}")]
    KeyImport { path: PathBuf, reason: String },

    /// The signed digest list is not a well-formed envelope.
    #[error("malformed signed digest list: {0}")]
    MalformedEnvelope(&'static str),

    /// The envelope signature does not verify against the configured key.
    #[error("digest list signature verification failed")]
    BadSignature,
}

/// Errors that can occur while fetching and verifying the snapshot image.
#[derive(Error, Debug)]
pub enum SyncError {
    /// I/O error during file operations.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// HTTP request error during download.
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    /// Expected-digest resolution failed.
    #[error(transparent)]
    Digest(#[from] DigestError),

    /// The configured sync URI or a resource name derived from it does not
    /// form a valid URL.
    #[error("invalid sync URI: {0}")]
    InvalidUri(String),

    /// The downloaded image does not hash to the published digest.
    #[error("digest {computed} does not match expected {expected}")]
    DigestMismatch { expected: String, computed: String },
}

/// A failed step of the update sequence.
///
/// Variants are ordered by pipeline stage; [`UpdateError::code`] gives the
/// stable numeric code callers use to tell how far an attempt progressed.
#[derive(Error, Debug)]
pub enum UpdateError {
    /// No verified snapshot could be fetched (digest resolution, download
    /// or digest check failed). Code 1.
    #[error("could not fetch a verified snapshot: {0}")]
    Fetch(#[from] SyncError),

    /// The downloaded temp file could not be staged beside the destination.
    /// Code 2.
    #[error("could not move temporary file {from} to destination {to}: {source}")]
    Stage {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The previous image could not be unmounted. Code 3.
    #[error("could not unmount {0}")]
    Unmount(PathBuf),

    /// The previous image file could not be removed. Code 4.
    #[error("could not remove {path}: {source}")]
    RemoveOld { path: PathBuf, source: io::Error },

    /// The staged image could not be renamed into place. Code 5.
    #[error("could not rename {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The new image could not be mounted. Code 6.
    #[error("could not mount {0}")]
    Mount(PathBuf),

    /// The repository directory could not be created during bootstrap.
    /// Code 1.
    #[error("could not create repository directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
}

impl UpdateError {
    /// Numeric failure code, ordered by how far the attempt progressed.
    pub fn code(&self) -> u8 {
        match self {
            UpdateError::Fetch(_) => 1,
            UpdateError::Stage { .. } => 2,
            UpdateError::Unmount(_) => 3,
            UpdateError::RemoveOld { .. } => 4,
            UpdateError::Rename { .. } => 5,
            UpdateError::Mount(_) => 6,
            UpdateError::CreateDir { .. } => 1,
        }
    }
}

/// Outcome of a top-level sync operation: the `(code, success)` pair that
/// forms the sole externally observable result of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOutcome {
    /// 0 on success; 1-6 map to the failure points of the update sequence.
    pub code: u8,
    pub success: bool,
}

impl SyncOutcome {
    pub const OK: SyncOutcome = SyncOutcome {
        code: 0,
        success: true,
    };

    pub fn as_tuple(self) -> (u8, bool) {
        (self.code, self.success)
    }
}

impl From<&UpdateError> for SyncOutcome {
    fn from(err: &UpdateError) -> Self {
        SyncOutcome {
            code: err.code(),
            success: false,
        }
    }
}
