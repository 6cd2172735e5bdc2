//! Error taxonomy shared by the resolver, provisioner and executors.
//!
//! Low-level IO errors are not masked: they bubble up to the nearest
//! `resolve*`/`download*` boundary, which classifies them as one of these
//! variants before returning to the caller.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    /// The remote catalog (versions, profiles or runtime index) was
    /// unreachable or malformed. The previously loaded catalog is retained.
    #[error("failed to fetch catalog from {url}: {reason}")]
    CatalogFetch { url: String, reason: String },

    /// An `inheritsFrom` chain ran past the depth budget, which almost
    /// always means a cycle. Not retried.
    #[error("inheritance depth exceeded while resolving {id} (inheritance loop?)")]
    InheritanceDepthExceeded { id: String },

    /// A downloaded payload's content hash disagrees with the declared one.
    #[error("content hash mismatch for {path}: expected {expected}, got {actual}")]
    VerificationMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Network or stream failure mid-download. The current operation is
    /// aborted; partial state stays on disk for a resumable retry.
    #[error("transfer failed for {url}: {reason}")]
    Transfer { url: String, reason: String },

    /// A wire document could not be parsed.
    #[error("failed to parse {what}")]
    Parse {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl LauncherError {
    pub fn catalog_fetch(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::CatalogFetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn transfer(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transfer {
            url: url.into(),
            reason: reason.to_string(),
        }
    }
}

/// Classify an internal error as IO, preserving a real `std::io::Error`
/// when one is at the root.
pub(crate) fn io_error(e: anyhow::Error) -> LauncherError {
    match e.downcast::<std::io::Error>() {
        Ok(io) => LauncherError::Io(io),
        Err(other) => LauncherError::Io(std::io::Error::other(other.to_string())),
    }
}
