use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors a lock scan can surface to its caller.
///
/// Failures of individual native queries (Restart Manager sessions, PEB reads,
/// token lookups) never show up here; they degrade to missing fields instead.
#[derive(Error, Debug)]
pub enum LockScanError {
    #[error("Path not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Access denied while enumerating {}: {source}", .path.display())]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to enumerate {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid scan options: {0}")]
    InvalidOptions(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("Lock scanning is not supported on {0}")]
    Unsupported(&'static str),

    #[error("Background scan task failed: {0}")]
    TaskJoin(String),
}

impl LockScanError {
    /// Classify an enumeration failure for `path`
    pub fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => LockScanError::PermissionDenied {
                path: path.to_path_buf(),
                source,
            },
            _ => LockScanError::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, LockScanError::PermissionDenied { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, LockScanError::NotFound(_))
    }
}
